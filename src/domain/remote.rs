use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::multilang::MultiLangValue;
use crate::domain::records::number;

/// Date-time format the remote platform uses for `date_add` / `date_upd`.
const REMOTE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A remote product record decoded once at the system boundary.
///
/// Decoding never fails: missing or malformed fields become absent values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteProduct {
    pub id: Option<i64>,
    pub name: MultiLangValue,
    pub link_rewrite: MultiLangValue,
    pub description_short: MultiLangValue,
    pub description: MultiLangValue,
    pub meta_title: MultiLangValue,
    pub meta_description: MultiLangValue,
    /// `None` when the record carries no `active` field at all.
    pub active: Option<bool>,
    /// Passed through unchanged into pulled data.
    pub weight: Value,
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub depth: Option<f64>,
    pub ean: Option<String>,
    pub reference: Option<String>,
    pub id_manufacturer: Option<i64>,
    pub position: Option<i64>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub date_upd: Option<DateTime<Utc>>,
    pub category_ids: Vec<i64>,
}

impl RemoteProduct {
    /// Decode a product record, unwrapping a `{"product": {...}}` envelope.
    pub fn decode(raw: &Value) -> Self {
        let record = match raw.get("product") {
            Some(Value::Object(inner)) => inner,
            _ => match raw {
                Value::Object(map) => map,
                _ => return RemoteProduct::default(),
            },
        };

        let field = |key: &str| record.get(key).unwrap_or(&Value::Null);
        let lang = |key: &str| MultiLangValue::decode(field(key));

        RemoteProduct {
            id: integer(field("id")),
            name: lang("name"),
            link_rewrite: lang("link_rewrite"),
            description_short: lang("description_short"),
            description: lang("description"),
            meta_title: lang("meta_title"),
            meta_description: lang("meta_description"),
            active: record.get("active").map(flag),
            weight: field("weight").clone(),
            height: positive_decimal(field("height")),
            width: positive_decimal(field("width")),
            depth: positive_decimal(field("depth")),
            ean: text(field("ean13")).or_else(|| text(field("ean"))),
            reference: text(field("reference")),
            id_manufacturer: integer(field("id_manufacturer")),
            position: integer(field("position")),
            price: number(field("price")),
            quantity: integer(field("quantity")),
            date_upd: parse_remote_datetime(field("date_upd")),
            category_ids: category_ids(record),
        }
    }

    /// Active flag as the remote platform means it: only `"1"`/`1`/`true`.
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn weight_f64(&self) -> Option<f64> {
        number(&self.weight)
    }

    /// Modification time as unix seconds; absent or unparseable is epoch 0.
    pub fn modified_timestamp(&self) -> i64 {
        self.date_upd.map(|d| d.timestamp()).unwrap_or(0)
    }
}

/// Coerce the remote's `"1"`/`1`/`true` representation of a flag.
pub fn flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` (taken as UTC) or RFC 3339.
pub fn parse_remote_datetime(v: &Value) -> Option<DateTime<Utc>> {
    let s = v.as_str()?.trim();
    if s.is_empty() || s.starts_with("0000-00-00") {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, REMOTE_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

pub(crate) fn integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Dimensions come back as `"0.000000"` when unset; zero means absent.
fn positive_decimal(v: &Value) -> Option<f64> {
    number(v).filter(|f| *f > 0.0)
}

/// Category ids from `associations.categories`, which may be a list of
/// records, a `{"category": ...}` wrapper, or a single record.
fn category_ids(record: &Map<String, Value>) -> Vec<i64> {
    let categories = match record.get("associations").and_then(|a| a.get("categories")) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let items = match categories {
        Value::Object(map) => match map.get("category") {
            Some(inner) => inner,
            None => categories,
        },
        other => other,
    };
    match items {
        Value::Array(list) => list.iter().filter_map(record_id).collect(),
        Value::Object(_) => record_id(items).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn record_id(v: &Value) -> Option<i64> {
    match v {
        Value::Object(map) => map.get("id").and_then(integer),
        other => integer(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::LanguageId;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn decodes_wrapped_product() {
        let raw = json!({"product": {
            "id": "77",
            "name": {"language": [{"id": "1", "value": "Klocki"}]},
            "active": "1",
            "weight": "1.250000",
            "ean13": "5901234123457",
            "price": "199.990000",
            "quantity": "12",
            "date_upd": "2025-11-13 10:22:01",
            "associations": {"categories": [{"id": "2"}, {"id": "14"}]}
        }});
        let p = RemoteProduct::decode(&raw);
        assert_eq!(p.id, Some(77));
        assert_eq!(p.name.extract(LanguageId(1)), Some("Klocki".into()));
        assert_eq!(p.active, Some(true));
        assert_eq!(p.weight, json!("1.250000"));
        assert_eq!(p.weight_f64(), Some(1.25));
        assert_eq!(p.ean.as_deref(), Some("5901234123457"));
        assert_eq!(p.price, Some(199.99));
        assert_eq!(p.quantity, Some(12));
        assert_eq!(
            p.date_upd,
            Some(Utc.with_ymd_and_hms(2025, 11, 13, 10, 22, 1).unwrap())
        );
        assert_eq!(p.category_ids, vec![2, 14]);
    }

    #[test]
    fn ean_falls_back_to_second_field_name() {
        let p = RemoteProduct::decode(&json!({"ean": "123"}));
        assert_eq!(p.ean.as_deref(), Some("123"));
    }

    #[test]
    fn category_wrapper_and_single_record_forms() {
        let p = RemoteProduct::decode(&json!({
            "associations": {"categories": {"category": [{"id": 3}, {"id": "4"}]}}
        }));
        assert_eq!(p.category_ids, vec![3, 4]);

        let p = RemoteProduct::decode(&json!({
            "associations": {"categories": {"category": {"id": "9"}}}
        }));
        assert_eq!(p.category_ids, vec![9]);
    }

    #[test]
    fn flag_coercion() {
        assert!(flag(&json!("1")));
        assert!(flag(&json!(1)));
        assert!(flag(&json!(true)));
        assert!(!flag(&json!("0")));
        assert!(!flag(&json!(0)));
        assert!(!flag(&json!("yes")));
        assert!(!flag(&Value::Null));
    }

    #[test]
    fn unparseable_dates_are_epoch() {
        for raw in [json!({"date_upd": "yesterday"}), json!({"date_upd": "0000-00-00 00:00:00"}), json!({})] {
            assert_eq!(RemoteProduct::decode(&raw).modified_timestamp(), 0);
        }
        let p = RemoteProduct::decode(&json!({"date_upd": "2025-01-02T03:04:05+01:00"}));
        assert_eq!(p.date_upd, Some(Utc.with_ymd_and_hms(2025, 1, 2, 2, 4, 5).unwrap()));
    }

    #[test]
    fn zero_dimensions_are_absent() {
        let p = RemoteProduct::decode(&json!({"height": "0.000000", "width": "12.5"}));
        assert_eq!(p.height, None);
        assert_eq!(p.width, Some(12.5));
    }

    #[test]
    fn non_object_decodes_to_default() {
        assert_eq!(RemoteProduct::decode(&json!("nope")), RemoteProduct::default());
    }
}
