use serde_json::Value;

use crate::domain::value_objects::LanguageId;

/// One `{id, value}` record of a localized field.
///
/// XML-derived payloads carry the text under `#` instead of `value`; the
/// decoder prefers `#` when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangEntry {
    pub id: Option<i64>,
    pub value: Option<String>,
}

/// The remote platform's representation of a localized string.
///
/// Decoded once from raw JSON with [`MultiLangValue::decode`]; resolution to
/// a scalar with [`MultiLangValue::extract`] is pure and never fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MultiLangValue {
    #[default]
    Absent,
    Plain(String),
    Single(LangEntry),
    Many(Vec<LangEntry>),
}

impl MultiLangValue {
    /// Decode any JSON shape the remote platform uses for a localized field.
    ///
    /// Shapes that are not recognised decode to [`MultiLangValue::Absent`].
    pub fn decode(raw: &Value) -> Self {
        match raw {
            Value::String(s) => MultiLangValue::Plain(s.clone()),
            Value::Array(items) => MultiLangValue::Many(decode_entries(items)),
            Value::Object(map) => match map.get("language") {
                Some(Value::Object(record)) if record.contains_key("id") => {
                    MultiLangValue::Single(decode_entry(record))
                }
                Some(Value::Array(items)) => MultiLangValue::Many(decode_entries(items)),
                Some(_) => MultiLangValue::Absent,
                None if map.contains_key("#") || map.contains_key("value") => {
                    MultiLangValue::Single(decode_entry(map))
                }
                None => MultiLangValue::Absent,
            },
            _ => MultiLangValue::Absent,
        }
    }

    /// Resolve to a scalar in `preferred` language.
    ///
    /// Sequences are searched for the preferred id first and fall back to
    /// their first record. Empty strings resolve to `None`.
    pub fn extract(&self, preferred: LanguageId) -> Option<String> {
        match self {
            MultiLangValue::Absent => None,
            MultiLangValue::Plain(s) => non_empty(s),
            MultiLangValue::Single(entry) => entry.value.as_deref().and_then(non_empty),
            MultiLangValue::Many(entries) => entries
                .iter()
                .find(|e| e.id == Some(preferred.0))
                .or_else(|| entries.first())
                .and_then(|e| e.value.as_deref())
                .and_then(non_empty),
        }
    }
}

/// Decode-and-extract in one step, for callers holding a raw field.
pub fn extract(raw: &Value, preferred: LanguageId) -> Option<String> {
    MultiLangValue::decode(raw).extract(preferred)
}

/// Build the `{"language": [{"id", "value"}]}` shape used when writing a
/// localized field back to the remote platform.
pub fn encode(value: &str, language: LanguageId) -> Value {
    serde_json::json!({
        "language": [{ "id": language.0, "value": value }]
    })
}

fn decode_entries(items: &[Value]) -> Vec<LangEntry> {
    items
        .iter()
        .filter_map(|item| item.as_object().map(decode_entry))
        .collect()
}

fn decode_entry(record: &serde_json::Map<String, Value>) -> LangEntry {
    let id = record.get("id").and_then(as_i64);
    let value = record
        .get("#")
        .and_then(scalar_text)
        .or_else(|| record.get("value").and_then(scalar_text));
    LangEntry { id, value }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
