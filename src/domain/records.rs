use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::conflict::ProductSyncData;
use crate::domain::validation::ValidationSnapshot;
use crate::domain::value_objects::ShopId;

// ─── Local catalog entities ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    /// Shops whose remote stock is imported into this warehouse.
    #[serde(default)]
    pub shop_links: BTreeSet<ShopId>,
}

impl Warehouse {
    pub fn is_linked_to(&self, shop: ShopId) -> bool {
        self.shop_links.contains(&shop)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceGroup {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    /// Code of the price group (tier) this price belongs to.
    pub price_group: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub prices: Vec<ProductPrice>,
    #[serde(default)]
    pub stock: Vec<StockLevel>,
}

impl Product {
    pub fn price_for(&self, price_group: &str) -> Option<f64> {
        self.prices
            .iter()
            .find(|p| p.price_group == price_group)
            .map(|p| p.price)
    }

    /// Sum of quantities across every warehouse.
    pub fn total_stock(&self) -> i64 {
        self.stock.iter().map(|s| s.quantity).fold(0i64, i64::saturating_add)
    }
}

fn default_true() -> bool {
    true
}

// ─── Product ⇄ shop association ──────────────────────────────────────────────

/// Shop-specific state of one product: the record conflict resolution and
/// validation operate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductShopData {
    pub product_id: i64,
    pub shop_id: ShopId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub ean: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub manufacturer_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_pulled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validation: Option<ValidationSnapshot>,
}

impl ProductShopData {
    pub fn new(product_id: i64, shop_id: ShopId, updated_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            shop_id,
            name: None,
            slug: None,
            short_description: None,
            long_description: None,
            meta_title: None,
            meta_description: None,
            is_active: None,
            weight: None,
            height: None,
            width: None,
            length: None,
            ean: None,
            sku: None,
            manufacturer_id: None,
            sort_order: 0,
            updated_at,
            last_pulled_at: None,
            validation: None,
        }
    }

    /// Overwrite local fields with data chosen by the conflict resolver.
    pub fn apply_sync_data(&mut self, data: &ProductSyncData) {
        self.name = data.name.clone();
        self.slug = data.slug.clone();
        self.short_description = data.short_description.clone();
        self.long_description = data.long_description.clone();
        self.meta_title = data.meta_title.clone();
        self.meta_description = data.meta_description.clone();
        self.is_active = Some(data.is_active);
        self.weight = number(&data.weight);
        self.height = data.height;
        self.width = data.width;
        self.length = data.length;
        self.ean = data.ean.clone();
        self.sku = data.sku.clone();
        self.manufacturer_id = data.manufacturer_id;
        self.sort_order = data.sort_order;
        self.last_pulled_at = Some(data.last_pulled_at);
    }

    pub fn record_validation(&mut self, snapshot: ValidationSnapshot) {
        self.validation = Some(snapshot);
    }

    pub fn has_validation_warnings(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.has_warnings)
    }
}

/// Numeric reading of a JSON value that may be a number or a numeric string.
pub(crate) fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn product() -> Product {
        Product {
            id: 1,
            sku: "SKU-1".into(),
            name: "Hamulec".into(),
            short_description: None,
            long_description: None,
            is_active: true,
            category_ids: vec![],
            prices: vec![
                ProductPrice { price_group: "detaliczna".into(), price: 100.0 },
                ProductPrice { price_group: "hurtowa".into(), price: 80.0 },
            ],
            stock: vec![
                StockLevel { product_id: 1, warehouse_id: 1, quantity: 10 },
                StockLevel { product_id: 1, warehouse_id: 2, quantity: 5 },
            ],
        }
    }

    #[test]
    fn price_for_picks_tier() {
        let p = product();
        assert_eq!(p.price_for("hurtowa"), Some(80.0));
        assert_eq!(p.price_for("vip"), None);
    }

    #[test]
    fn total_stock_sums_warehouses() {
        assert_eq!(product().total_stock(), 15);
    }

    #[test]
    fn total_stock_saturates() {
        let mut p = product();
        p.stock[0].quantity = i64::MAX;
        assert_eq!(p.total_stock(), i64::MAX);
    }

    #[test]
    fn apply_sync_data_overwrites_fields() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut local = ProductShopData::new(1, ShopId(1), now);
        local.name = Some("Stara".into());

        let data = ProductSyncData {
            name: Some("Nowa".into()),
            weight: json!("2.5"),
            is_active: true,
            sort_order: 3,
            last_pulled_at: now,
            ..ProductSyncData::empty(now)
        };
        local.apply_sync_data(&data);

        assert_eq!(local.name.as_deref(), Some("Nowa"));
        assert_eq!(local.weight, Some(2.5));
        assert_eq!(local.is_active, Some(true));
        assert_eq!(local.sort_order, 3);
        assert_eq!(local.last_pulled_at, Some(now));
    }
}
