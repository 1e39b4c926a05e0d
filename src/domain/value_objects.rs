use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one configured shop connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopId(pub i64);

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Language identifier as used by the remote platform (1 = shop default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(pub i64);

impl Default for LanguageId {
    fn default() -> Self {
        LanguageId(1)
    }
}

/// Kind of entity a mapping row refers to.
///
/// Mapping rows are scoped per `(shop, kind)`, so the same local id can map
/// to different remote ids for categories and warehouses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    PriceGroup,
    Warehouse,
    Manufacturer,
    Product,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::PriceGroup => "price_group",
            EntityKind::Warehouse => "warehouse",
            EntityKind::Manufacturer => "manufacturer",
            EntityKind::Product => "product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(EntityKind::Category),
            "price_group" => Ok(EntityKind::PriceGroup),
            "warehouse" => Ok(EntityKind::Warehouse),
            "manufacturer" => Ok(EntityKind::Manufacturer),
            "product" => Ok(EntityKind::Product),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Remote resource families the client can fetch, create and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Product,
    Category,
    StockAvailable,
}

impl ResourceKind {
    /// Wrapper key the remote platform uses around a single record.
    pub fn record_key(&self) -> &'static str {
        match self {
            ResourceKind::Product => "product",
            ResourceKind::Category => "category",
            ResourceKind::StockAvailable => "stock_available",
        }
    }
}
