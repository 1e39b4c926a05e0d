use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::mapping::{EntityMapping, MappingKey, NewMapping};
use crate::domain::ports::{CatalogRepository, MappingRepository};
use crate::domain::records::{Category, PriceGroup, Product, ProductShopData, StockLevel, Warehouse};
use crate::domain::value_objects::{EntityKind, ShopId};

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

// ─── InMemoryMappingRepository ───────────────────────────────────────────────

/// [`MappingRepository`] backed by a `BTreeMap`, one row per key.
///
/// Useful for tests, demos and embedding the core without a database.
#[derive(Default)]
pub struct InMemoryMappingRepository {
    rows: Mutex<BTreeMap<MappingKey, EntityMapping>>,
}

impl InMemoryMappingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored rows, active or not.
    pub fn rows(&self) -> Vec<EntityMapping> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MappingRepository for InMemoryMappingRepository {
    async fn find_active(&self, key: &MappingKey) -> Result<Option<EntityMapping>> {
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(rows.get(key).filter(|m| m.is_active).cloned())
    }

    async fn find_active_by_remote(
        &self,
        shop: ShopId,
        kind: EntityKind,
        remote_id: i64,
    ) -> Result<Option<EntityMapping>> {
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .find(|m| {
                m.is_active && m.shop_id == shop && m.entity_kind == kind && m.remote_id == remote_id
            })
            .cloned())
    }

    async fn upsert(&self, mapping: NewMapping) -> Result<EntityMapping> {
        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        let row = mapping.into_mapping();
        rows.insert(row.key(), row.clone());
        Ok(row)
    }

    async fn deactivate(&self, key: &MappingKey) -> Result<bool> {
        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        match rows.get_mut(key) {
            Some(row) if row.is_active => {
                row.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active(&self, shop: ShopId, kind: EntityKind) -> Result<Vec<EntityMapping>> {
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .filter(|m| m.is_active && m.shop_id == shop && m.entity_kind == kind)
            .cloned()
            .collect())
    }
}

// ─── InMemoryCatalog ─────────────────────────────────────────────────────────

#[derive(Default)]
struct CatalogState {
    categories: BTreeMap<i64, Category>,
    warehouses: BTreeMap<i64, Warehouse>,
    price_groups: BTreeMap<i64, PriceGroup>,
    products: BTreeMap<i64, Product>,
    manufacturers: BTreeMap<i64, String>,
    stock: BTreeMap<(i64, i64), StockLevel>,
    shop_data: BTreeMap<(i64, ShopId), ProductShopData>,
}

/// [`CatalogRepository`] holding the local catalog in memory.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(self, category: Category) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.categories.insert(category.id, category);
        }
        self
    }

    pub fn with_warehouse(self, warehouse: Warehouse) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.warehouses.insert(warehouse.id, warehouse);
        }
        self
    }

    pub fn with_price_group(self, group: PriceGroup) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.price_groups.insert(group.id, group);
        }
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.products.insert(product.id, product);
        }
        self
    }

    pub fn with_manufacturer(self, id: i64, name: &str) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.manufacturers.insert(id, name.to_string());
        }
        self
    }

    /// Stock rows written through [`CatalogRepository::save_stock_level`].
    pub fn stock_levels(&self) -> Vec<StockLevel> {
        self.state
            .lock()
            .map(|s| s.stock.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn product_shop_data(&self, product_id: i64, shop: ShopId) -> Option<ProductShopData> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.shop_data.get(&(product_id, shop)).cloned())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn entity_exists(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let s = self.state.lock().map_err(|_| poisoned())?;
        Ok(match kind {
            EntityKind::Category => s.categories.contains_key(&id),
            EntityKind::Warehouse => s.warehouses.contains_key(&id),
            EntityKind::PriceGroup => s.price_groups.contains_key(&id),
            EntityKind::Product => s.products.contains_key(&id),
            EntityKind::Manufacturer => s.manufacturers.contains_key(&id),
        })
    }

    async fn category(&self, id: i64) -> Result<Option<Category>> {
        let s = self.state.lock().map_err(|_| poisoned())?;
        Ok(s.categories.get(&id).cloned())
    }

    async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        let s = self.state.lock().map_err(|_| poisoned())?;
        Ok(s.warehouses.values().cloned().collect())
    }

    async fn product(&self, id: i64) -> Result<Option<Product>> {
        let s = self.state.lock().map_err(|_| poisoned())?;
        Ok(s.products.get(&id).cloned())
    }

    async fn save_stock_level(&self, level: &StockLevel) -> Result<()> {
        let mut s = self.state.lock().map_err(|_| poisoned())?;
        s.stock
            .insert((level.product_id, level.warehouse_id), level.clone());
        Ok(())
    }

    async fn save_product_shop_data(&self, data: &ProductShopData) -> Result<()> {
        let mut s = self.state.lock().map_err(|_| poisoned())?;
        s.shop_data
            .insert((data.product_id, data.shop_id), data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_mapping(local: &str, remote: i64) -> NewMapping {
        NewMapping {
            key: MappingKey::new(ShopId(1), EntityKind::Category, local),
            remote_id: remote,
            remote_label: None,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_key() {
        let repo = InMemoryMappingRepository::new();
        repo.upsert(new_mapping("5", 42)).await.unwrap();
        repo.upsert(new_mapping("5", 43)).await.unwrap();

        let rows = repo.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id, 43);
    }

    #[tokio::test]
    async fn deactivated_rows_are_hidden_but_kept() {
        let repo = InMemoryMappingRepository::new();
        let key = MappingKey::new(ShopId(1), EntityKind::Category, "5");
        repo.upsert(new_mapping("5", 42)).await.unwrap();

        assert!(repo.deactivate(&key).await.unwrap());
        assert!(!repo.deactivate(&key).await.unwrap());
        assert_eq!(repo.find_active(&key).await.unwrap(), None);
        assert!(repo
            .find_active_by_remote(ShopId(1), EntityKind::Category, 42)
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.rows().len(), 1);
    }

    #[tokio::test]
    async fn catalog_knows_entities_per_kind() {
        let catalog = InMemoryCatalog::new().with_manufacturer(3, "Brembo");
        assert!(catalog.entity_exists(EntityKind::Manufacturer, 3).await.unwrap());
        assert!(!catalog.entity_exists(EntityKind::Category, 3).await.unwrap());
    }
}
