use crate::domain::{
    error::RemoteError,
    mapping::{EntityMapping, MappingKey, NewMapping},
    records::{Category, Product, ProductShopData, StockLevel, Warehouse},
    value_objects::{EntityKind, ResourceKind, ShopId},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Port: durable mapping rows (implemented by SqlxMappingRepository and
/// InMemoryMappingRepository). Lookups only ever return active rows.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    async fn find_active(&self, key: &MappingKey) -> Result<Option<EntityMapping>>;

    async fn find_active_by_remote(
        &self,
        shop: ShopId,
        kind: EntityKind,
        remote_id: i64,
    ) -> Result<Option<EntityMapping>>;

    /// Insert or update the row for `mapping.key` atomically and mark it active.
    async fn upsert(&self, mapping: NewMapping) -> Result<EntityMapping>;

    /// Mark the row inactive. Returns whether an active row was affected.
    async fn deactivate(&self, key: &MappingKey) -> Result<bool>;

    async fn list_active(&self, shop: ShopId, kind: EntityKind) -> Result<Vec<EntityMapping>>;
}

/// Port: time-expiring lookup cache in front of [`MappingRepository`].
///
/// Values are `Option<remote_id>` so negative lookups are cached too. The
/// outer `Option` of [`MappingCache::get`] distinguishes a miss.
pub trait MappingCache: Send + Sync {
    fn get(&self, key: &MappingKey) -> Option<Option<i64>>;
    fn put(&self, key: MappingKey, remote_id: Option<i64>);
    fn invalidate(&self, key: &MappingKey);
    /// Drop every entry of `kind` for `shop`, including cached misses.
    fn invalidate_scope(&self, shop: ShopId, kind: EntityKind);
}

/// Port: local catalog storage (products, categories, warehouses, ...).
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn entity_exists(&self, kind: EntityKind, id: i64) -> Result<bool>;
    async fn category(&self, id: i64) -> Result<Option<Category>>;
    async fn warehouses(&self) -> Result<Vec<Warehouse>>;
    async fn product(&self, id: i64) -> Result<Option<Product>>;
    async fn save_stock_level(&self, level: &StockLevel) -> Result<()>;
    async fn save_product_shop_data(&self, data: &ProductShopData) -> Result<()>;
}

/// Port: the remote platform web-service client.
///
/// Transport, retries and authentication live behind this trait; failures
/// surface as [`RemoteError`] with the HTTP status when there was one.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn fetch(&self, resource: ResourceKind, id: i64) -> Result<Value, RemoteError>;
    async fn create(&self, resource: ResourceKind, data: &Value) -> Result<Value, RemoteError>;
    async fn update(
        &self,
        resource: ResourceKind,
        id: i64,
        data: &Value,
    ) -> Result<Value, RemoteError>;
}
