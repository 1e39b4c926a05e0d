use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::error::SyncError;
use crate::domain::mapping::{EntityMapping, MappingKey, NewMapping};
use crate::domain::ports::{CatalogRepository, MappingCache, MappingRepository};
use crate::domain::value_objects::{EntityKind, ShopId};

// ─────────────────────────────────────────────────────────────────────────────
// MappingService
// ─────────────────────────────────────────────────────────────────────────────

/// Bidirectional local ⇄ remote id mapping for one entity kind.
///
/// Forward lookups (`local → remote`) go through the cache first and cache
/// misses as well as hits, since resolution runs once per entity per sync
/// and mappings change rarely. Every write invalidates the affected key so
/// an immediate lookup after a write sees the new value.
///
/// Reverse lookups (`remote → local`) are uncached.
#[derive(Clone)]
pub struct MappingService {
    kind: EntityKind,
    repo: Arc<dyn MappingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    cache: Arc<dyn MappingCache>,
}

impl MappingService {
    pub fn new(
        kind: EntityKind,
        repo: Arc<dyn MappingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        cache: Arc<dyn MappingCache>,
    ) -> Self {
        Self {
            kind,
            repo,
            catalog,
            cache,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn key(&self, local_id: i64, shop: ShopId) -> MappingKey {
        MappingKey::new(shop, self.kind, local_id.to_string())
    }

    /// Remote id mapped to `local_id` in `shop`, if any.
    pub async fn resolve_remote_id(
        &self,
        local_id: i64,
        shop: ShopId,
    ) -> Result<Option<i64>, SyncError> {
        let key = self.key(local_id, shop);
        if let Some(cached) = self.cache.get(&key) {
            debug!(kind = %self.kind, shop_id = %shop, local_id, remote_id = ?cached, "mapping cache hit");
            return Ok(cached);
        }

        let remote_id = self.repo.find_active(&key).await?.map(|m| m.remote_id);
        self.cache.put(key, remote_id);
        debug!(kind = %self.kind, shop_id = %shop, local_id, remote_id = ?remote_id, "mapping resolved from store");
        Ok(remote_id)
    }

    /// Local id mapped to `remote_id` in `shop`, if any.
    pub async fn resolve_local_id(
        &self,
        remote_id: i64,
        shop: ShopId,
    ) -> Result<Option<i64>, SyncError> {
        let mapping = self
            .repo
            .find_active_by_remote(shop, self.kind, remote_id)
            .await?;
        Ok(mapping.and_then(|m| {
            let local = m.local_id();
            if local.is_none() {
                warn!(kind = %self.kind, shop_id = %shop, remote_id, local_value = %m.local_value, "mapping has non-numeric local key");
            }
            local
        }))
    }

    /// Create or replace the mapping for `local_id` in `shop`.
    ///
    /// Fails with [`SyncError::NotFound`] if `local_id` is not a known local
    /// entity of this kind.
    #[instrument(skip(self, remote_label), fields(kind = %self.kind, shop_id = %shop))]
    pub async fn create_or_update_mapping(
        &self,
        local_id: i64,
        shop: ShopId,
        remote_id: i64,
        remote_label: Option<String>,
    ) -> Result<EntityMapping, SyncError> {
        if !self.catalog.entity_exists(self.kind, local_id).await? {
            return Err(SyncError::not_found(self.kind, local_id));
        }

        let key = self.key(local_id, shop);
        let mapping = self
            .repo
            .upsert(NewMapping {
                key: key.clone(),
                remote_id,
                remote_label,
            })
            .await?;
        self.cache.invalidate(&key);

        info!(local_id, remote_id, "mapping stored");
        Ok(mapping)
    }

    /// Retract the mapping for `local_id`. Returns whether a row was affected.
    #[instrument(skip(self), fields(kind = %self.kind, shop_id = %shop))]
    pub async fn delete_mapping(&self, local_id: i64, shop: ShopId) -> Result<bool, SyncError> {
        let key = self.key(local_id, shop);
        let affected = self.repo.deactivate(&key).await?;
        self.cache.invalidate(&key);

        if affected {
            info!(local_id, "mapping deactivated");
        }
        Ok(affected)
    }

    pub async fn is_mapped(&self, local_id: i64, shop: ShopId) -> Result<bool, SyncError> {
        Ok(self.resolve_remote_id(local_id, shop).await?.is_some())
    }

    /// Every active mapping of this kind for `shop`.
    pub async fn all_mappings_for_shop(
        &self,
        shop: ShopId,
    ) -> Result<Vec<EntityMapping>, SyncError> {
        Ok(self.repo.list_active(shop, self.kind).await?)
    }

    /// Drop all cached lookups of this kind for `shop`.
    pub fn invalidate_shop(&self, shop: ShopId) {
        self.cache.invalidate_scope(shop, self.kind);
        debug!(kind = %self.kind, shop_id = %shop, "mapping cache invalidated for shop");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::records::{Category, PriceGroup, Warehouse};
    use crate::infrastructure::cache::InMemoryMappingCache;
    use crate::infrastructure::memory::{InMemoryCatalog, InMemoryMappingRepository};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts forward lookups reaching the store.
    #[derive(Default)]
    pub(crate) struct CountingRepo {
        pub inner: InMemoryMappingRepository,
        pub lookups: AtomicUsize,
    }

    #[async_trait]
    impl MappingRepository for CountingRepo {
        async fn find_active(&self, key: &MappingKey) -> anyhow::Result<Option<EntityMapping>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_active(key).await
        }
        async fn find_active_by_remote(
            &self,
            shop: ShopId,
            kind: EntityKind,
            remote_id: i64,
        ) -> anyhow::Result<Option<EntityMapping>> {
            self.inner.find_active_by_remote(shop, kind, remote_id).await
        }
        async fn upsert(&self, mapping: NewMapping) -> anyhow::Result<EntityMapping> {
            self.inner.upsert(mapping).await
        }
        async fn deactivate(&self, key: &MappingKey) -> anyhow::Result<bool> {
            self.inner.deactivate(key).await
        }
        async fn list_active(
            &self,
            shop: ShopId,
            kind: EntityKind,
        ) -> anyhow::Result<Vec<EntityMapping>> {
            self.inner.list_active(shop, kind).await
        }
    }

    pub(crate) fn category(id: i64, parent_id: Option<i64>, name: &str) -> Category {
        Category {
            id,
            parent_id,
            name: name.to_string(),
            slug: None,
            description: None,
            is_active: true,
        }
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(
            InMemoryCatalog::new()
                .with_category(category(5, None, "Hamulce"))
                .with_category(category(6, Some(5), "Klocki"))
                .with_warehouse(Warehouse {
                    id: 1,
                    code: "mpptrade".into(),
                    name: "MPP Trade".into(),
                    is_default: true,
                    shop_links: BTreeSet::new(),
                })
                .with_price_group(PriceGroup {
                    id: 3,
                    code: "hurtowa".into(),
                    name: "Hurtowa".into(),
                    is_default: false,
                }),
        )
    }

    fn service(repo: Arc<dyn MappingRepository>) -> MappingService {
        MappingService::new(
            EntityKind::Category,
            repo,
            catalog(),
            Arc::new(InMemoryMappingCache::default()),
        )
    }

    const SHOP: ShopId = ShopId(1);

    #[tokio::test]
    async fn resolve_after_create_sees_new_value() {
        let svc = service(Arc::new(InMemoryMappingRepository::new()));
        assert_eq!(svc.resolve_remote_id(5, SHOP).await.unwrap(), None);

        svc.create_or_update_mapping(5, SHOP, 42, Some("Hamulce".into()))
            .await
            .unwrap();
        assert_eq!(svc.resolve_remote_id(5, SHOP).await.unwrap(), Some(42));

        svc.create_or_update_mapping(5, SHOP, 43, None).await.unwrap();
        assert_eq!(svc.resolve_remote_id(5, SHOP).await.unwrap(), Some(43));
    }

    #[tokio::test]
    async fn price_groups_map_alongside_categories() {
        let repo: Arc<dyn MappingRepository> = Arc::new(InMemoryMappingRepository::new());
        let cache: Arc<dyn MappingCache> = Arc::new(InMemoryMappingCache::default());
        let groups = MappingService::new(EntityKind::PriceGroup, repo.clone(), catalog(), cache.clone());
        let categories = MappingService::new(EntityKind::Category, repo, catalog(), cache);

        groups.create_or_update_mapping(3, SHOP, 4, Some("Hurtowa".into())).await.unwrap();
        assert_eq!(groups.resolve_remote_id(3, SHOP).await.unwrap(), Some(4));
        assert_eq!(groups.resolve_local_id(4, SHOP).await.unwrap(), Some(3));
        assert_eq!(categories.resolve_remote_id(3, SHOP).await.unwrap(), None);

        assert!(matches!(
            groups.create_or_update_mapping(5, SHOP, 9, None).await,
            Err(SyncError::NotFound { kind: EntityKind::PriceGroup, .. })
        ));
    }

    #[tokio::test]
    async fn create_twice_is_idempotent() {
        let repo = Arc::new(InMemoryMappingRepository::new());
        let svc = service(repo.clone());

        let first = svc.create_or_update_mapping(5, SHOP, 42, None).await.unwrap();
        let r1 = svc.resolve_remote_id(5, SHOP).await.unwrap();
        let second = svc.create_or_update_mapping(5, SHOP, 42, None).await.unwrap();
        let r2 = svc.resolve_remote_id(5, SHOP).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(r1, r2);
        assert_eq!(svc.all_mappings_for_shop(SHOP).await.unwrap().len(), 1);
        assert_eq!(repo.rows().len(), 1);
    }

    #[tokio::test]
    async fn unknown_local_entity_is_not_found() {
        let svc = service(Arc::new(InMemoryMappingRepository::new()));
        let err = svc
            .create_or_update_mapping(999, SHOP, 42, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::NotFound { kind: EntityKind::Category, ref id } if id == "999"
        ));
    }

    #[tokio::test]
    async fn negative_lookups_are_cached() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone());

        assert_eq!(svc.resolve_remote_id(6, SHOP).await.unwrap(), None);
        assert_eq!(svc.resolve_remote_id(6, SHOP).await.unwrap(), None);
        assert!(!svc.is_mapped(6, SHOP).await.unwrap());
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_deactivates_and_invalidates() {
        let svc = service(Arc::new(InMemoryMappingRepository::new()));
        svc.create_or_update_mapping(5, SHOP, 42, None).await.unwrap();
        assert!(svc.is_mapped(5, SHOP).await.unwrap());

        assert!(svc.delete_mapping(5, SHOP).await.unwrap());
        assert!(!svc.is_mapped(5, SHOP).await.unwrap());
        assert!(!svc.delete_mapping(5, SHOP).await.unwrap());
        assert!(svc.all_mappings_for_shop(SHOP).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_lookup_finds_local_id() {
        let svc = service(Arc::new(InMemoryMappingRepository::new()));
        svc.create_or_update_mapping(6, SHOP, 77, None).await.unwrap();

        assert_eq!(svc.resolve_local_id(77, SHOP).await.unwrap(), Some(6));
        assert_eq!(svc.resolve_local_id(77, ShopId(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_shop_drops_stale_entries() {
        let repo = Arc::new(InMemoryMappingRepository::new());
        let svc = service(repo.clone());
        assert_eq!(svc.resolve_remote_id(6, SHOP).await.unwrap(), None);

        // Written behind the service's back: the cached miss hides it.
        repo.upsert(NewMapping {
            key: MappingKey::new(SHOP, EntityKind::Category, "6"),
            remote_id: 12,
            remote_label: None,
        })
        .await
        .unwrap();
        assert_eq!(svc.resolve_remote_id(6, SHOP).await.unwrap(), None);

        svc.invalidate_shop(SHOP);
        assert_eq!(svc.resolve_remote_id(6, SHOP).await.unwrap(), Some(12));
    }

    #[tokio::test]
    async fn kinds_do_not_share_mappings() {
        let repo: Arc<dyn MappingRepository> = Arc::new(InMemoryMappingRepository::new());
        let cache: Arc<dyn MappingCache> = Arc::new(InMemoryMappingCache::default());
        let catalog = catalog();
        let categories = MappingService::new(EntityKind::Category, repo.clone(), catalog.clone(), cache.clone());
        let warehouses = MappingService::new(EntityKind::Warehouse, repo, catalog, cache);

        categories.create_or_update_mapping(5, SHOP, 42, None).await.unwrap();
        assert_eq!(warehouses.resolve_remote_id(5, SHOP).await.unwrap(), None);
    }
}
