use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of shopsync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                              |
/// |---------|-----------------|------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                 |
/// | `Info`  | `info`          | Default, shows degraded resolutions      |
/// | `Debug` | `debug`         | `--verbose`, shows cache hits and SQL    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for shopsync.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise.
/// Library consumers who manage their own subscriber should skip this.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "shopsync=error",
        LogLevel::Info => "shopsync=info",
        LogLevel::Debug => "shopsync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::category::{CategoryMapper, CategorySyncReport};
pub use application::conflict::{ConflictResolver, ResolutionStrategy};
pub use application::mapping::MappingService;
pub use application::stock::{StockAggregator, StockImportReport, WarehouseResolver};
pub use application::validation::ValidationEngine;
pub use domain::conflict::{ConflictDecision, FieldConflict, ProductSyncData};
pub use domain::error::{DegradedResolution, RemoteError, SyncError};
pub use domain::mapping::{EntityMapping, MappingKey};
pub use domain::multilang::MultiLangValue;
pub use domain::ports::{CatalogRepository, MappingCache, MappingRepository, RemoteClient};
pub use domain::records::{Category, PriceGroup, Product, ProductShopData, StockLevel, Warehouse};
pub use domain::remote::RemoteProduct;
pub use domain::validation::{Severity, ValidationSnapshot, ValidationWarning};
pub use domain::value_objects::{EntityKind, LanguageId, ResourceKind, ShopId};
pub use infrastructure::cache::InMemoryMappingCache;
pub use infrastructure::config::{AppConfig, DbConfig, ShopConfig, SyncConfig};
pub use infrastructure::memory::{InMemoryCatalog, InMemoryMappingRepository};

use crate::infrastructure::db::client::connect;

/// Result of pulling one product from a shop.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub decision: ConflictDecision,
    /// The local record after applying the decision and validation, as saved.
    pub record: ProductShopData,
}

/// Every reconciliation service wired to one set of adapters.
///
/// All mapping services share one cache, so invalidation done by one of them
/// is visible to the others.
pub struct SyncServices {
    pub categories: CategoryMapper,
    pub price_groups: MappingService,
    pub warehouses: MappingService,
    pub stock: StockAggregator,
    pub stock_import: WarehouseResolver,
    pub resolver: ConflictResolver,
    pub validator: ValidationEngine,
    catalog: Arc<dyn CatalogRepository>,
    client: Arc<dyn RemoteClient>,
}

impl SyncServices {
    pub fn new(
        cfg: &SyncConfig,
        repo: Arc<dyn MappingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        client: Arc<dyn RemoteClient>,
    ) -> Self {
        let cache: Arc<dyn MappingCache> =
            Arc::new(InMemoryMappingCache::new(cfg.mapping_cache_ttl()));
        let mapping = |kind| {
            MappingService::new(kind, repo.clone(), catalog.clone(), cache.clone())
        };
        let warehouses = mapping(EntityKind::Warehouse);

        Self {
            categories: CategoryMapper::new(
                mapping(EntityKind::Category),
                catalog.clone(),
                client.clone(),
                cfg.language(),
            )
            .with_root_category(cfg.root_category_id),
            price_groups: mapping(EntityKind::PriceGroup),
            stock: StockAggregator::new(warehouses.clone()),
            warehouses,
            stock_import: WarehouseResolver::new(catalog.clone())
                .with_fallback_code(cfg.fallback_warehouse_code.clone()),
            resolver: ConflictResolver::new(cfg.strategy(), cfg.language()),
            validator: ValidationEngine::new(cfg.language(), cfg.default_price_group.clone()),
            catalog,
            client,
        }
    }

    /// Same as [`SyncServices::new`] with mappings stored in the configured
    /// database.
    pub async fn connect(
        cfg: &AppConfig,
        catalog: Arc<dyn CatalogRepository>,
        client: Arc<dyn RemoteClient>,
    ) -> Result<Self, SyncError> {
        let repo = connect(cfg.database()?).await?;
        Ok(Self::new(&cfg.sync, Arc::new(repo), catalog, client))
    }

    /// Fetch remote product `remote_id`, resolve it against `local`, validate
    /// and save the resulting record.
    #[instrument(skip(self, local), fields(product_id = local.product_id, shop_id = %local.shop_id))]
    pub async fn pull_product(
        &self,
        mut local: ProductShopData,
        remote_id: i64,
    ) -> Result<PullOutcome, SyncError> {
        let raw = self.client.fetch(ResourceKind::Product, remote_id).await?;
        let remote = RemoteProduct::decode(&raw);

        let decision = self.resolver.resolve_decoded(&local, &remote);
        if let Some(data) = &decision.data {
            local.apply_sync_data(data);
        }

        if let Some(product) = self.catalog.product(local.product_id).await? {
            let warnings = self.validator.validate_decoded(&product, &remote);
            local.record_validation(self.validator.snapshot(warnings, chrono::Utc::now()));
        }

        self.catalog.save_product_shop_data(&local).await?;
        info!(
            should_update = decision.should_update,
            warnings = local.validation.as_ref().map_or(0, |v| v.warnings.len()),
            "product pulled"
        );
        Ok(PullOutcome {
            decision,
            record: local,
        })
    }

    /// Send the shop's stock quantity of `product_id` to the remote
    /// stock record `stock_available_id`. Returns the quantity sent.
    #[instrument(skip(self), fields(shop_id = %shop))]
    pub async fn push_stock(
        &self,
        product_id: i64,
        shop: ShopId,
        stock_available_id: i64,
    ) -> Result<i64, SyncError> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Product, product_id))?;
        let quantity = self.stock.stock_for_shop(&product, shop).await?;

        let payload = json!({
            "stock_available": {"id": stock_available_id, "quantity": quantity}
        });
        self.client
            .update(ResourceKind::StockAvailable, stock_available_id, &payload)
            .await?;
        info!(product_id, quantity, "stock pushed");
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        product: Value,
        updates: Mutex<Vec<(ResourceKind, i64, Value)>>,
    }

    #[async_trait]
    impl RemoteClient for RecordingClient {
        async fn fetch(&self, _: ResourceKind, id: i64) -> Result<Value, RemoteError> {
            if id == 404 {
                return Err(RemoteError::new(Some(404), "Not Found"));
            }
            Ok(self.product.clone())
        }
        async fn create(&self, _: ResourceKind, _: &Value) -> Result<Value, RemoteError> {
            Err(RemoteError::new(Some(405), "not used"))
        }
        async fn update(&self, kind: ResourceKind, id: i64, data: &Value) -> Result<Value, RemoteError> {
            self.updates.lock().unwrap().push((kind, id, data.clone()));
            Ok(data.clone())
        }
    }

    fn product() -> Product {
        Product {
            id: 10,
            sku: "KH-01".into(),
            name: "Klocki".into(),
            short_description: None,
            long_description: None,
            is_active: true,
            category_ids: vec![],
            prices: vec![],
            stock: vec![
                StockLevel { product_id: 10, warehouse_id: 1, quantity: 4 },
                StockLevel { product_id: 10, warehouse_id: 2, quantity: 6 },
            ],
        }
    }

    fn services(strategy: &str, client: Arc<RecordingClient>) -> (SyncServices, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(InMemoryCatalog::new().with_product(product()));
        let cfg = SyncConfig {
            conflict_resolution: strategy.into(),
            ..SyncConfig::default()
        };
        let svc = SyncServices::new(
            &cfg,
            Arc::new(InMemoryMappingRepository::new()),
            catalog.clone(),
            client,
        );
        (svc, catalog)
    }

    fn local() -> ProductShopData {
        let mut l = ProductShopData::new(10, ShopId(1), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        l.name = Some("Klocki".into());
        l
    }

    #[tokio::test]
    async fn pull_applies_remote_data_and_records_validation() {
        let client = Arc::new(RecordingClient {
            product: json!({"product": {"name": "Klocki tył", "active": "1", "quantity": "10"}}),
            ..Default::default()
        });
        let (svc, catalog) = services("prestashop_wins", client);

        let outcome = svc.pull_product(local(), 77).await.unwrap();
        assert!(outcome.decision.should_update);

        let saved = catalog.product_shop_data(10, ShopId(1)).unwrap();
        assert_eq!(saved.name.as_deref(), Some("Klocki tył"));
        assert!(saved.last_pulled_at.is_some());
        assert!(saved.has_validation_warnings());
        let fields: Vec<_> = saved
            .validation
            .unwrap()
            .warnings
            .into_iter()
            .map(|w| w.field)
            .collect();
        assert_eq!(fields, vec!["name", "categories"]);
    }

    #[tokio::test]
    async fn pull_propagates_remote_not_found() {
        let (svc, catalog) = services("ppm_wins", Arc::new(RecordingClient::default()));
        let err = svc.pull_product(local(), 404).await.unwrap_err();
        assert!(err.is_remote_not_found());
        assert!(catalog.product_shop_data(10, ShopId(1)).is_none());
    }

    #[tokio::test]
    async fn push_stock_sends_shop_quantity() {
        let client = Arc::new(RecordingClient::default());
        let (svc, _) = services("ppm_wins", client.clone());

        assert_eq!(svc.push_stock(10, ShopId(1), 55).await.unwrap(), 10);
        let updates = client.updates.lock().unwrap();
        assert_eq!(updates[0].0, ResourceKind::StockAvailable);
        assert_eq!(updates[0].2["stock_available"]["quantity"], json!(10));

        drop(updates);
        assert!(matches!(
            svc.push_stock(99, ShopId(1), 55).await,
            Err(SyncError::NotFound { kind: EntityKind::Product, .. })
        ));
    }
}
