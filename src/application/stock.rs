use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::mapping::MappingService;
use crate::domain::error::{DegradedResolution, SyncError};
use crate::domain::ports::CatalogRepository;
use crate::domain::records::{Product, StockLevel, Warehouse};
use crate::domain::remote::integer;
use crate::domain::value_objects::{EntityKind, ShopId};

/// Code of the warehouse used when a shop has no link and there is no default.
pub const FALLBACK_WAREHOUSE_CODE: &str = "mpptrade";

// ─── Export direction ────────────────────────────────────────────────────────

/// Quantity of a product to report to one shop.
pub struct StockAggregator {
    warehouses: MappingService,
}

impl StockAggregator {
    /// `warehouses` must be the mapping service for [`EntityKind::Warehouse`].
    pub fn new(warehouses: MappingService) -> Self {
        Self { warehouses }
    }

    /// Sum over warehouses mapped to `shop`; all warehouses when none is.
    pub async fn stock_for_shop(&self, product: &Product, shop: ShopId) -> Result<i64, SyncError> {
        let mapped: BTreeSet<i64> = self
            .warehouses
            .all_mappings_for_shop(shop)
            .await?
            .iter()
            .filter_map(|m| m.local_id())
            .collect();

        if mapped.is_empty() {
            let total = product.total_stock();
            warn!(
                product_id = product.id,
                shop_id = %shop,
                fallback = ?DegradedResolution::AllWarehouses,
                total,
                "no warehouse mapped for shop, reporting stock of all warehouses"
            );
            return Ok(total);
        }

        let total = product
            .stock
            .iter()
            .filter(|s| mapped.contains(&s.warehouse_id))
            .map(|s| s.quantity)
            .fold(0i64, i64::saturating_add);
        debug!(product_id = product.id, shop_id = %shop, warehouses = mapped.len(), total, "stock aggregated");
        Ok(total)
    }
}

// ─── Import direction ────────────────────────────────────────────────────────

/// Local warehouse chosen for stock pulled from one shop.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWarehouse {
    pub warehouse: Warehouse,
    /// Set when the warehouse came from a fallback rule, not a shop link.
    pub degraded: Option<DegradedResolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockImportReport {
    pub warehouse_id: Option<i64>,
    pub degraded: Option<DegradedResolution>,
    pub imported: Vec<StockLevel>,
    /// Local product id → reason.
    pub failed: BTreeMap<i64, String>,
}

/// Picks the local warehouse for remote stock using the shop links stored on
/// warehouse records, not the mapping table.
pub struct WarehouseResolver {
    catalog: Arc<dyn CatalogRepository>,
    fallback_code: String,
}

impl WarehouseResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            catalog,
            fallback_code: FALLBACK_WAREHOUSE_CODE.to_string(),
        }
    }

    pub fn with_fallback_code(mut self, code: impl Into<String>) -> Self {
        self.fallback_code = code.into();
        self
    }

    /// Linked warehouse, else the default one, else the fallback code.
    pub async fn resolve_for_import(&self, shop: ShopId) -> Result<ResolvedWarehouse, SyncError> {
        let warehouses = self.catalog.warehouses().await?;

        if let Some(w) = warehouses.iter().find(|w| w.is_linked_to(shop)) {
            return Ok(ResolvedWarehouse {
                warehouse: w.clone(),
                degraded: None,
            });
        }

        let fallback = warehouses
            .iter()
            .find(|w| w.is_default)
            .map(|w| (w, DegradedResolution::DefaultWarehouse))
            .or_else(|| {
                warehouses
                    .iter()
                    .find(|w| w.code == self.fallback_code)
                    .map(|w| (w, DegradedResolution::FallbackWarehouse))
            });

        match fallback {
            Some((w, rule)) => {
                warn!(
                    shop_id = %shop,
                    warehouse = %w.code,
                    fallback = ?rule,
                    "no warehouse linked to shop, using fallback"
                );
                Ok(ResolvedWarehouse {
                    warehouse: w.clone(),
                    degraded: Some(rule),
                })
            }
            None => {
                warn!(shop_id = %shop, "no warehouse available for stock import");
                Err(SyncError::not_found(
                    EntityKind::Warehouse,
                    format!("for shop {shop}"),
                ))
            }
        }
    }

    /// Import remote stock records given as `(local product id, record)`.
    ///
    /// Records without a readable `quantity` or failing to save are listed
    /// in `failed`; the rest of the batch still runs.
    #[instrument(skip(self, items), fields(shop_id = %shop, items = items.len()))]
    pub async fn import_stock(&self, shop: ShopId, items: &[(i64, Value)]) -> StockImportReport {
        let mut report = StockImportReport::default();

        let resolved = match self.resolve_for_import(shop).await {
            Ok(r) => r,
            Err(e) => {
                let reason = e.to_string();
                for (product_id, _) in items {
                    report.failed.insert(*product_id, reason.clone());
                }
                return report;
            }
        };
        report.warehouse_id = Some(resolved.warehouse.id);
        report.degraded = resolved.degraded;

        for (product_id, record) in items {
            let Some(quantity) = stock_quantity(record) else {
                warn!(product_id, "remote stock record has no quantity");
                report
                    .failed
                    .insert(*product_id, "missing quantity".to_string());
                continue;
            };

            let level = StockLevel {
                product_id: *product_id,
                warehouse_id: resolved.warehouse.id,
                quantity,
            };
            match self.catalog.save_stock_level(&level).await {
                Ok(()) => report.imported.push(level),
                Err(e) => {
                    warn!(product_id, error = %e, "saving stock level failed");
                    report.failed.insert(*product_id, format!("{e:#}"));
                }
            }
        }

        info!(
            warehouse_id = resolved.warehouse.id,
            imported = report.imported.len(),
            failed = report.failed.len(),
            "stock import finished"
        );
        report
    }
}

/// `quantity` of a stock record, optionally wrapped in `{"stock_available": ..}`.
fn stock_quantity(record: &Value) -> Option<i64> {
    let record = record.get("stock_available").unwrap_or(record);
    record.get("quantity").and_then(integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::ProductPrice;
    use crate::infrastructure::cache::InMemoryMappingCache;
    use crate::infrastructure::memory::{InMemoryCatalog, InMemoryMappingRepository};
    use serde_json::json;

    const SHOP: ShopId = ShopId(1);

    fn warehouse(id: i64, code: &str, is_default: bool, links: &[i64]) -> Warehouse {
        Warehouse {
            id,
            code: code.into(),
            name: code.to_uppercase(),
            is_default,
            shop_links: links.iter().map(|s| ShopId(*s)).collect(),
        }
    }

    fn product(quantities: &[i64]) -> Product {
        Product {
            id: 1,
            sku: "KH-01".into(),
            name: "Klocki".into(),
            short_description: None,
            long_description: None,
            is_active: true,
            category_ids: vec![],
            prices: vec![ProductPrice {
                price_group: "detaliczna".into(),
                price: 10.0,
            }],
            stock: quantities
                .iter()
                .enumerate()
                .map(|(i, q)| StockLevel {
                    product_id: 1,
                    warehouse_id: i as i64 + 1,
                    quantity: *q,
                })
                .collect(),
        }
    }

    fn aggregator() -> (StockAggregator, MappingService) {
        let catalog = Arc::new(
            InMemoryCatalog::new()
                .with_warehouse(warehouse(1, "a", true, &[]))
                .with_warehouse(warehouse(2, "b", false, &[]))
                .with_warehouse(warehouse(3, "c", false, &[])),
        );
        let svc = MappingService::new(
            EntityKind::Warehouse,
            Arc::new(InMemoryMappingRepository::new()),
            catalog,
            Arc::new(InMemoryMappingCache::default()),
        );
        (StockAggregator::new(svc.clone()), svc)
    }

    #[tokio::test]
    async fn unmapped_shop_sums_all_warehouses() {
        let (agg, _) = aggregator();
        assert_eq!(agg.stock_for_shop(&product(&[10, 5, 0]), SHOP).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn mapped_shop_sums_only_mapped_warehouses() {
        let (agg, svc) = aggregator();
        svc.create_or_update_mapping(3, SHOP, 900, None).await.unwrap();

        assert_eq!(agg.stock_for_shop(&product(&[10, 5, 7]), SHOP).await.unwrap(), 7);
        assert_eq!(agg.stock_for_shop(&product(&[10, 5, 7]), ShopId(2)).await.unwrap(), 22);
    }

    fn resolver(warehouses: Vec<Warehouse>) -> (WarehouseResolver, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(
            warehouses
                .into_iter()
                .fold(InMemoryCatalog::new(), InMemoryCatalog::with_warehouse),
        );
        (WarehouseResolver::new(catalog.clone()), catalog)
    }

    #[tokio::test]
    async fn import_prefers_linked_warehouse() {
        let (r, _) = resolver(vec![
            warehouse(1, "mpptrade", true, &[]),
            warehouse(2, "sklep", false, &[1]),
        ]);
        let resolved = r.resolve_for_import(SHOP).await.unwrap();
        assert_eq!(resolved.warehouse.id, 2);
        assert_eq!(resolved.degraded, None);
    }

    #[tokio::test]
    async fn import_falls_back_to_default_then_code() {
        let (r, _) = resolver(vec![
            warehouse(1, "mpptrade", false, &[]),
            warehouse(2, "glowny", true, &[5]),
        ]);
        let resolved = r.resolve_for_import(SHOP).await.unwrap();
        assert_eq!(resolved.warehouse.id, 2);
        assert_eq!(resolved.degraded, Some(DegradedResolution::DefaultWarehouse));

        let (r, _) = resolver(vec![
            warehouse(1, "mpptrade", false, &[]),
            warehouse(2, "inny", false, &[]),
        ]);
        let resolved = r.resolve_for_import(SHOP).await.unwrap();
        assert_eq!(resolved.warehouse.id, 1);
        assert_eq!(resolved.degraded, Some(DegradedResolution::FallbackWarehouse));
    }

    #[tokio::test]
    async fn import_without_any_candidate_fails_every_record() {
        let (r, catalog) = resolver(vec![warehouse(1, "inny", false, &[])]);
        assert!(matches!(
            r.resolve_for_import(SHOP).await,
            Err(SyncError::NotFound { kind: EntityKind::Warehouse, .. })
        ));

        let report = r
            .import_stock(SHOP, &[(1, json!({"quantity": "3"})), (2, json!({"quantity": 4}))])
            .await;
        assert_eq!(report.failed.len(), 2);
        assert!(report.imported.is_empty());
        assert!(catalog.stock_levels().is_empty());
    }

    #[tokio::test]
    async fn import_continues_past_bad_records() {
        let (r, catalog) = resolver(vec![warehouse(7, "mpptrade", true, &[])]);
        let report = r
            .import_stock(
                SHOP,
                &[
                    (1, json!({"quantity": "3"})),
                    (2, json!({"id": "9"})),
                    (3, json!({"stock_available": {"quantity": 12}})),
                ],
            )
            .await;

        assert_eq!(report.warehouse_id, Some(7));
        assert_eq!(report.degraded, Some(DegradedResolution::DefaultWarehouse));
        assert_eq!(report.failed.keys().collect::<Vec<_>>(), vec![&2]);
        assert_eq!(
            catalog.stock_levels(),
            vec![
                StockLevel { product_id: 1, warehouse_id: 7, quantity: 3 },
                StockLevel { product_id: 3, warehouse_id: 7, quantity: 12 },
            ]
        );
    }
}
