//! # Shopsync: library usage example
//!
//! Shows the common patterns for consuming shopsync as a Rust library,
//! fully in memory (no database, no shop):
//!
//! 1. **Category mapping**: create remote categories on demand
//! 2. **Pull a product**: resolve conflicts, validate, save
//! 3. **Stock**: aggregate for export, import with warehouse fallback
//!
//! Run with:
//!   cargo run --example reconcile_as_lib
//!
//! Pass a TOML file to use its `[sync]` settings:
//!   cargo run --example reconcile_as_lib -- shopsync.toml

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use shopsync::{
    AppConfig, Category, InMemoryCatalog, InMemoryMappingRepository, Product, ProductShopData,
    RemoteClient, RemoteError, ResourceKind, ShopId, StockLevel, SyncServices, Warehouse,
};

const SHOP: ShopId = ShopId(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cfg = AppConfig::load(args.get(1).map(Path::new))?;

    let services = SyncServices::new(
        &cfg.sync,
        Arc::new(InMemoryMappingRepository::new()),
        Arc::new(demo_catalog()),
        Arc::new(CannedShop::default()),
    );

    category_mapping(&services).await?;
    pull_product(&services).await?;
    stock(&services).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1: categories
// ─────────────────────────────────────────────────────────────────────────────
async fn category_mapping(services: &SyncServices) -> Result<()> {
    println!("=== Pattern 1: category mapping ===\n");

    let report = services
        .categories
        .sync_product_categories(&[6, 404], SHOP)
        .await;
    for (local, remote) in &report.mapped {
        println!("  category {local} → remote {remote}");
    }
    for (local, reason) in &report.failed {
        println!("  category {local} failed: {reason}");
    }

    // Second call is served from the mapping store; no remote call is made.
    let again = services.categories.ensure_category_exists(6, SHOP).await?;
    println!("  category 6 is still remote {again}\n");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2: pull one product
// ─────────────────────────────────────────────────────────────────────────────
async fn pull_product(services: &SyncServices) -> Result<()> {
    println!("=== Pattern 2: pull product ({}) ===\n", services.resolver.strategy());

    let mut local = ProductShopData::new(10, SHOP, Utc::now());
    local.name = Some("Klocki hamulcowe przód".into());

    let outcome = services.pull_product(local, 77).await?;
    println!("  decision: {}", outcome.decision.reason);
    for conflict in outcome.decision.conflicts() {
        println!(
            "  conflict on {}: {} vs {}",
            conflict.field, conflict.local_value, conflict.remote_value
        );
    }
    if let Some(snapshot) = &outcome.record.validation {
        for w in &snapshot.warnings {
            println!("  [{}] {}: {}", w.severity, w.field, w.message);
        }
    }
    println!();
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 3: stock in both directions
// ─────────────────────────────────────────────────────────────────────────────
async fn stock(services: &SyncServices) -> Result<()> {
    println!("=== Pattern 3: stock ===\n");

    let sent = services.push_stock(10, SHOP, 501).await?;
    println!("  pushed quantity {sent} (no warehouse mapped: all warehouses)");

    services
        .warehouses
        .create_or_update_mapping(2, SHOP, 1, Some("Sklep".into()))
        .await?;
    let sent = services.push_stock(10, SHOP, 501).await?;
    println!("  pushed quantity {sent} (warehouse 2 only)");

    let report = services
        .stock_import
        .import_stock(SHOP, &[(10, json!({"quantity": "9"})), (11, json!({}))])
        .await;
    println!(
        "  imported {} record(s) into warehouse {:?} ({:?}), {} failed\n",
        report.imported.len(),
        report.warehouse_id,
        report.degraded,
        report.failed.len()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory fixtures
// ─────────────────────────────────────────────────────────────────────────────

fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_category(Category {
            id: 5,
            parent_id: None,
            name: "Hamulce".into(),
            slug: None,
            description: None,
            is_active: true,
        })
        .with_category(Category {
            id: 6,
            parent_id: Some(5),
            name: "Klocki hamulcowe".into(),
            slug: None,
            description: Some("Klocki do tarcz".into()),
            is_active: true,
        })
        .with_warehouse(Warehouse {
            id: 1,
            code: "mpptrade".into(),
            name: "MPP Trade".into(),
            is_default: true,
            shop_links: BTreeSet::new(),
        })
        .with_warehouse(Warehouse {
            id: 2,
            code: "sklep".into(),
            name: "Magazyn sklepu".into(),
            is_default: false,
            shop_links: BTreeSet::new(),
        })
        .with_product(Product {
            id: 10,
            sku: "KH-01".into(),
            name: "Klocki hamulcowe przód".into(),
            short_description: None,
            long_description: None,
            is_active: true,
            category_ids: vec![6],
            prices: vec![],
            stock: vec![
                StockLevel { product_id: 10, warehouse_id: 1, quantity: 12 },
                StockLevel { product_id: 10, warehouse_id: 2, quantity: 3 },
            ],
        })
}

/// Answers every fetch with the same product and assigns increasing ids.
#[derive(Default)]
struct CannedShop {
    next_id: AtomicI64,
}

#[async_trait]
impl RemoteClient for CannedShop {
    async fn fetch(&self, _: ResourceKind, id: i64) -> Result<Value, RemoteError> {
        Ok(json!({"product": {
            "id": id.to_string(),
            "name": {"language": [{"id": "1", "value": "Klocki hamulcowe tył"}]},
            "active": "1",
            "price": "120.000000",
            "quantity": "15",
            "date_upd": "2025-05-01 12:00:00",
            "associations": {"categories": [{"id": "101"}]}
        }}))
    }

    async fn create(&self, resource: ResourceKind, data: &Value) -> Result<Value, RemoteError> {
        let id = 100 + self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut record = data
            .get(resource.record_key())
            .cloned()
            .unwrap_or_else(|| json!({}));
        record["id"] = json!(id.to_string());
        let mut envelope = serde_json::Map::new();
        envelope.insert(resource.record_key().to_string(), record);
        Ok(Value::Object(envelope))
    }

    async fn update(&self, _: ResourceKind, _: i64, data: &Value) -> Result<Value, RemoteError> {
        Ok(data.clone())
    }
}
