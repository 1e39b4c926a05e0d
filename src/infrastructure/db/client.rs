use anyhow::{Context, Result};
use sqlx::any::AnyPoolOptions;
use std::sync::Arc;
use tracing::debug;

use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::from_driver;
use crate::infrastructure::db::mapping_repository::SqlxMappingRepository;

/// Connect to the database described in `cfg` and return a
/// `SqlxMappingRepository` with its table in place.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxMappingRepository> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {} (driver: {})",
                cfg.dbname, cfg.driver
            )
        })?;

    debug!(
        "Connected to {}/{} via {} driver",
        cfg.host, cfg.dbname, cfg.driver
    );

    let repo = SqlxMappingRepository::new(pool, Arc::from(from_driver(&cfg.driver)));
    repo.ensure_schema().await?;
    Ok(repo)
}
