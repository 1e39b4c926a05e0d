use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::application::conflict::ResolutionStrategy;
use crate::domain::error::SyncError;
use crate::domain::value_objects::{LanguageId, ShopId};

/// Prefix of environment overrides, e.g. `SHOPSYNC__SYNC__LANGUAGE_ID=2`.
const ENV_PREFIX: &str = "SHOPSYNC";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub database: Option<DbConfig>,
    #[serde(default)]
    pub shops: Vec<ShopConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// One of `ppm_wins`, `prestashop_wins`, `newest_wins`, `manual`.
    pub conflict_resolution: String,
    pub language_id: i64,
    pub mapping_cache_ttl_secs: u64,
    /// Price group compared with the remote price during validation.
    pub default_price_group: String,
    pub fallback_warehouse_code: String,
    pub root_category_id: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_resolution: "ppm_wins".to_string(),
            language_id: 1,
            mapping_cache_ttl_secs: 900,
            default_price_group: "detaliczna".to_string(),
            fallback_warehouse_code: "mpptrade".to_string(),
            root_category_id: 2,
        }
    }
}

impl SyncConfig {
    pub fn strategy(&self) -> ResolutionStrategy {
        ResolutionStrategy::from_setting(&self.conflict_resolution)
    }

    pub fn language(&self) -> LanguageId {
        LanguageId(self.language_id)
    }

    pub fn mapping_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.mapping_cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "postgres" (default), "mysql", "mariadb", or "sqlite".
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub dbname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_driver() -> String {
    "postgres".to_string()
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
            "sqlite" => format!("sqlite://{}?mode=rwc", self.dbname),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
        }
    }
}

/// Connection settings of one remote shop.
#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    pub id: ShopId,
    pub name: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl AppConfig {
    /// Load `path` (TOML) when given, then apply `SHOPSYNC__*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .map_err(|e| match path {
                Some(p) => SyncError::Configuration(format!("{}: {e}", p.display())),
                None => SyncError::Configuration(e.to_string()),
            })
    }

    /// Settings of shop `id`; it must carry both an API URL and key.
    pub fn shop(&self, id: ShopId) -> Result<&ShopConfig, SyncError> {
        let shop = self
            .shops
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SyncError::Configuration(format!("shop {id} is not configured")))?;
        if shop.api_url.trim().is_empty() || shop.api_key.trim().is_empty() {
            return Err(SyncError::Configuration(format!(
                "shop {id} ({}) has no API URL or key",
                shop.name
            )));
        }
        Ok(shop)
    }

    pub fn database(&self) -> Result<&DbConfig, SyncError> {
        self.database
            .as_ref()
            .ok_or_else(|| SyncError::Configuration("no [database] section".to_string()))
    }
}
