use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use std::sync::Arc;
use tracing::debug;

use crate::domain::mapping::{EntityMapping, MappingKey, NewMapping};
use crate::domain::ports::MappingRepository;
use crate::domain::value_objects::{EntityKind, ShopId};
use crate::infrastructure::db::dialect::Dialect;

pub const MAPPINGS_TABLE: &str = "shop_mappings";

const KEY_COLUMNS: [&str; 3] = ["shop_id", "entity_kind", "local_value"];
const VALUE_COLUMNS: [&str; 2] = ["remote_id", "remote_label"];

/// [`MappingRepository`] over an sqlx `Any` pool.
pub struct SqlxMappingRepository {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
}

impl SqlxMappingRepository {
    pub fn new(pool: AnyPool, dialect: Arc<dyn Dialect>) -> Self {
        Self { pool, dialect }
    }

    /// Create the mappings table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let sql = create_table_sql(self.dialect.as_ref());
        debug!("Executing: {}", sql);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {MAPPINGS_TABLE}"))?;
        Ok(())
    }

    fn decode(&self, row: &AnyRow) -> Result<EntityMapping> {
        let kind_text = self.dialect.decode_text(row, 1)?.unwrap_or_default();
        let entity_kind: EntityKind = kind_text
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("Unexpected entity kind in {MAPPINGS_TABLE}"))?;
        Ok(EntityMapping {
            shop_id: ShopId(row.try_get(0)?),
            entity_kind,
            local_value: self.dialect.decode_text(row, 2)?.unwrap_or_default(),
            remote_id: row.try_get(3)?,
            remote_label: self.dialect.decode_text(row, 4)?,
            // Only active rows are ever selected.
            is_active: true,
        })
    }
}

#[async_trait]
impl MappingRepository for SqlxMappingRepository {
    async fn find_active(&self, key: &MappingKey) -> Result<Option<EntityMapping>> {
        let sql = select_sql(self.dialect.as_ref(), &KEY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(key.shop_id.0)
            .bind(key.entity_kind.as_str())
            .bind(key.local_value.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up mapping {key:?}"))?;
        row.as_ref().map(|r| self.decode(r)).transpose()
    }

    async fn find_active_by_remote(
        &self,
        shop: ShopId,
        kind: EntityKind,
        remote_id: i64,
    ) -> Result<Option<EntityMapping>> {
        let sql = select_sql(self.dialect.as_ref(), &["shop_id", "entity_kind", "remote_id"]);
        let row = sqlx::query(&sql)
            .bind(shop.0)
            .bind(kind.as_str())
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up {kind} by remote id {remote_id}"))?;
        row.as_ref().map(|r| self.decode(r)).transpose()
    }

    async fn upsert(&self, mapping: NewMapping) -> Result<EntityMapping> {
        let sql = upsert_sql(self.dialect.as_ref());
        sqlx::query(&sql)
            .bind(mapping.key.shop_id.0)
            .bind(mapping.key.entity_kind.as_str())
            .bind(mapping.key.local_value.as_str())
            .bind(mapping.remote_id)
            .bind(mapping.remote_label.clone())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to upsert mapping {:?}", mapping.key))?;
        Ok(mapping.into_mapping())
    }

    async fn deactivate(&self, key: &MappingKey) -> Result<bool> {
        let sql = deactivate_sql(self.dialect.as_ref());
        let result = sqlx::query(&sql)
            .bind(key.shop_id.0)
            .bind(key.entity_kind.as_str())
            .bind(key.local_value.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to deactivate mapping {key:?}"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self, shop: ShopId, kind: EntityKind) -> Result<Vec<EntityMapping>> {
        let sql = format!(
            "{} ORDER BY {}",
            select_sql(self.dialect.as_ref(), &["shop_id", "entity_kind"]),
            self.dialect.quote_ident("local_value")
        );
        let rows = sqlx::query(&sql)
            .bind(shop.0)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {kind} mappings for shop {shop}"))?;
        rows.iter().map(|r| self.decode(r)).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

fn table(dialect: &dyn Dialect) -> String {
    dialect.quote_ident(MAPPINGS_TABLE)
}

/// `col1 = p1 AND col2 = p2 …`, placeholders numbered from 1.
fn where_eq(dialect: &dyn Dialect, cols: &[&str]) -> String {
    cols.iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", dialect.quote_ident(c), dialect.placeholder(i + 1)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Active rows matching `filter_cols`, selected in decode order.
pub fn select_sql(dialect: &dyn Dialect, filter_cols: &[&str]) -> String {
    let cols: Vec<String> = KEY_COLUMNS
        .iter()
        .chain(VALUE_COLUMNS.iter())
        .map(|c| dialect.quote_ident(c))
        .collect();
    format!(
        "SELECT {} FROM {} WHERE {} AND {} = TRUE",
        cols.join(", "),
        table(dialect),
        where_eq(dialect, filter_cols),
        dialect.quote_ident("is_active")
    )
}

pub fn upsert_sql(dialect: &dyn Dialect) -> String {
    let cols: Vec<String> = KEY_COLUMNS
        .iter()
        .chain(VALUE_COLUMNS.iter())
        .chain(["is_active"].iter())
        .map(|c| dialect.quote_ident(c))
        .collect();
    let values: Vec<String> = (1..=KEY_COLUMNS.len() + VALUE_COLUMNS.len())
        .map(|n| dialect.placeholder(n))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}, TRUE) {}",
        table(dialect),
        cols.join(", "),
        values.join(", "),
        dialect.upsert_clause(&KEY_COLUMNS, &VALUE_COLUMNS)
    )
}

pub fn deactivate_sql(dialect: &dyn Dialect) -> String {
    let active = dialect.quote_ident("is_active");
    format!(
        "UPDATE {} SET {active} = FALSE WHERE {} AND {active} = TRUE",
        table(dialect),
        where_eq(dialect, &KEY_COLUMNS)
    )
}

/// Portable DDL: the key columns form the primary key, which is the
/// conflict target of [`upsert_sql`].
pub fn create_table_sql(dialect: &dyn Dialect) -> String {
    let q = |c: &str| dialect.quote_ident(c);
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         {} BIGINT NOT NULL, \
         {} VARCHAR(32) NOT NULL, \
         {} VARCHAR(191) NOT NULL, \
         {} BIGINT NOT NULL, \
         {} VARCHAR(255) NULL, \
         {} BOOLEAN NOT NULL DEFAULT TRUE, \
         PRIMARY KEY ({}, {}, {}))",
        table(dialect),
        q("shop_id"),
        q("entity_kind"),
        q("local_value"),
        q("remote_id"),
        q("remote_label"),
        q("is_active"),
        q("shop_id"),
        q("entity_kind"),
        q("local_value"),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::dialect::{MysqlDialect, PostgresDialect, SqliteDialect};

    #[test]
    fn test_select_sql_postgres() {
        assert_eq!(
            select_sql(&PostgresDialect, &KEY_COLUMNS),
            r#"SELECT "shop_id", "entity_kind", "local_value", "remote_id", "remote_label" FROM "shop_mappings" WHERE "shop_id" = $1 AND "entity_kind" = $2 AND "local_value" = $3 AND "is_active" = TRUE"#
        );
    }

    #[test]
    fn test_upsert_sql_postgres() {
        assert_eq!(
            upsert_sql(&PostgresDialect),
            r#"INSERT INTO "shop_mappings" ("shop_id", "entity_kind", "local_value", "remote_id", "remote_label", "is_active") VALUES ($1, $2, $3, $4, $5, TRUE) ON CONFLICT ("shop_id", "entity_kind", "local_value") DO UPDATE SET "remote_id" = excluded."remote_id", "remote_label" = excluded."remote_label", "is_active" = TRUE"#
        );
    }

    #[test]
    fn test_upsert_sql_mysql() {
        let sql = upsert_sql(&MysqlDialect);
        assert!(sql.contains("VALUES (?, ?, ?, ?, ?, TRUE)"));
        assert!(sql.ends_with(
            "ON DUPLICATE KEY UPDATE `remote_id` = VALUES(`remote_id`), `remote_label` = VALUES(`remote_label`), `is_active` = TRUE"
        ));
    }

    #[test]
    fn test_deactivate_sql_only_touches_active_rows() {
        assert_eq!(
            deactivate_sql(&MysqlDialect),
            "UPDATE `shop_mappings` SET `is_active` = FALSE WHERE `shop_id` = ? AND `entity_kind` = ? AND `local_value` = ? AND `is_active` = TRUE"
        );
    }

    #[test]
    fn test_create_table_sql_has_primary_key() {
        let sql = create_table_sql(&SqliteDialect);
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "shop_mappings""#));
        assert!(sql.ends_with(r#"PRIMARY KEY ("shop_id", "entity_kind", "local_value"))"#));
    }
}
