use anyhow::Result;
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: identifier quoting, placeholders, upsert syntax and text
/// decoding.
///
/// Implemented per driver. Query builders in [`super::mapping_repository`]
/// only ever branch through these methods, never on the driver name.
pub trait Dialect: Send + Sync {
    /// Return the driver name as a lowercase string ("postgres", "mysql", …).
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column) per dialect.
    /// - MySQL / MariaDB → backtick: `` `col` ``
    /// - PostgreSQL / SQLite → double-quote: `"col"`
    fn quote_ident(&self, s: &str) -> String;

    /// Bind placeholder for the `n`-th (1-based) parameter.
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    /// Clause appended to an `INSERT` so an existing row with the same
    /// `key_cols` gets `update_cols` overwritten and `is_active` restored.
    fn upsert_clause(&self, key_cols: &[&str], update_cols: &[&str]) -> String {
        let keys: Vec<String> = key_cols.iter().map(|c| self.quote_ident(c)).collect();
        let sets: Vec<String> = update_cols
            .iter()
            .map(|c| {
                let col = self.quote_ident(c);
                format!("{col} = excluded.{col}")
            })
            .collect();
        format!(
            "ON CONFLICT ({}) DO UPDATE SET {}, {} = TRUE",
            keys.join(", "),
            sets.join(", "),
            self.quote_ident("is_active")
        )
    }

    /// Read a nullable text column.
    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        Ok(row.try_get(idx)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL / MariaDB
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("`{}`", s.replace('`', "``"))
    }

    fn upsert_clause(&self, _key_cols: &[&str], update_cols: &[&str]) -> String {
        // The conflict target is implied by the primary key.
        let sets: Vec<String> = update_cols
            .iter()
            .map(|c| {
                let col = self.quote_ident(c);
                format!("{col} = VALUES({col})")
            })
            .collect();
        format!(
            "ON DUPLICATE KEY UPDATE {}, {} = TRUE",
            sets.join(", "),
            self.quote_ident("is_active")
        )
    }

    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        // Binary-collated text reaches AnyRow as BLOB.
        if row.column(idx).type_info().name() == "BLOB" {
            let bytes: Option<Vec<u8>> = row.try_get(idx)?;
            return Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()));
        }
        Ok(row.try_get(idx)?)
    }
}

// MariaDB shares MySQL's wire protocol and AnyRow behaviour.
pub struct MariadbDialect;

impl Dialect for MariadbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn quote_ident(&self, s: &str) -> String {
        MysqlDialect.quote_ident(s)
    }

    fn upsert_clause(&self, key_cols: &[&str], update_cols: &[&str]) -> String {
        MysqlDialect.upsert_clause(key_cols, update_cols)
    }

    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        MysqlDialect.decode_text(row, idx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve the dialect from a driver name string; unknown names mean postgres.
pub fn from_driver(driver: &str) -> Box<dyn Dialect> {
    match driver {
        "mysql" => Box::new(MysqlDialect),
        "mariadb" => Box::new(MariadbDialect),
        "sqlite" => Box::new(SqliteDialect),
        _ => Box::new(PostgresDialect),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(PostgresDialect.quote_ident(r#"ta"ble"#), r#""ta""ble""#);
        assert_eq!(MysqlDialect.quote_ident("ta`ble"), "`ta``ble`");
        assert_eq!(SqliteDialect.quote_ident("shop_id"), r#""shop_id""#);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(PostgresDialect.placeholder(3), "$3");
        assert_eq!(MysqlDialect.placeholder(3), "?");
        assert_eq!(SqliteDialect.placeholder(1), "?");
    }

    #[test]
    fn test_upsert_clause_on_conflict() {
        assert_eq!(
            SqliteDialect.upsert_clause(&["a", "b"], &["c"]),
            r#"ON CONFLICT ("a", "b") DO UPDATE SET "c" = excluded."c", "is_active" = TRUE"#
        );
    }

    #[test]
    fn test_upsert_clause_mysql() {
        assert_eq!(
            MariadbDialect.upsert_clause(&["a"], &["c", "d"]),
            "ON DUPLICATE KEY UPDATE `c` = VALUES(`c`), `d` = VALUES(`d`), `is_active` = TRUE"
        );
    }

    #[test]
    fn test_from_driver_names() {
        assert_eq!(from_driver("postgres").name(), "postgres");
        assert_eq!(from_driver("mysql").name(), "mysql");
        assert_eq!(from_driver("mariadb").name(), "mariadb");
        assert_eq!(from_driver("sqlite").name(), "sqlite");
        assert_eq!(from_driver("unknown").name(), "postgres");
    }
}
