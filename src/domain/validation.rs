use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// One discrepancy between the local and remote view of a product.
///
/// Severity is derived from the field and the size of the difference; it
/// is never configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub severity: Severity,
    pub message: String,
    pub local_value: Value,
    pub remote_value: Value,
}

/// Warnings persisted on the product-shop record after a check.
///
/// `has_warnings` is stored next to the list for cheap filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSnapshot {
    pub snapshot_id: String,
    pub warnings: Vec<ValidationWarning>,
    pub has_warnings: bool,
    pub checked_at: DateTime<Utc>,
}

impl ValidationSnapshot {
    pub fn new(warnings: Vec<ValidationWarning>, checked_at: DateTime<Utc>) -> Self {
        Self {
            snapshot_id: format!(
                "vs_{}_{}",
                checked_at.format("%Y%m%d_%H%M%S"),
                uuid::Uuid::new_v4().simple()
            ),
            has_warnings: !warnings.is_empty(),
            warnings,
            checked_at,
        }
    }

    /// Highest severity present, if any.
    pub fn worst(&self) -> Option<Severity> {
        self.warnings.iter().map(|w| w.severity).max()
    }
}
