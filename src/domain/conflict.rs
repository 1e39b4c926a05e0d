use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single field where the local and remote values disagree while the
/// local value is non-empty.
///
/// Long text values are shortened for display; the data applied on update
/// is never shortened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConflict {
    pub field: String,
    pub local_value: Value,
    pub remote_value: Value,
}

/// Remote data normalized to the local product-shop shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSyncData {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_active: bool,
    /// Remote weight as received.
    pub weight: Value,
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub length: Option<f64>,
    pub ean: Option<String>,
    pub sku: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub sort_order: i64,
    pub last_pulled_at: DateTime<Utc>,
}

impl ProductSyncData {
    pub fn empty(pulled_at: DateTime<Utc>) -> Self {
        Self {
            name: None,
            slug: None,
            short_description: None,
            long_description: None,
            meta_title: None,
            meta_description: None,
            is_active: false,
            weight: Value::Null,
            height: None,
            width: None,
            length: None,
            ean: None,
            sku: None,
            manufacturer_id: None,
            sort_order: 0,
            last_pulled_at: pulled_at,
        }
    }
}

/// Outcome of resolving one local record against one remote record.
///
/// `data` is set iff `should_update`; `conflicts` is set only when manual
/// resolution is required (and then `should_update` is false). Construct
/// through [`ConflictDecision::keep_local`], [`ConflictDecision::take_remote`]
/// and [`ConflictDecision::needs_review`] to keep that invariant.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConflictDecision {
    pub should_update: bool,
    pub data: Option<ProductSyncData>,
    pub reason: String,
    pub conflicts: Option<BTreeMap<String, FieldConflict>>,
}

impl ConflictDecision {
    pub fn keep_local(reason: impl Into<String>) -> Self {
        Self {
            should_update: false,
            data: None,
            reason: reason.into(),
            conflicts: None,
        }
    }

    pub fn take_remote(data: ProductSyncData, reason: impl Into<String>) -> Self {
        Self {
            should_update: true,
            data: Some(data),
            reason: reason.into(),
            conflicts: None,
        }
    }

    pub fn needs_review(conflicts: BTreeMap<String, FieldConflict>) -> Self {
        Self {
            should_update: false,
            data: None,
            reason: format!(
                "Conflicts detected - manual resolution required ({} fields)",
                conflicts.len()
            ),
            conflicts: Some(conflicts),
        }
    }

    /// Conflicting fields, empty unless manual review is required.
    pub fn conflicts(&self) -> impl Iterator<Item = &FieldConflict> {
        self.conflicts.iter().flat_map(|c| c.values())
    }
}
