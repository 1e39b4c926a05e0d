use serde::Serialize;

use crate::domain::value_objects::EntityKind;

/// Failure reported by the remote platform client.
///
/// Carried through the core unchanged so callers can branch on the status
/// (a 404 usually means the remote entity was deleted by hand).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote request failed (status {status:?}): {message}")]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Required shop or connection settings are missing. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A mapping operation referenced a local entity that does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// The remote platform answered but the payload lacks what we need.
    #[error("invalid remote response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        SyncError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Remote 404, for callers that treat a vanished remote entity separately.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_not_found())
    }
}

/// Named fallback rules applied instead of failing.
///
/// These are policy, not errors: the caller continues with the fallback
/// value and the degradation is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedResolution {
    /// Parent has no remote counterpart; the category is placed under root.
    RootCategory,
    /// No warehouse linked to the shop; the default warehouse is used.
    DefaultWarehouse,
    /// No default warehouse either; the conventionally named one is used.
    FallbackWarehouse,
    /// No warehouse mapped for the shop; stock of all warehouses is reported.
    AllWarehouses,
}
