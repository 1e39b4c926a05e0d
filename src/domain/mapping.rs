use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EntityKind, ShopId};

/// One stored correspondence between a local key and a remote id.
///
/// At most one active row exists per `(shop_id, entity_kind, local_value)`.
/// Retracted mappings are kept with `is_active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub shop_id: ShopId,
    pub entity_kind: EntityKind,
    /// Local key, string-encoded.
    pub local_value: String,
    pub remote_id: i64,
    pub remote_label: Option<String>,
    pub is_active: bool,
}

impl EntityMapping {
    pub fn key(&self) -> MappingKey {
        MappingKey::new(self.shop_id, self.entity_kind, self.local_value.clone())
    }

    /// The local key parsed back to a numeric id, when it is one.
    pub fn local_id(&self) -> Option<i64> {
        self.local_value.parse().ok()
    }
}

/// Identity of a mapping row, also used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingKey {
    pub shop_id: ShopId,
    pub entity_kind: EntityKind,
    pub local_value: String,
}

impl MappingKey {
    pub fn new(shop_id: ShopId, entity_kind: EntityKind, local_value: impl Into<String>) -> Self {
        Self {
            shop_id,
            entity_kind,
            local_value: local_value.into(),
        }
    }
}

/// Upsert request for a mapping row; always stored active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapping {
    pub key: MappingKey,
    pub remote_id: i64,
    pub remote_label: Option<String>,
}

impl NewMapping {
    pub fn into_mapping(self) -> EntityMapping {
        EntityMapping {
            shop_id: self.key.shop_id,
            entity_kind: self.key.entity_kind,
            local_value: self.key.local_value,
            remote_id: self.remote_id,
            remote_label: self.remote_label,
            is_active: true,
        }
    }
}
