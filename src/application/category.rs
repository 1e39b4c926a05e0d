use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::mapping::MappingService;
use crate::domain::error::{DegradedResolution, SyncError};
use crate::domain::multilang;
use crate::domain::ports::{CatalogRepository, RemoteClient};
use crate::domain::records::Category;
use crate::domain::remote::integer;
use crate::domain::value_objects::{EntityKind, LanguageId, ResourceKind, ShopId};

/// The platform's well-known top-level container ("Home").
pub const ROOT_CATEGORY_ID: i64 = 2;

/// Deepest ancestor chain followed before giving up on a cyclic tree.
const MAX_CATEGORY_DEPTH: usize = 32;

/// Result of syncing a batch of categories for one shop.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CategorySyncReport {
    /// local id → remote id for every category that is now mapped.
    pub mapped: BTreeMap<i64, i64>,
    /// local id → reason for every category that could not be mapped.
    pub failed: BTreeMap<i64, String>,
}

impl CategorySyncReport {
    pub fn remote_ids(&self) -> Vec<i64> {
        self.mapped.values().copied().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CategoryMapper
// ─────────────────────────────────────────────────────────────────────────────

/// Category mapping with on-demand creation of the remote category.
pub struct CategoryMapper {
    mappings: MappingService,
    catalog: Arc<dyn CatalogRepository>,
    client: Arc<dyn RemoteClient>,
    language: LanguageId,
    root_category_id: i64,
}

impl CategoryMapper {
    pub fn new(
        mappings: MappingService,
        catalog: Arc<dyn CatalogRepository>,
        client: Arc<dyn RemoteClient>,
        language: LanguageId,
    ) -> Self {
        Self {
            mappings,
            catalog,
            client,
            language,
            root_category_id: ROOT_CATEGORY_ID,
        }
    }

    pub fn with_root_category(mut self, root_category_id: i64) -> Self {
        self.root_category_id = root_category_id;
        self
    }

    pub fn mappings(&self) -> &MappingService {
        &self.mappings
    }

    /// Remote id of `category_id`, creating the remote category when unmapped.
    ///
    /// A category without a parent goes under root; so does one whose parent
    /// is not mapped yet (logged as [`DegradedResolution::RootCategory`]).
    #[instrument(skip(self), fields(shop_id = %shop))]
    pub async fn ensure_category_exists(
        &self,
        category_id: i64,
        shop: ShopId,
    ) -> Result<i64, SyncError> {
        if let Some(remote_id) = self.mappings.resolve_remote_id(category_id, shop).await? {
            return Ok(remote_id);
        }

        let category = self
            .catalog
            .category(category_id)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Category, category_id))?;

        let parent_remote_id = match category.parent_id {
            None => self.root_category_id,
            Some(parent_id) => match self.mappings.resolve_remote_id(parent_id, shop).await? {
                Some(remote) => remote,
                None => {
                    warn!(
                        category_id,
                        parent_id,
                        fallback = ?DegradedResolution::RootCategory,
                        "parent category not mapped, placing under root"
                    );
                    self.root_category_id
                }
            },
        };

        let payload = category_payload(&category, parent_remote_id, self.language);
        let response = self.client.create(ResourceKind::Category, &payload).await?;
        let remote_id = created_id(&response, ResourceKind::Category)?;

        self.mappings
            .create_or_update_mapping(category_id, shop, remote_id, Some(category.name.clone()))
            .await?;

        info!(category_id, remote_id, parent_remote_id, "remote category created");
        Ok(remote_id)
    }

    /// Ensure `category_id` and all of its ancestors exist remotely,
    /// root-most first, so every parent is mapped before its children.
    pub async fn ensure_category_path(
        &self,
        category_id: i64,
        shop: ShopId,
    ) -> Result<i64, SyncError> {
        let chain = self.ancestor_chain(category_id).await?;
        let mut remote_id = self.root_category_id;
        for id in chain {
            remote_id = self.ensure_category_exists(id, shop).await?;
        }
        Ok(remote_id)
    }

    /// Map every category of a product, continuing past individual failures.
    #[instrument(skip(self, category_ids), fields(shop_id = %shop, count = category_ids.len()))]
    pub async fn sync_product_categories(
        &self,
        category_ids: &[i64],
        shop: ShopId,
    ) -> CategorySyncReport {
        let mut report = CategorySyncReport::default();
        for &id in category_ids {
            match self.ensure_category_path(id, shop).await {
                Ok(remote_id) => {
                    report.mapped.insert(id, remote_id);
                }
                Err(err) => {
                    warn!(category_id = id, error = %err, "category sync failed");
                    report.failed.insert(id, err.to_string());
                }
            }
        }
        info!(
            mapped = report.mapped.len(),
            failed = report.failed.len(),
            "category batch finished"
        );
        report
    }

    /// `category_id` and its known ancestors, root-most first.
    ///
    /// A parent id missing from the local catalog ends the chain; the
    /// category then falls back to root when it is created.
    async fn ancestor_chain(&self, category_id: i64) -> Result<Vec<i64>, SyncError> {
        let mut chain = vec![category_id];
        let mut seen = BTreeSet::from([category_id]);
        let mut current = self.catalog.category(category_id).await?;

        while let Some(category) = current.take() {
            let Some(parent_id) = category.parent_id else {
                break;
            };
            if !seen.insert(parent_id) || chain.len() >= MAX_CATEGORY_DEPTH {
                warn!(category_id, parent_id, "category tree too deep or cyclic");
                break;
            }
            current = self.catalog.category(parent_id).await?;
            if current.is_some() {
                chain.push(parent_id);
            } else {
                warn!(category_id, parent_id, "parent category missing locally");
            }
        }

        chain.reverse();
        Ok(chain)
    }
}

/// Remote payload for creating `category` under `parent_remote_id`.
pub fn category_payload(category: &Category, parent_remote_id: i64, language: LanguageId) -> Value {
    let slug = category
        .slug
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&category.name));

    let mut record = json!({
        "id_parent": parent_remote_id,
        "active": if category.is_active { "1" } else { "0" },
        "name": multilang::encode(&category.name, language),
        "link_rewrite": multilang::encode(&slug, language),
    });
    if let Some(description) = category.description.as_deref().filter(|d| !d.is_empty()) {
        record["description"] = multilang::encode(description, language);
    }
    json!({ "category": record })
}

/// Id of a freshly created record, wrapped or not.
pub fn created_id(response: &Value, resource: ResourceKind) -> Result<i64, SyncError> {
    response
        .get(resource.record_key())
        .unwrap_or(response)
        .get("id")
        .and_then(integer)
        .ok_or_else(|| {
            SyncError::InvalidResponse(format!("created {} has no id", resource.record_key()))
        })
}

/// URL slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        let ch = fold_diacritic(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'ą' => 'a',
        'ć' => 'c',
        'ę' => 'e',
        'ł' => 'l',
        'ń' => 'n',
        'ó' => 'o',
        'ś' => 's',
        'ź' | 'ż' => 'z',
        'ä' | 'á' | 'à' | 'â' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ö' | 'ô' | 'ò' => 'o',
        'ü' | 'ú' | 'ù' | 'û' => 'u',
        other => other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
