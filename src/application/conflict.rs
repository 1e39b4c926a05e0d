use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::conflict::{ConflictDecision, FieldConflict, ProductSyncData};
use crate::domain::records::ProductShopData;
use crate::domain::remote::RemoteProduct;
use crate::domain::value_objects::LanguageId;

/// Characters of long text kept in a reported conflict.
const CONFLICT_PREVIEW_CHARS: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Inputs shared by every strategy for one resolution call.
pub struct ResolveContext {
    pub language: LanguageId,
    pub now: DateTime<Utc>,
}

/// One conflict-resolution policy.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(
        &self,
        local: &ProductShopData,
        remote: &RemoteProduct,
        ctx: &ResolveContext,
    ) -> ConflictDecision;
}

/// Local data is authoritative unconditionally.
pub struct PpmWins;

/// Remote data is authoritative unconditionally.
pub struct RemoteWins;

/// The side with the later modification timestamp wins; ties keep local.
pub struct NewestWins;

/// Field-level detection; updates only when nothing local would be lost.
pub struct Manual;

impl Strategy for PpmWins {
    fn name(&self) -> &'static str {
        "ppm_wins"
    }

    fn decide(&self, local: &ProductShopData, _: &RemoteProduct, _: &ResolveContext) -> ConflictDecision {
        debug!(product_id = local.product_id, shop_id = %local.shop_id, "keeping local data");
        ConflictDecision::keep_local("PPM wins strategy - keeping PPM data")
    }
}

impl Strategy for RemoteWins {
    fn name(&self) -> &'static str {
        "prestashop_wins"
    }

    fn decide(
        &self,
        local: &ProductShopData,
        remote: &RemoteProduct,
        ctx: &ResolveContext,
    ) -> ConflictDecision {
        debug!(product_id = local.product_id, shop_id = %local.shop_id, "taking remote data");
        ConflictDecision::take_remote(
            normalize(remote, ctx),
            "Remote wins strategy - updating from remote",
        )
    }
}

impl Strategy for NewestWins {
    fn name(&self) -> &'static str {
        "newest_wins"
    }

    fn decide(
        &self,
        local: &ProductShopData,
        remote: &RemoteProduct,
        ctx: &ResolveContext,
    ) -> ConflictDecision {
        let local_ts = local.updated_at.timestamp();
        let remote_ts = remote.modified_timestamp();
        let local_at = local.updated_at.format("%Y-%m-%d %H:%M:%S");
        let remote_at = remote
            .date_upd
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        debug!(
            product_id = local.product_id,
            shop_id = %local.shop_id,
            local_ts,
            remote_ts,
            "comparing modification times"
        );

        if remote_ts > local_ts {
            ConflictDecision::take_remote(
                normalize(remote, ctx),
                format!("Remote data is newer (remote: {remote_at}, PPM: {local_at})"),
            )
        } else {
            ConflictDecision::keep_local(format!(
                "PPM data is newer (PPM: {local_at}, remote: {remote_at})"
            ))
        }
    }
}

impl Strategy for Manual {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn decide(
        &self,
        local: &ProductShopData,
        remote: &RemoteProduct,
        ctx: &ResolveContext,
    ) -> ConflictDecision {
        let conflicts = detect_conflicts(local, remote, ctx.language);
        if conflicts.is_empty() {
            debug!(product_id = local.product_id, shop_id = %local.shop_id, "no conflicts, safe to update");
            return ConflictDecision::take_remote(
                normalize(remote, ctx),
                "No conflicts detected - safe to update",
            );
        }

        warn!(
            product_id = local.product_id,
            shop_id = %local.shop_id,
            fields = ?conflicts.keys().collect::<Vec<_>>(),
            "conflicts detected, manual resolution required"
        );
        ConflictDecision::needs_review(conflicts)
    }
}

/// The closed set of strategies, selected from the `sync.conflict_resolution`
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    #[default]
    PpmWins,
    RemoteWins,
    NewestWins,
    Manual,
}

impl ResolutionStrategy {
    pub fn strategy(&self) -> &'static dyn Strategy {
        match self {
            ResolutionStrategy::PpmWins => &PpmWins,
            ResolutionStrategy::RemoteWins => &RemoteWins,
            ResolutionStrategy::NewestWins => &NewestWins,
            ResolutionStrategy::Manual => &Manual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.strategy().name()
    }

    /// Lenient reading of the stored setting: unknown values keep local data.
    pub fn from_setting(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(setting = value, "unknown conflict resolution strategy, using ppm_wins");
            ResolutionStrategy::PpmWins
        })
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ppm_wins" => Ok(ResolutionStrategy::PpmWins),
            "prestashop_wins" => Ok(ResolutionStrategy::RemoteWins),
            "newest_wins" => Ok(ResolutionStrategy::NewestWins),
            "manual" => Ok(ResolutionStrategy::Manual),
            other => Err(format!(
                "unknown strategy '{other}' (expected ppm_wins, prestashop_wins, newest_wins or manual)"
            )),
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConflictResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether pulled remote data should overwrite a local product-shop
/// record.
///
/// The strategy is fixed at construction; the resolver holds no other state
/// and never writes anything. Callers apply `decision.data` themselves.
pub struct ConflictResolver {
    strategy: ResolutionStrategy,
    language: LanguageId,
    clock: fn() -> DateTime<Utc>,
}

impl ConflictResolver {
    pub fn new(strategy: ResolutionStrategy, language: LanguageId) -> Self {
        Self {
            strategy,
            language,
            clock: Utc::now,
        }
    }

    /// Replace the clock used to stamp `last_pulled_at`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Resolve against a raw remote record (decoded here).
    pub fn resolve(&self, local: &ProductShopData, remote: &Value) -> ConflictDecision {
        self.resolve_decoded(local, &RemoteProduct::decode(remote))
    }

    pub fn resolve_decoded(
        &self,
        local: &ProductShopData,
        remote: &RemoteProduct,
    ) -> ConflictDecision {
        let strategy = self.strategy.strategy();
        debug!(
            product_id = local.product_id,
            shop_id = %local.shop_id,
            strategy = strategy.name(),
            "resolving conflict"
        );
        let ctx = ResolveContext {
            language: self.language,
            now: (self.clock)(),
        };
        strategy.decide(local, remote, &ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field-level detection and normalization
// ─────────────────────────────────────────────────────────────────────────────

/// Fields where the local value is non-empty and differs from remote.
pub fn detect_conflicts(
    local: &ProductShopData,
    remote: &RemoteProduct,
    language: LanguageId,
) -> BTreeMap<String, FieldConflict> {
    let mut conflicts = BTreeMap::new();
    let mut push = |field: &str, local_value: Value, remote_value: Value| {
        conflicts.insert(
            field.to_string(),
            FieldConflict {
                field: field.to_string(),
                local_value,
                remote_value,
            },
        );
    };

    let text_fields = [
        ("name", &local.name, &remote.name, false),
        ("slug", &local.slug, &remote.link_rewrite, false),
        ("short_description", &local.short_description, &remote.description_short, true),
        ("long_description", &local.long_description, &remote.description, true),
    ];
    for (field, local_value, remote_value, long_text) in text_fields {
        let Some(local_value) = local_value.as_deref().filter(|v| !v.is_empty()) else {
            continue;
        };
        let remote_value = remote_value.extract(language);
        if remote_value.as_deref() == Some(local_value) {
            continue;
        }
        if long_text {
            push(
                field,
                json!(preview(local_value)),
                json!(preview(remote_value.as_deref().unwrap_or(""))),
            );
        } else {
            push(field, json!(local_value), json!(remote_value));
        }
    }

    if let Some(local_active) = local.is_active {
        let remote_active = remote.is_active();
        if local_active != remote_active {
            push("is_active", json!(active_label(local_active)), json!(active_label(remote_active)));
        }
    }

    if let (Some(local_weight), Some(remote_weight)) = (local.weight, remote.weight_f64()) {
        if !float_eq(local_weight, remote_weight) {
            push("weight", json!(local_weight), remote.weight.clone());
        }
    }

    if let Some(local_ean) = local.ean.as_deref().filter(|v| !v.is_empty()) {
        if remote.ean.as_deref() != Some(local_ean) {
            push("ean", json!(local_ean), json!(remote.ean));
        }
    }

    conflicts
}

/// Remote record in local shape, ready to apply. Text is never shortened.
pub fn normalize(remote: &RemoteProduct, ctx: &ResolveContext) -> ProductSyncData {
    ProductSyncData {
        name: remote.name.extract(ctx.language),
        slug: remote.link_rewrite.extract(ctx.language),
        short_description: remote.description_short.extract(ctx.language),
        long_description: remote.description.extract(ctx.language),
        meta_title: remote.meta_title.extract(ctx.language),
        meta_description: remote.meta_description.extract(ctx.language),
        is_active: remote.is_active(),
        weight: remote.weight.clone(),
        height: remote.height,
        width: remote.width,
        length: remote.depth,
        ean: remote.ean.clone(),
        sku: remote.reference.clone(),
        manufacturer_id: remote.id_manufacturer,
        sort_order: remote.position.unwrap_or(0),
        last_pulled_at: ctx.now,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= CONFLICT_PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(CONFLICT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

fn active_label(active: bool) -> &'static str {
    if active {
        "Active"
    } else {
        "Inactive"
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
