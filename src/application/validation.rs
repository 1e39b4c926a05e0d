use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::records::Product;
use crate::domain::remote::RemoteProduct;
use crate::domain::validation::{Severity, ValidationSnapshot, ValidationWarning};
use crate::domain::value_objects::LanguageId;

/// Price difference (percent) above which the mismatch is an error.
const PRICE_ERROR_PERCENT: f64 = 10.0;
/// Price difference (percent) above which the mismatch is a warning.
const PRICE_WARNING_PERCENT: f64 = 5.0;
/// Absolute stock difference tolerated without a note.
const STOCK_ABSOLUTE_TOLERANCE: u64 = 5;
/// Relative stock difference (percent) tolerated without a note.
const STOCK_RELATIVE_TOLERANCE: f64 = 20.0;

/// Advisory comparison of a local product with its remote counterpart.
///
/// Read-only: warnings are returned, never applied. Persist them through
/// [`ValidationEngine::snapshot`] and `ProductShopData::record_validation`.
pub struct ValidationEngine {
    language: LanguageId,
    price_group: String,
}

impl ValidationEngine {
    /// `price_group` is the code of the tier compared with the remote price.
    pub fn new(language: LanguageId, price_group: impl Into<String>) -> Self {
        Self {
            language,
            price_group: price_group.into(),
        }
    }

    /// Validate against a raw remote record (decoded here).
    pub fn validate(&self, product: &Product, remote: &Value) -> Vec<ValidationWarning> {
        self.validate_decoded(product, &RemoteProduct::decode(remote))
    }

    /// Warnings in a fixed order: name, descriptions, price, stock,
    /// categories, active flag.
    pub fn validate_decoded(
        &self,
        product: &Product,
        remote: &RemoteProduct,
    ) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        self.check_name(product, remote, &mut warnings);
        self.check_descriptions(product, remote, &mut warnings);
        self.check_price(product, remote, &mut warnings);
        check_stock(product, remote, &mut warnings);
        check_categories(remote, &mut warnings);
        check_active(remote, &mut warnings);

        debug!(
            product_id = product.id,
            warnings = warnings.len(),
            "validation finished"
        );
        warnings
    }

    pub fn snapshot(
        &self,
        warnings: Vec<ValidationWarning>,
        checked_at: DateTime<Utc>,
    ) -> ValidationSnapshot {
        ValidationSnapshot::new(warnings, checked_at)
    }

    fn check_name(&self, product: &Product, remote: &RemoteProduct, out: &mut Vec<ValidationWarning>) {
        if product.name.is_empty() {
            return;
        }
        let remote_name = remote.name.extract(self.language);
        if remote_name.as_deref() != Some(product.name.as_str()) {
            out.push(warning(
                "name",
                Severity::Warning,
                "Product name differs between PPM and the shop",
                json!(product.name),
                json!(remote_name),
            ));
        }
    }

    fn check_descriptions(
        &self,
        product: &Product,
        remote: &RemoteProduct,
        out: &mut Vec<ValidationWarning>,
    ) {
        let pairs = [
            ("short_description", &product.short_description, &remote.description_short),
            ("long_description", &product.long_description, &remote.description),
        ];
        for (field, local, remote_value) in pairs {
            let Some(local) = local.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let remote_value = remote_value.extract(self.language);
            if remote_value.as_deref() != Some(local) {
                out.push(warning(
                    field,
                    Severity::Info,
                    "Description differs between PPM and the shop",
                    json!(local),
                    json!(remote_value),
                ));
            }
        }
    }

    fn check_price(&self, product: &Product, remote: &RemoteProduct, out: &mut Vec<ValidationWarning>) {
        let Some(local) = product.price_for(&self.price_group).filter(|p| *p != 0.0) else {
            return;
        };
        let Some(remote_price) = remote.price else {
            return;
        };

        let diff_percent = (local - remote_price).abs() / local.abs() * 100.0;
        let severity = if diff_percent > PRICE_ERROR_PERCENT {
            Severity::Error
        } else if diff_percent > PRICE_WARNING_PERCENT {
            Severity::Warning
        } else {
            return;
        };

        out.push(warning(
            "price",
            severity,
            format!("Price differs by {diff_percent:.2}%"),
            json!(local),
            json!(remote_price),
        ));
    }
}

fn check_stock(product: &Product, remote: &RemoteProduct, out: &mut Vec<ValidationWarning>) {
    let Some(remote_qty) = remote.quantity else {
        return;
    };
    let local_qty = product.total_stock();
    let diff = local_qty.abs_diff(remote_qty);
    let relative_exceeded =
        local_qty > 0 && diff as f64 / local_qty as f64 * 100.0 > STOCK_RELATIVE_TOLERANCE;

    if diff > STOCK_ABSOLUTE_TOLERANCE || relative_exceeded {
        out.push(warning(
            "stock",
            Severity::Info,
            format!("Stock differs by {diff} units"),
            json!(local_qty),
            json!(remote_qty),
        ));
    }
}

fn check_categories(remote: &RemoteProduct, out: &mut Vec<ValidationWarning>) {
    if remote.category_ids.is_empty() {
        out.push(warning(
            "categories",
            Severity::Warning,
            "Product has no categories in the shop (product may be hidden)",
            json!([]),
            json!([]),
        ));
    }
}

fn check_active(remote: &RemoteProduct, out: &mut Vec<ValidationWarning>) {
    if remote.active == Some(false) {
        out.push(warning(
            "is_active",
            Severity::Info,
            "Product is inactive in the shop",
            Value::Null,
            json!(false),
        ));
    }
}

fn warning(
    field: &str,
    severity: Severity,
    message: impl Into<String>,
    local_value: Value,
    remote_value: Value,
) -> ValidationWarning {
    ValidationWarning {
        field: field.to_string(),
        severity,
        message: message.into(),
        local_value,
        remote_value,
    }
}
