use crate::application::conflict::ResolutionStrategy;
use crate::domain::conflict::ConflictDecision;
use crate::domain::validation::{Severity, ValidationWarning};
use colored::*;
use serde_json::Value;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

/// Longest rendered cell value before it is cut.
const CELL_WIDTH: usize = 60;

// ─── Conflict decision ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ConflictRow {
    field: String,
    ppm: String,
    shop: String,
}

#[derive(Tabled)]
struct DataRow {
    field: String,
    value: String,
}

/// Print the outcome of one conflict resolution.
///
/// Returns `true` when manual review is required (so the caller can exit
/// non-zero).
pub fn print_decision(decision: &ConflictDecision, strategy: ResolutionStrategy) -> bool {
    println!();
    println!("{}", "CONFLICT RESOLUTION".bold().cyan());
    println!("Strategy: {}", strategy.as_str().bright_yellow());

    let verdict = if decision.should_update {
        "update from shop".green().bold()
    } else if decision.conflicts.is_some() {
        "manual review required".red().bold()
    } else {
        "keep PPM data".blue().bold()
    };
    println!("Decision: {verdict}");
    println!("Reason:   {}", decision.reason.italic());
    println!();

    if let Some(data) = &decision.data {
        let rows: Vec<DataRow> = serde_json::to_value(data)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(field, v)| DataRow {
                field: field.bold().to_string(),
                value: cell(&v),
            })
            .collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{table}");
        println!();
    }

    let rows: Vec<ConflictRow> = decision
        .conflicts()
        .map(|c| ConflictRow {
            field: c.field.yellow().to_string(),
            ppm: cell(&c.local_value).cyan().to_string(),
            shop: cell(&c.remote_value).red().to_string(),
        })
        .collect();
    if rows.is_empty() {
        return false;
    }

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..=0)).with(Alignment::left()))
        .to_string();
    println!("{table}");
    println!();
    println!("  {}  value stored in PPM", "ppm  →".cyan());
    println!("  {}  value reported by the shop", "shop →".red());
    println!();

    true
}

// ─── Validation warnings ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct WarningRow {
    severity: String,
    field: String,
    message: String,
    ppm: String,
    shop: String,
}

/// Print validation warnings, most severe first.
///
/// Returns `true` if any warning has `error` severity.
pub fn print_warnings(warnings: &[ValidationWarning]) -> bool {
    if warnings.is_empty() {
        println!("{}", "✓ No discrepancies between PPM and the shop.".bold().green());
        return false;
    }

    println!();
    println!("{}", "VALIDATION".bold().cyan());
    println!("{} discrepancy(ies) found.", warnings.len().to_string().bold());
    println!();

    let mut sorted: Vec<&ValidationWarning> = warnings.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

    let rows: Vec<WarningRow> = sorted
        .iter()
        .map(|w| WarningRow {
            severity: severity_label(w.severity),
            field: w.field.bold().to_string(),
            message: w.message.clone(),
            ppm: cell(&w.local_value),
            shop: cell(&w.remote_value),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();

    warnings.iter().any(|w| w.severity == Severity::Error)
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Error => "error".red().bold().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Info => "info".dimmed().to_string(),
    }
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "—".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > CELL_WIDTH {
        let cut: String = text.chars().take(CELL_WIDTH).collect();
        format!("{cut}…")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_cuts_long_text() {
        assert_eq!(cell(&json!("abc")), "abc");
        assert_eq!(cell(&json!(1.5)), "1.5");
        assert_eq!(cell(&Value::Null), "—");
        assert_eq!(cell(&json!("x".repeat(70))).chars().count(), CELL_WIDTH + 1);
    }

    #[test]
    fn print_warnings_reports_errors() {
        let warning = |severity| ValidationWarning {
            field: "price".into(),
            severity,
            message: "Price differs".into(),
            local_value: json!(100.0),
            remote_value: json!(80.0),
        };
        assert!(!print_warnings(&[]));
        assert!(!print_warnings(&[warning(Severity::Warning)]));
        assert!(print_warnings(&[warning(Severity::Info), warning(Severity::Error)]));
    }
}
