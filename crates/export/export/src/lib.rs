//! # Dashboard Export
//!
//! Serializes a `MetricsSnapshot` into a downloadable report.
//!
//! Every tabular format shares one contract: a `Metric,Value` header and a
//! fixed row order per scope (`meetings`: Booked, Scheduled, Cancelled,
//! Upcoming; `users`: Total, Daily, Weekly, Monthly). The `raw` scope
//! bypasses the canonical model and writes the captured upstream payloads
//! as indented JSON.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dashboard_export::{export, ExportOutcome, Format, Scope};
//!
//! match export(&snapshot, Format::Csv, Scope::Meetings, Utc::now())? {
//!     ExportOutcome::Artifact(artifact) => save(&artifact.filename, &artifact.bytes),
//!     ExportOutcome::NothingToExport => {}
//! }
//! ```

mod csv;
mod pdf;
mod table;
mod types;
mod xlsx;

use chrono::{DateTime, Utc};
use dashboard_core::error::{DashboardError, DashboardResult};
use dashboard_core::types::MetricsSnapshot;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, error};

pub use table::{Block, HEADER, MetricRow, blocks};
pub use types::{Artifact, ExportOutcome, Format, Scope};

const REPORT_TITLE: &str = "Meetdesk Dashboard Report";

/// Exports one scope of a snapshot.
///
/// `at` is the export time; it fixes the filename's date and the document
/// metadata of binary formats. Raw exports are always JSON, whatever the
/// requested format. Either the full artifact is returned or an error;
/// never a partial file.
pub fn export(
    snapshot: &MetricsSnapshot,
    format: Format,
    scope: Scope,
    at: DateTime<Utc>,
) -> DashboardResult<ExportOutcome> {
    let result = render(snapshot, format, scope, at);
    match &result {
        Ok(ExportOutcome::Artifact(artifact)) => debug!(
            format = %format,
            scope = %scope,
            filename = %artifact.filename,
            bytes = artifact.bytes.len(),
            "report exported"
        ),
        Ok(ExportOutcome::NothingToExport) => {
            debug!(format = %format, scope = %scope, "nothing to export")
        }
        Err(err) => error!(format = %format, scope = %scope, error = %err, "export failed"),
    }
    result
}

fn render(
    snapshot: &MetricsSnapshot,
    format: Format,
    scope: Scope,
    at: DateTime<Utc>,
) -> DashboardResult<ExportOutcome> {
    if scope == Scope::Raw {
        if snapshot.raw.is_empty() {
            return Ok(ExportOutcome::NothingToExport);
        }
        let json = snapshot.raw.to_pretty_json()?;
        return Ok(ExportOutcome::Artifact(Artifact {
            filename: filename(scope, "json", at)?,
            content_type: "application/json",
            bytes: json.into_bytes(),
        }));
    }

    let blocks = table::blocks(snapshot, scope);
    let title = format!("{REPORT_TITLE}: {}", heading(scope));
    let bytes = match format {
        Format::Csv => csv::render(&blocks).into_bytes(),
        Format::Xlsx => xlsx::render(&blocks, &title, at)?,
        Format::Pdf => {
            let subtitle = format!(
                "Filter: {} | Generated: {}",
                snapshot.source_filter,
                at.format("%Y-%m-%d %H:%M UTC")
            );
            pdf::render(&blocks, &title, &subtitle, at)?
        }
    };

    Ok(ExportOutcome::Artifact(Artifact {
        filename: filename(scope, format.extension(), at)?,
        content_type: format.content_type(),
        bytes,
    }))
}

/// Builds `{scope}-{YYYY-MM-DD}.{ext}` for the UTC date of `at`.
pub fn filename(scope: Scope, extension: &str, at: DateTime<Utc>) -> DashboardResult<String> {
    let date = OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| DashboardError::export(extension, e.to_string()))?
        .format(&format_description!("[year]-[month]-[day]"))
        .map_err(|e| DashboardError::export(extension, e.to_string()))?;
    Ok(format!("{scope}-{date}.{extension}"))
}

fn heading(scope: Scope) -> &'static str {
    match scope {
        Scope::Meetings => "Meetings",
        Scope::Users => "Users",
        Scope::All => "All metrics",
        Scope::Raw => "Raw payloads",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filename() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(filename(Scope::Users, "xlsx", at).unwrap(), "users-2026-03-09.xlsx");
    }
}
