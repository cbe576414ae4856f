//! Meetdesk dashboard binary.
//!
//! Usage: `meetdesk-dashboard [config.toml] [format scope]`
//!
//! Fetches both sources once, logs the snapshot, and optionally writes an
//! export to the current directory.

use dashboard_core::{ActivityWindow, SeriesKind, daily_trend_percent};
use dashboard_export::{ExportOutcome, Format, Scope};
use dashboard_runtime::{Dashboard, DashboardConfig, init_logging, load_config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Load configuration
    let config = match args.first() {
        Some(path) if path.ends_with(".toml") => load_config(path)?,
        _ => DashboardConfig::default(),
    };
    init_logging(&config.logging)?;

    let dashboard = Dashboard::from_config(&config)?;
    let report = dashboard.refresh().await;
    tracing::info!(?report, "refresh finished");

    if let Some(snapshot) = dashboard.snapshot().await {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        tracing::info!(
            points = dashboard.chart(SeriesKind::MeetingsOverTime).await.len(),
            daily_trend = ?daily_trend_percent(&snapshot),
            daily_active = ?dashboard.activity(ActivityWindow::Daily).await.map(|a| a.active.percent),
            "snapshot ready"
        );
    }

    let rest: Vec<&String> = args.iter().filter(|a| !a.ends_with(".toml")).collect();
    if let [format, scope] = rest.as_slice() {
        let format: Format = format.parse()?;
        let scope: Scope = scope.parse()?;
        match dashboard.export(format, scope).await? {
            ExportOutcome::Artifact(artifact) => {
                std::fs::write(&artifact.filename, &artifact.bytes)?;
                tracing::info!(filename = %artifact.filename, "export written");
            }
            ExportOutcome::NothingToExport => tracing::warn!(%scope, "nothing to export"),
        }
    }

    dashboard.shutdown().await;
    Ok(())
}
