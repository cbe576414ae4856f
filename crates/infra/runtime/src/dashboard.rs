//! The dashboard facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashboard_core::chart::{
    self, ActivityBreakdown, ActivityWindow, Dataset, LabeledPoint, SeriesKind,
};
use dashboard_core::error::DashboardResult;
use dashboard_core::normalize::Normalizer;
use dashboard_core::traits::UpstreamSource;
use dashboard_core::types::{MetricsSnapshot, Source, TimeFilter};
use dashboard_export::{ExportOutcome, Format, Scope};
use dashboard_fetch::{FetchCoordinator, FetchReport, HttpUpstream, SourceStatus};
use tracing::info;

use crate::config::{ConfigError, DashboardConfig};

/// Wires an upstream, the fetch coordinator, the chart adapter, and the
/// exporter together.
#[derive(Clone)]
pub struct Dashboard {
    coordinator: FetchCoordinator,
}

impl Dashboard {
    /// Creates a dashboard over any upstream.
    pub fn new(upstream: Arc<dyn UpstreamSource>, config: &DashboardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let coordinator = FetchCoordinator::with_settings(upstream, config.fetch_settings()?)
            .with_retry_strategy(config.retry_strategy())
            .with_normalizer(Normalizer::new(config.alias_table()?));

        Ok(Self { coordinator })
    }

    /// Creates a dashboard over the HTTP admin API.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, ConfigError> {
        let upstream = HttpUpstream::new(
            config.upstream.base_url.clone(),
            Duration::from_millis(config.upstream.request_timeout_ms),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?
        .with_paths(config.endpoint_paths());

        info!(base_url = upstream.base_url(), "dashboard using HTTP upstream");
        Self::new(Arc::new(upstream), config)
    }

    /// Gets the fetch coordinator.
    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Switches the time filter.
    pub async fn set_filter(&self, filter: TimeFilter) -> FetchReport {
        self.coordinator.set_filter(filter).await
    }

    /// Refetches both sources.
    pub async fn refresh(&self) -> FetchReport {
        self.coordinator.refresh().await
    }

    /// Returns the last committed snapshot.
    pub async fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.coordinator.current_snapshot().await
    }

    pub async fn filter(&self) -> TimeFilter {
        self.coordinator.filter().await
    }

    pub async fn status(&self, source: Source) -> SourceStatus {
        self.coordinator.status(source).await
    }

    /// Projects a time-series of the current snapshot. Empty without data.
    pub async fn chart(&self, kind: SeriesKind) -> Vec<LabeledPoint> {
        match self.snapshot().await {
            Some(snapshot) => chart::to_series(&snapshot, kind),
            None => Vec::new(),
        }
    }

    /// Returns the Booked/Cancelled/Scheduled datasets of the current snapshot.
    pub async fn meetings_datasets(&self) -> Vec<Dataset> {
        match self.snapshot().await {
            Some(snapshot) => chart::meetings_datasets(&snapshot),
            None => Vec::new(),
        }
    }

    /// Returns the active/inactive user split, if a snapshot exists.
    pub async fn activity(&self, window: ActivityWindow) -> Option<ActivityBreakdown> {
        let snapshot = self.snapshot().await?;
        Some(chart::activity_breakdown(&snapshot, window))
    }

    /// Exports the current snapshot, dated now.
    pub async fn export(&self, format: Format, scope: Scope) -> DashboardResult<ExportOutcome> {
        self.export_at(format, scope, Utc::now()).await
    }

    /// Exports the current snapshot with an explicit export time.
    ///
    /// Before the first commit the tabular scopes export zero rows and the
    /// raw scope has nothing to export.
    pub async fn export_at(
        &self,
        format: Format,
        scope: Scope,
        at: DateTime<Utc>,
    ) -> DashboardResult<ExportOutcome> {
        let snapshot = match self.snapshot().await {
            Some(snapshot) => snapshot,
            None => Arc::new(MetricsSnapshot::empty(self.filter().await, at)),
        };
        dashboard_export::export(&snapshot, format, scope, at)
    }

    /// Discards the snapshot and returns every source to idle.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}
