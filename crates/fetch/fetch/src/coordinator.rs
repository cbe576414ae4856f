//! Filter-driven fetch coordination.
//!
//! The coordinator is the single writer of the dashboard's metrics store.
//! Each source (meetings, users) is fetched independently and committed as
//! a whole field group; readers get an `Arc` of the last committed
//! snapshot and never observe a partial write.
//!
//! Every dispatch takes a fresh attempt token. A completion is committed
//! only if its token is still the source's current one and, for a
//! filter-scoped source, the captured filter is still the active filter.
//! Anything else is discarded on arrival.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashboard_core::error::{DashboardError, DashboardResult};
use dashboard_core::normalize::Normalizer;
use dashboard_core::traits::UpstreamSource;
use dashboard_core::types::{
    GroupStamp, MeetingsGroup, MetricsSnapshot, PayloadKind, RawPayloads, Source, TimeFilter,
    UsersGroup,
};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::retry::{ExponentialBackoff, RetryStrategy, with_retry};

/// Lifecycle of one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Result of one source fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The field group was committed to the snapshot.
    Committed,
    /// The response arrived for a superseded attempt and was dropped.
    Discarded,
    /// The fetch failed; the previous field group is kept.
    Failed(DashboardError),
}

/// Outcomes of the sources an operation dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub meetings: Option<FetchOutcome>,
    pub users: Option<FetchOutcome>,
}

impl FetchReport {
    /// Returns the outcome for a source, if it was dispatched.
    pub fn get(&self, source: Source) -> Option<&FetchOutcome> {
        match source {
            Source::Meetings => self.meetings.as_ref(),
            Source::Users => self.users.as_ref(),
        }
    }

    /// Returns true if every dispatched source committed.
    pub fn all_committed(&self) -> bool {
        [&self.meetings, &self.users]
            .into_iter()
            .flatten()
            .all(|o| *o == FetchOutcome::Committed)
    }
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Filter active before the first `set_filter`.
    pub initial_filter: TimeFilter,
    /// Whether the users source follows the filter.
    pub users_filter_scoped: bool,
    /// Whether the meetings source also requests the time-series graph.
    pub fetch_meetings_graph: bool,
    /// Hard per-attempt timeout.
    pub timeout: Duration,
}

impl FetchSettings {
    /// Creates the default settings.
    pub fn new() -> Self {
        Self {
            initial_filter: TimeFilter::default(),
            users_filter_scoped: false,
            fetch_meetings_graph: true,
            timeout: Duration::from_secs(15),
        }
    }

    /// Sets the initial filter.
    pub fn initial_filter(mut self, filter: TimeFilter) -> Self {
        self.initial_filter = filter;
        self
    }

    /// Sets whether users follow the filter.
    pub fn users_filter_scoped(mut self, scoped: bool) -> Self {
        self.users_filter_scoped = scoped;
        self
    }

    /// Sets whether the meetings graph is fetched.
    pub fn fetch_meetings_graph(mut self, enabled: bool) -> Self {
        self.fetch_meetings_graph = enabled;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_scoped(&self, source: Source) -> bool {
        match source {
            Source::Meetings => true,
            Source::Users => self.users_filter_scoped,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct SourceState {
    status: SourceStatus,
    attempt: u64,
    last_error: Option<DashboardError>,
}

#[derive(Debug)]
struct Store {
    filter: TimeFilter,
    snapshot: Option<Arc<MetricsSnapshot>>,
    meetings: SourceState,
    users: SourceState,
    next_attempt: u64,
}

impl Store {
    fn source(&self, source: Source) -> &SourceState {
        match source {
            Source::Meetings => &self.meetings,
            Source::Users => &self.users,
        }
    }

    fn source_mut(&mut self, source: Source) -> &mut SourceState {
        match source {
            Source::Meetings => &mut self.meetings,
            Source::Users => &mut self.users,
        }
    }

    /// Retags a snapshot that holds no meetings group with the active filter.
    fn align_source_filter(&mut self) {
        let filter = self.filter;
        if let Some(snapshot) = self.snapshot.as_mut() {
            if snapshot.provenance.meetings.is_none() && snapshot.source_filter != filter {
                Arc::make_mut(snapshot).source_filter = filter;
            }
        }
    }
}

/// A dispatched fetch: the token and filter captured at dispatch time.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    source: Source,
    attempt: u64,
    filter: TimeFilter,
}

/// Owns the metrics snapshot and the per-source fetch state.
///
/// Clones share the same store.
#[derive(Clone)]
pub struct FetchCoordinator {
    upstream: Arc<dyn UpstreamSource>,
    retry: Arc<dyn RetryStrategy>,
    normalizer: Arc<Normalizer>,
    settings: FetchSettings,
    store: Arc<RwLock<Store>>,
}

impl FetchCoordinator {
    /// Creates a coordinator with default settings, the built-in alias
    /// table, and exponential backoff.
    pub fn new(upstream: Arc<dyn UpstreamSource>) -> Self {
        Self::with_settings(upstream, FetchSettings::default())
    }

    /// Creates a coordinator with the given settings.
    pub fn with_settings(upstream: Arc<dyn UpstreamSource>, settings: FetchSettings) -> Self {
        let store = Store {
            filter: settings.initial_filter,
            snapshot: None,
            meetings: SourceState::default(),
            users: SourceState::default(),
            next_attempt: 0,
        };

        Self {
            upstream,
            retry: Arc::new(ExponentialBackoff::default()),
            normalizer: Arc::new(Normalizer::default()),
            settings,
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Sets the retry strategy.
    pub fn with_retry_strategy(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the normalizer.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Gets the settings.
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Returns the last committed snapshot.
    pub async fn current_snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.store.read().await.snapshot.clone()
    }

    /// Returns the active filter.
    pub async fn filter(&self) -> TimeFilter {
        self.store.read().await.filter
    }

    /// Returns the status of a source.
    pub async fn status(&self, source: Source) -> SourceStatus {
        self.store.read().await.source(source).status
    }

    /// Returns true while a source has a fetch in flight.
    pub async fn is_loading(&self, source: Source) -> bool {
        self.status(source).await == SourceStatus::Loading
    }

    /// Returns the error of the source's last failed fetch.
    pub async fn last_error(&self, source: Source) -> Option<DashboardError> {
        self.store.read().await.source(source).last_error.clone()
    }

    /// Switches the active filter and refetches the filter-scoped sources.
    ///
    /// Any fetch still in flight for those sources is superseded.
    pub async fn set_filter(&self, filter: TimeFilter) -> FetchReport {
        let (meetings, users) = {
            let mut store = self.store.write().await;
            store.filter = filter;
            let meetings = Some(Self::dispatch(&mut store, Source::Meetings));
            let users = self
                .settings
                .users_filter_scoped
                .then(|| Self::dispatch(&mut store, Source::Users));
            (meetings, users)
        };
        debug!(filter = %filter, "filter changed");

        self.run_all(meetings, users).await
    }

    /// Refetches both sources under the active filter.
    ///
    /// Safe to call while a previous refresh is in flight; the new attempt
    /// supersedes the old one.
    pub async fn refresh(&self) -> FetchReport {
        let (meetings, users) = {
            let mut store = self.store.write().await;
            let meetings = Self::dispatch(&mut store, Source::Meetings);
            let users = Self::dispatch(&mut store, Source::Users);
            (Some(meetings), Some(users))
        };

        self.run_all(meetings, users).await
    }

    /// Discards the snapshot and returns every source to `Idle`.
    ///
    /// Fetches still in flight are discarded when they complete.
    pub async fn shutdown(&self) {
        let mut store = self.store.write().await;
        store.snapshot = None;
        for source in Source::ALL {
            let state = store.source_mut(source);
            state.status = SourceStatus::Idle;
            state.attempt = 0;
            state.last_error = None;
        }
        debug!("coordinator shut down");
    }

    fn dispatch(store: &mut Store, source: Source) -> Ticket {
        store.next_attempt += 1;
        let attempt = store.next_attempt;
        let filter = store.filter;

        let state = store.source_mut(source);
        state.status = SourceStatus::Loading;
        state.attempt = attempt;

        debug!(source = %source, filter = %filter, attempt, "fetch dispatched");
        Ticket {
            source,
            attempt,
            filter,
        }
    }

    async fn run_all(&self, meetings: Option<Ticket>, users: Option<Ticket>) -> FetchReport {
        let meetings = async {
            match meetings {
                Some(ticket) => Some(self.run(ticket).await),
                None => None,
            }
        };
        let users = async {
            match users {
                Some(ticket) => Some(self.run(ticket).await),
                None => None,
            }
        };

        let (meetings, users) = tokio::join!(meetings, users);
        FetchReport { meetings, users }
    }

    async fn run(&self, ticket: Ticket) -> FetchOutcome {
        let result = match ticket.source {
            Source::Meetings => self.fetch_meetings(ticket.filter).await,
            Source::Users => self.fetch_users(ticket.filter).await,
        };
        self.complete(ticket, result).await
    }

    async fn fetch_meetings(&self, filter: TimeFilter) -> DashboardResult<RawPayloads> {
        let timeout = self.settings.timeout;
        let retry = self.retry.as_ref();

        let counts = with_retry(retry, timeout, "meetings", || {
            self.upstream.meetings_count(Some(filter))
        });
        let graph = async {
            if self.settings.fetch_meetings_graph {
                Some(
                    with_retry(retry, timeout, "meetingsGraph", || {
                        self.upstream.meetings_graph(filter)
                    })
                    .await,
                )
            } else {
                None
            }
        };

        let (counts, graph) = tokio::join!(counts, graph);
        let mut raw = RawPayloads::new().with(PayloadKind::Meetings, counts?);
        match graph {
            Some(Ok(series)) => raw.insert(PayloadKind::MeetingsGraph, series),
            Some(Err(err)) => {
                warn!(filter = %filter, error = %err, "meetings graph unavailable, series left absent");
            }
            None => {}
        }
        Ok(raw)
    }

    async fn fetch_users(&self, filter: TimeFilter) -> DashboardResult<RawPayloads> {
        let scoped = self.settings.users_filter_scoped.then_some(filter);
        let body = with_retry(self.retry.as_ref(), self.settings.timeout, "users", || {
            self.upstream.analytics(scoped)
        })
        .await?;
        Ok(RawPayloads::new().with(PayloadKind::Users, body))
    }

    async fn complete(&self, ticket: Ticket, result: DashboardResult<RawPayloads>) -> FetchOutcome {
        let Ticket {
            source,
            attempt,
            filter,
        } = ticket;

        // Normalize before taking the write lock; it is pure.
        let normalized = result.map(|raw| match source {
            Source::Meetings => Group::Meetings(self.normalizer.normalize_meetings(&raw).0, raw),
            Source::Users => Group::Users(self.normalizer.normalize_users(&raw).0, raw),
        });

        let mut store = self.store.write().await;
        let current = store.source(source).attempt;
        let stale_filter = self.settings.is_scoped(source) && store.filter != filter;
        if current != attempt || stale_filter {
            warn!(
                source = %source,
                filter = %filter,
                attempt,
                current_attempt = current,
                active_filter = %store.filter,
                "discarding stale response"
            );
            return FetchOutcome::Discarded;
        }

        match normalized {
            Ok(group) => {
                let stamp = GroupStamp {
                    filter,
                    fetched_at: Utc::now(),
                    attempt,
                };
                let base = store.snapshot.clone().unwrap_or_else(|| {
                    Arc::new(MetricsSnapshot::empty(store.filter, stamp.fetched_at))
                });
                let next = match group {
                    Group::Meetings(group, raw) => base.with_meetings(group, stamp, raw),
                    Group::Users(group, raw) => base.with_users(group, stamp, raw),
                };
                store.snapshot = Some(Arc::new(next));
                store.align_source_filter();

                let state = store.source_mut(source);
                state.status = SourceStatus::Ready;
                state.last_error = None;
                debug!(source = %source, filter = %filter, attempt, "field group committed");
                FetchOutcome::Committed
            }
            Err(err) => {
                // Unscoped users data is valid under any filter.
                if !self.settings.users_filter_scoped {
                    store.align_source_filter();
                }
                let state = store.source_mut(source);
                state.status = SourceStatus::Failed;
                state.last_error = Some(err.clone());
                error!(source = %source, filter = %filter, attempt, error = %err, "fetch failed");
                FetchOutcome::Failed(err)
            }
        }
    }
}

enum Group {
    Meetings(MeetingsGroup, RawPayloads),
    Users(UsersGroup, RawPayloads),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::NoRetry;
    use dashboard_adapter_memory::{Endpoint, MemoryUpstream};
    use serde_json::json;

    async fn scripted() -> MemoryUpstream {
        let upstream = MemoryUpstream::new();
        upstream
            .respond(
                Endpoint::MeetingsCount,
                None,
                json!({"totalBooked": 12, "totalScheduled": 3, "totalCanceled": 5}),
            )
            .await;
        upstream
            .respond(
                Endpoint::Analytics,
                None,
                json!({"totalUsers": 100, "DAU": 10, "WAU": 40, "MAU": 80}),
            )
            .await;
        upstream
            .respond(
                Endpoint::MeetingsGraph,
                None,
                json!([{"period": "Mon", "booked": 2, "scheduled": 1, "canceled": 0}]),
            )
            .await;
        upstream
    }

    fn coordinator(upstream: &MemoryUpstream) -> FetchCoordinator {
        FetchCoordinator::new(Arc::new(upstream.clone())).with_retry_strategy(Arc::new(NoRetry))
    }

    #[tokio::test]
    async fn test_refresh_commits_both_groups() {
        let upstream = scripted().await;
        let coordinator = coordinator(&upstream);

        assert!(coordinator.current_snapshot().await.is_none());
        assert_eq!(coordinator.status(Source::Meetings).await, SourceStatus::Idle);

        let report = coordinator.refresh().await;
        assert!(report.all_committed());

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.meetings.booked, 12);
        assert_eq!(snapshot.meetings.upcoming, 0);
        assert_eq!(snapshot.users.total, 100);
        assert_eq!(snapshot.source_filter, TimeFilter::Last30Days);
        assert_eq!(snapshot.series.meetings_over_time.as_ref().map(Vec::len), Some(1));
        assert!(snapshot.raw.get(PayloadKind::MeetingsGraph).is_some());
        assert_eq!(coordinator.status(Source::Users).await, SourceStatus::Ready);
        assert!(!coordinator.is_loading(Source::Meetings).await);
    }

    #[tokio::test]
    async fn test_set_filter_leaves_users_alone_by_default() {
        let upstream = scripted().await;
        let coordinator = coordinator(&upstream);

        let report = coordinator.set_filter(TimeFilter::Last7Days).await;
        assert_eq!(report.meetings, Some(FetchOutcome::Committed));
        assert_eq!(report.users, None);
        assert_eq!(upstream.call_count(Endpoint::Analytics).await, 0);
        assert_eq!(
            upstream.calls().await[0].filter,
            Some(TimeFilter::Last7Days)
        );

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.source_filter, TimeFilter::Last7Days);
        assert!(snapshot.provenance.users.is_none());
    }

    #[tokio::test]
    async fn test_scoped_users_follow_filter() {
        let upstream = scripted().await;
        let coordinator = FetchCoordinator::with_settings(
            Arc::new(upstream.clone()),
            FetchSettings::new().users_filter_scoped(true),
        )
        .with_retry_strategy(Arc::new(NoRetry));

        let report = coordinator.set_filter(TimeFilter::Last90Days).await;
        assert!(report.all_committed());
        assert_eq!(report.users, Some(FetchOutcome::Committed));

        let analytics: Vec<_> = upstream
            .calls()
            .await
            .into_iter()
            .filter(|c| c.endpoint == Endpoint::Analytics)
            .collect();
        assert_eq!(analytics[0].filter, Some(TimeFilter::Last90Days));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_source() {
        let upstream = scripted().await;
        upstream
            .fail(
                Endpoint::Analytics,
                None,
                DashboardError::http_status("users", 500, "boom"),
            )
            .await;
        let coordinator = coordinator(&upstream);

        let report = coordinator.refresh().await;
        assert_eq!(report.meetings, Some(FetchOutcome::Committed));
        assert!(matches!(report.users, Some(FetchOutcome::Failed(_))));

        assert_eq!(coordinator.status(Source::Users).await, SourceStatus::Failed);
        assert_eq!(
            coordinator.last_error(Source::Users).await,
            Some(DashboardError::http_status("users", 500, "boom"))
        );
        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.meetings.booked, 12);
        assert_eq!(snapshot.users.total, 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_group() {
        let upstream = scripted().await;
        let coordinator = coordinator(&upstream);
        coordinator.refresh().await;

        upstream
            .fail(
                Endpoint::Analytics,
                None,
                DashboardError::transport("users", "reset"),
            )
            .await;
        coordinator.refresh().await;

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.users.total, 100);
        assert!(coordinator.last_error(Source::Users).await.is_some());
        assert!(coordinator.last_error(Source::Meetings).await.is_none());
    }

    #[tokio::test]
    async fn test_graph_failure_degrades_to_absent_series() {
        let upstream = scripted().await;
        upstream
            .fail(
                Endpoint::MeetingsGraph,
                None,
                DashboardError::http_status("meetingsGraph", 404, ""),
            )
            .await;
        let coordinator = coordinator(&upstream);

        let report = coordinator.set_filter(TimeFilter::Last30Days).await;
        assert_eq!(report.meetings, Some(FetchOutcome::Committed));

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.meetings.booked, 12);
        assert!(snapshot.series.meetings_over_time.is_none());
    }

    #[tokio::test]
    async fn test_graph_disabled() {
        let upstream = scripted().await;
        let coordinator = FetchCoordinator::with_settings(
            Arc::new(upstream.clone()),
            FetchSettings::new().fetch_meetings_graph(false),
        );

        coordinator.refresh().await;
        assert_eq!(upstream.call_count(Endpoint::MeetingsGraph).await, 0);
    }

    #[tokio::test]
    async fn test_stale_meetings_response_is_discarded() {
        let upstream = scripted().await;
        upstream
            .respond(
                Endpoint::MeetingsCount,
                Some(TimeFilter::Last30Days),
                json!({"totalBooked": 30}),
            )
            .await;
        upstream
            .respond(
                Endpoint::MeetingsCount,
                Some(TimeFilter::Last7Days),
                json!({"totalBooked": 7}),
            )
            .await;
        upstream
            .hold(Endpoint::MeetingsCount, Some(TimeFilter::Last30Days))
            .await;
        let coordinator = coordinator(&upstream);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.set_filter(TimeFilter::Last30Days).await })
        };
        upstream.wait_for_calls(Endpoint::MeetingsCount, 1).await;
        assert!(coordinator.is_loading(Source::Meetings).await);

        let second = coordinator.set_filter(TimeFilter::Last7Days).await;
        assert_eq!(second.meetings, Some(FetchOutcome::Committed));

        upstream
            .release(Endpoint::MeetingsCount, Some(TimeFilter::Last30Days))
            .await;
        let first = first.await.unwrap();
        assert_eq!(first.meetings, Some(FetchOutcome::Discarded));

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.source_filter, TimeFilter::Last7Days);
        assert_eq!(snapshot.meetings.booked, 7);
        assert_eq!(coordinator.status(Source::Meetings).await, SourceStatus::Ready);
    }

    #[tokio::test]
    async fn test_shutdown_discards_in_flight() {
        let upstream = scripted().await;
        let coordinator = coordinator(&upstream);
        coordinator.refresh().await;
        assert!(coordinator.current_snapshot().await.is_some());

        upstream
            .hold(Endpoint::MeetingsCount, Some(TimeFilter::Last30Days))
            .await;
        upstream.hold(Endpoint::Analytics, None).await;
        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        upstream.wait_for_calls(Endpoint::MeetingsCount, 2).await;
        upstream.wait_for_calls(Endpoint::Analytics, 2).await;

        coordinator.shutdown().await;
        upstream
            .release(Endpoint::MeetingsCount, Some(TimeFilter::Last30Days))
            .await;
        upstream.release(Endpoint::Analytics, None).await;
        let report = pending.await.unwrap();

        assert_eq!(report.meetings, Some(FetchOutcome::Discarded));
        assert_eq!(report.users, Some(FetchOutcome::Discarded));
        assert!(coordinator.current_snapshot().await.is_none());
        for source in Source::ALL {
            assert_eq!(coordinator.status(source).await, SourceStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_overlapping_refresh_supersedes() {
        let upstream = scripted().await;
        upstream.hold(Endpoint::Analytics, None).await;
        let coordinator = coordinator(&upstream);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        upstream.wait_for_calls(Endpoint::Analytics, 1).await;

        // The gate is consumed by the first request only.
        upstream
            .respond(Endpoint::Analytics, None, json!({"totalUsers": 5}))
            .await;
        let second = coordinator.refresh().await;
        assert!(second.all_committed());

        upstream.release(Endpoint::Analytics, None).await;
        let first = first.await.unwrap();
        assert_eq!(first.users, Some(FetchOutcome::Discarded));

        let snapshot = coordinator.current_snapshot().await.unwrap();
        assert_eq!(snapshot.users.total, 5);
    }
}
