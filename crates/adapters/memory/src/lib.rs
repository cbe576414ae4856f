//! # Dashboard Memory Adapter
//!
//! A scripted in-memory upstream for the dashboard engine, primarily
//! intended for testing and local development.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dashboard_adapter_memory::{Endpoint, MemoryUpstream};
//!
//! let upstream = MemoryUpstream::new();
//! upstream
//!     .respond(Endpoint::MeetingsCount, None, json!({"totalBooked": 12}))
//!     .await;
//!
//! // Hold the 30d response until the test releases it.
//! upstream.hold(Endpoint::MeetingsCount, Some(TimeFilter::Last30Days)).await;
//! ```

use async_trait::async_trait;
use dashboard_core::error::{DashboardError, DashboardResult};
use dashboard_core::traits::UpstreamSource;
use dashboard_core::types::TimeFilter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

/// Upstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    MeetingsCount,
    Analytics,
    MeetingsGraph,
}

impl Endpoint {
    /// Returns the request path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::MeetingsCount => "/meetingsCount",
            Self::Analytics => "/analytics",
            Self::MeetingsGraph => "/meetingsGraph",
        }
    }
}

/// A recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub endpoint: Endpoint,
    pub filter: Option<TimeFilter>,
}

/// Scripted result for one endpoint and filter.
#[derive(Debug, Clone)]
enum Scripted {
    Body(Value),
    Error(DashboardError),
}

type Key = (Endpoint, Option<TimeFilter>);

/// A hold on the next matching request.
#[derive(Debug)]
struct Gate {
    notify: Arc<Notify>,
    claimed: bool,
}

/// Scripted in-memory upstream.
///
/// Responses are looked up by endpoint and requested filter, falling back
/// to the entry scripted with no filter. Unscripted requests fail with
/// HTTP 404. Clones share the same script.
#[derive(Debug, Clone)]
pub struct MemoryUpstream {
    script: Arc<RwLock<HashMap<Key, Scripted>>>,
    gates: Arc<RwLock<HashMap<Key, Gate>>>,
    calls: Arc<RwLock<Vec<Call>>>,
    call_signal: Arc<Notify>,
}

impl MemoryUpstream {
    /// Creates an upstream with nothing scripted.
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(HashMap::new())),
            gates: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            call_signal: Arc::new(Notify::new()),
        }
    }

    /// Scripts a response body. `filter: None` matches any filter.
    pub async fn respond(&self, endpoint: Endpoint, filter: Option<TimeFilter>, body: Value) {
        self.script
            .write()
            .await
            .insert((endpoint, filter), Scripted::Body(body));
    }

    /// Scripts a failure. `filter: None` matches any filter.
    pub async fn fail(&self, endpoint: Endpoint, filter: Option<TimeFilter>, error: DashboardError) {
        self.script
            .write()
            .await
            .insert((endpoint, filter), Scripted::Error(error));
    }

    /// Holds the next matching request until [`release`](Self::release) is
    /// called. Requests arriving while it is held pass straight through.
    pub async fn hold(&self, endpoint: Endpoint, filter: Option<TimeFilter>) {
        self.gates
            .write()
            .await
            .insert(
                (endpoint, filter),
                Gate {
                    notify: Arc::new(Notify::new()),
                    claimed: false,
                },
            );
    }

    /// Releases a held request. Releasing before the request arrives lets it
    /// pass straight through.
    pub async fn release(&self, endpoint: Endpoint, filter: Option<TimeFilter>) {
        if let Some(gate) = self.gates.read().await.get(&(endpoint, filter)) {
            gate.notify.notify_one();
        }
    }

    /// Returns every recorded request in arrival order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    /// Returns the number of requests made to an endpoint.
    pub async fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    /// Waits until at least `n` requests have reached an endpoint.
    pub async fn wait_for_calls(&self, endpoint: Endpoint, n: usize) {
        loop {
            let signalled = self.call_signal.notified();
            if self.call_count(endpoint).await >= n {
                return;
            }
            signalled.await;
        }
    }

    /// Clears scripts, gates, and recorded calls.
    pub async fn clear(&self) {
        self.script.write().await.clear();
        self.gates.write().await.clear();
        self.calls.write().await.clear();
    }

    async fn serve(&self, endpoint: Endpoint, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        self.calls.write().await.push(Call { endpoint, filter });
        self.call_signal.notify_waiters();
        debug!(path = endpoint.path(), filter = ?filter, "memory upstream request");

        // Only the first matching request waits on a gate; later ones pass.
        let gate = match self.gates.write().await.get_mut(&(endpoint, filter)) {
            Some(gate) if !gate.claimed => {
                gate.claimed = true;
                Some(gate.notify.clone())
            }
            _ => None,
        };
        if let Some(gate) = gate {
            gate.notified().await;
            self.gates.write().await.remove(&(endpoint, filter));
        }

        let script = self.script.read().await;
        let scripted = script
            .get(&(endpoint, filter))
            .or_else(|| script.get(&(endpoint, None)));

        match scripted {
            Some(Scripted::Body(body)) => Ok(body.clone()),
            Some(Scripted::Error(err)) => Err(err.clone()),
            None => Err(DashboardError::http_status(endpoint.path(), 404, "not scripted")),
        }
    }
}

impl Default for MemoryUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamSource for MemoryUpstream {
    fn name(&self) -> &str {
        "memory"
    }

    async fn meetings_count(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        self.serve(Endpoint::MeetingsCount, filter).await
    }

    async fn analytics(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        self.serve(Endpoint::Analytics, filter).await
    }

    async fn meetings_graph(&self, filter: TimeFilter) -> DashboardResult<Value> {
        self.serve(Endpoint::MeetingsGraph, Some(filter)).await
    }
}
