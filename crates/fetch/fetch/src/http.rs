//! HTTP upstream backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::error::{DashboardError, DashboardResult};
use dashboard_core::traits::UpstreamSource;
use dashboard_core::types::TimeFilter;
use serde_json::Value;
use tracing::debug;

/// Request paths of the admin analytics API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub meetings_count: String,
    pub analytics: String,
    pub meetings_graph: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            meetings_count: "/meetingsCount".to_string(),
            analytics: "/analytics".to_string(),
            meetings_graph: "/meetingsGraph".to_string(),
        }
    }
}

/// Upstream that issues plain `GET` requests against the admin API.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    paths: EndpointPaths,
    timeout: Duration,
}

impl HttpUpstream {
    /// Creates an upstream rooted at `base_url` with the default paths.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DashboardResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths: EndpointPaths::default(),
            timeout,
        })
    }

    /// Sets the request paths.
    pub fn with_paths(mut self, paths: EndpointPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the absolute URL for a path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get(&self, origin: &str, path: &str, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if let Some(filter) = filter {
            request = request.query(&[("filter", filter.as_query())]);
        }

        debug!(origin, url = %url, filter = ?filter, "upstream GET");
        let response = request.send().await.map_err(|e| self.map_error(origin, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::http_status(origin, status.as_u16(), body));
        }

        response.json::<Value>().await.map_err(|e| self.map_error(origin, e))
    }

    fn map_error(&self, origin: &str, err: reqwest::Error) -> DashboardError {
        if err.is_timeout() {
            DashboardError::timeout(origin, self.timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            DashboardError::http_status(origin, status.as_u16(), err.to_string())
        } else {
            DashboardError::transport(origin, err.to_string())
        }
    }
}

#[async_trait]
impl UpstreamSource for HttpUpstream {
    fn name(&self) -> &str {
        "http"
    }

    async fn meetings_count(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        self.get("meetings", &self.paths.meetings_count, filter).await
    }

    async fn analytics(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        self.get("users", &self.paths.analytics, filter).await
    }

    async fn meetings_graph(&self, filter: TimeFilter) -> DashboardResult<Value> {
        self.get("meetingsGraph", &self.paths.meetings_graph, Some(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let upstream =
            HttpUpstream::new("http://localhost:3000/api/admin/", Duration::from_secs(1)).unwrap();

        assert_eq!(upstream.base_url(), "http://localhost:3000/api/admin");
        assert_eq!(
            upstream.url_for("/meetingsCount"),
            "http://localhost:3000/api/admin/meetingsCount"
        );
        assert_eq!(
            upstream.url_for("analytics"),
            "http://localhost:3000/api/admin/analytics"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let upstream = HttpUpstream::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = upstream.analytics(None).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.is_retryable());
    }
}
