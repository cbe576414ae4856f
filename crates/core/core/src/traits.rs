//! Core traits for the dashboard engine.
//!
//! This module defines the interface upstream adapters implement so the
//! fetch coordinator can stay agnostic of the transport behind it.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::DashboardResult;
use crate::types::TimeFilter;

/// Trait for upstream analytics sources.
///
/// Implementations return the response body as untrusted JSON; shape
/// checking is the normalizer's job. A non-2xx response or a body that is
/// not JSON is a transport error.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// `GET /meetingsCount`, with `?filter=` when `filter` is set.
    async fn meetings_count(&self, filter: Option<TimeFilter>) -> DashboardResult<Value>;

    /// `GET /analytics`, with `?filter=` when `filter` is set.
    async fn analytics(&self, filter: Option<TimeFilter>) -> DashboardResult<Value>;

    /// `GET /meetingsGraph?filter=`.
    async fn meetings_graph(&self, filter: TimeFilter) -> DashboardResult<Value>;
}

#[async_trait]
impl<T: UpstreamSource + ?Sized> UpstreamSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn meetings_count(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        (**self).meetings_count(filter).await
    }

    async fn analytics(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
        (**self).analytics(filter).await
    }

    async fn meetings_graph(&self, filter: TimeFilter) -> DashboardResult<Value> {
        (**self).meetings_graph(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use serde_json::json;

    struct Fixed;

    #[async_trait]
    impl UpstreamSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn meetings_count(&self, filter: Option<TimeFilter>) -> DashboardResult<Value> {
            Ok(json!({"filter": filter.map(|f| f.as_query())}))
        }

        async fn analytics(&self, _filter: Option<TimeFilter>) -> DashboardResult<Value> {
            Err(DashboardError::http_status("users", 500, ""))
        }

        async fn meetings_graph(&self, _filter: TimeFilter) -> DashboardResult<Value> {
            Ok(json!([]))
        }
    }

    #[tokio::test]
    async fn test_arc_delegates() {
        let source: Arc<dyn UpstreamSource> = Arc::new(Fixed);
        let shared = Arc::new(source);

        assert_eq!(shared.name(), "fixed");
        let body = shared.meetings_count(Some(TimeFilter::Last7Days)).await.unwrap();
        assert_eq!(body, json!({"filter": "7d"}));
        assert!(shared.analytics(None).await.is_err());
    }
}
