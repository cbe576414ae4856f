//! # Dashboard Fetch
//!
//! Fetch coordination for the Meetdesk admin dashboard providing:
//! - A single-writer snapshot store with per-source loading and error state
//! - Stale-response suppression keyed by attempt token and filter
//! - Retry strategies with exponential backoff and a hard timeout
//! - An HTTP upstream over `reqwest` (feature `http-client`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use dashboard_fetch::{FetchCoordinator, HttpUpstream};
//!
//! let upstream = HttpUpstream::new("http://localhost:3000/api/admin", timeout)?;
//! let coordinator = FetchCoordinator::new(Arc::new(upstream));
//!
//! coordinator.refresh().await;
//! coordinator.set_filter(TimeFilter::Last7Days).await;
//! let snapshot = coordinator.current_snapshot().await;
//! ```

mod coordinator;
#[cfg(feature = "http-client")]
mod http;
mod retry;

pub use coordinator::{FetchCoordinator, FetchOutcome, FetchReport, FetchSettings, SourceStatus};
#[cfg(feature = "http-client")]
pub use http::{EndpointPaths, HttpUpstream};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy, with_retry};
