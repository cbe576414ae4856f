//! # Dashboard Core
//!
//! This crate provides the foundational types for the Meetdesk admin
//! dashboard analytics engine. It defines the canonical `MetricsSnapshot`,
//! the field alias table that absorbs upstream schema drift, the metric
//! normalizer, the chart adapter, and the `UpstreamSource` trait that
//! adapters implement.

pub mod alias;
pub mod chart;
pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

// Re-export commonly used items at the crate root
pub use alias::{AliasEntry, AliasTable, BUILTIN_ALIASES, CanonicalField, FieldAlias, first_present};
pub use chart::{
    ActivityBreakdown, ActivityWindow, Dataset, LabeledPoint, SeriesKind, Slice,
    activity_breakdown, daily_trend_percent, meetings_datasets, to_series,
};
pub use error::{DashboardError, DashboardResult};
pub use normalize::{NormalizationReport, Normalizer, coerce_count, normalize};
pub use traits::UpstreamSource;
pub use types::{
    GroupStamp, GrowthPoint, MeetingCounts, MeetingsGroup, MeetingsPoint, MetricsSnapshot,
    PayloadKind, Provenance, RawPayloads, SeriesSet, Source, TimeFilter, UserCounts, UsersGroup,
};
