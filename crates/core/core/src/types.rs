//! Core data types for the dashboard engine.
//!
//! This module defines the canonical `MetricsSnapshot` and the value types
//! it is assembled from. A snapshot is never mutated once produced; the
//! `with_*` methods return a new snapshot with one field group replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

/// The time window a snapshot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFilter {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "365d")]
    Last365Days,
}

impl TimeFilter {
    /// All filters, shortest window first.
    pub const ALL: [TimeFilter; 4] = [
        TimeFilter::Last7Days,
        TimeFilter::Last30Days,
        TimeFilter::Last90Days,
        TimeFilter::Last365Days,
    ];

    /// Returns the value sent as the `filter` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Last90Days => "90d",
            Self::Last365Days => "365d",
        }
    }

    /// Returns the window length in days.
    pub fn days(&self) -> u32 {
        match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::Last90Days => 90,
            Self::Last365Days => 365,
        }
    }
}

impl Default for TimeFilter {
    fn default() -> Self {
        Self::Last30Days
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for TimeFilter {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" | "7days" => Ok(Self::Last7Days),
            "30d" | "month" => Ok(Self::Last30Days),
            "90d" => Ok(Self::Last90Days),
            "365d" | "year" => Ok(Self::Last365Days),
            other => Err(DashboardError::config(format!("unknown time filter '{other}'"))),
        }
    }
}

/// A logical fetch source. Each source owns one field group of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Meetings,
    Users,
}

impl Source {
    /// Both sources, in commit order.
    pub const ALL: [Source; 2] = [Source::Meetings, Source::Users];

    /// Returns the source name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Users => "users",
        }
    }

    /// Returns the raw payloads this source contributes.
    pub fn payloads(&self) -> &'static [PayloadKind] {
        match self {
            Self::Meetings => &[PayloadKind::Meetings, PayloadKind::MeetingsGraph],
            Self::Users => &[PayloadKind::Users],
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream response body, identified by the endpoint it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadKind {
    /// `GET /meetingsCount`
    Meetings,
    /// `GET /analytics`
    Users,
    /// `GET /meetingsGraph`
    MeetingsGraph,
}

impl PayloadKind {
    /// Returns the key used in the raw payload map.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Users => "users",
            Self::MeetingsGraph => "meetingsGraph",
        }
    }

    /// Whether the whole payload may itself be a time-series array.
    pub fn carries_bare_series(&self) -> bool {
        matches!(self, Self::MeetingsGraph)
    }
}

/// Meeting counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingCounts {
    pub booked: u64,
    pub scheduled: u64,
    pub cancelled: u64,
    pub upcoming: u64,
}

/// User activity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub total: u64,
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
}

/// One period of the meetings time-series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingsPoint {
    pub period: String,
    pub booked: u64,
    pub scheduled: u64,
    pub cancelled: u64,
}

/// One period of the user growth time-series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub period: String,
    pub count: u64,
}

/// Optional time-series data.
///
/// `None` means upstream provided no series; `Some(vec![])` means it
/// provided an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meetings_over_time: Option<Vec<MeetingsPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_growth: Option<Vec<GrowthPoint>>,
}

/// The normalized meetings field group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingsGroup {
    pub counts: MeetingCounts,
    pub over_time: Option<Vec<MeetingsPoint>>,
}

/// The normalized users field group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersGroup {
    pub counts: UserCounts,
    pub growth: Option<Vec<GrowthPoint>>,
}

/// Attribution of one committed field group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStamp {
    /// Filter active when the fetch was dispatched.
    pub filter: TimeFilter,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
    /// Fetch attempt token that produced the group.
    pub attempt: u64,
}

/// Per-group attribution for a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub meetings: Option<GroupStamp>,
    pub users: Option<GroupStamp>,
}

impl Provenance {
    /// Returns the stamp for one source.
    pub fn get(&self, source: Source) -> Option<&GroupStamp> {
        match source {
            Source::Meetings => self.meetings.as_ref(),
            Source::Users => self.users.as_ref(),
        }
    }
}

/// Pre-normalization payloads keyed by `PayloadKind::key`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayloads(BTreeMap<String, Value>);

impl RawPayloads {
    /// Creates an empty payload map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload, builder style.
    pub fn with(mut self, kind: PayloadKind, payload: Value) -> Self {
        self.insert(kind, payload);
        self
    }

    /// Inserts or replaces a payload.
    pub fn insert(&mut self, kind: PayloadKind, payload: Value) {
        self.0.insert(kind.key().to_string(), payload);
    }

    /// Removes a payload.
    pub fn remove(&mut self, kind: PayloadKind) -> Option<Value> {
        self.0.remove(kind.key())
    }

    /// Gets a payload.
    pub fn get(&self, kind: PayloadKind) -> Option<&Value> {
        self.0.get(kind.key())
    }

    /// Returns true if no payload has been captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates payloads in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serializes the map as indented JSON.
    pub fn to_pretty_json(&self) -> Result<String, DashboardError> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

/// One immutable, fully-resolved set of metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub meetings: MeetingCounts,
    pub users: UserCounts,
    pub series: SeriesSet,
    /// Filter of the meetings group, the filter-scoped group.
    pub source_filter: TimeFilter,
    /// Newest commit time across the groups.
    pub fetched_at: DateTime<Utc>,
    pub provenance: Provenance,
    #[serde(skip)]
    pub raw: RawPayloads,
}

impl MetricsSnapshot {
    /// Creates an all-zero snapshot with no committed groups.
    pub fn empty(filter: TimeFilter, at: DateTime<Utc>) -> Self {
        Self {
            meetings: MeetingCounts::default(),
            users: UserCounts::default(),
            series: SeriesSet::default(),
            source_filter: filter,
            fetched_at: at,
            provenance: Provenance::default(),
            raw: RawPayloads::new(),
        }
    }

    /// Returns a new snapshot with the meetings group replaced.
    ///
    /// `raw` replaces every meetings payload; kinds missing from it are
    /// dropped rather than kept from the previous commit.
    pub fn with_meetings(&self, group: MeetingsGroup, stamp: GroupStamp, raw: RawPayloads) -> Self {
        let mut next = self.clone();
        next.meetings = group.counts;
        next.series.meetings_over_time = group.over_time;
        next.provenance.meetings = Some(stamp);
        next.source_filter = stamp.filter;
        next.fetched_at = next.fetched_at.max(stamp.fetched_at);
        next.replace_raw(Source::Meetings, raw);
        next
    }

    /// Returns a new snapshot with the users group replaced.
    ///
    /// `source_filter` is left alone; only the users stamp records the
    /// filter the group was fetched under.
    pub fn with_users(&self, group: UsersGroup, stamp: GroupStamp, raw: RawPayloads) -> Self {
        let mut next = self.clone();
        next.users = group.counts;
        next.series.user_growth = group.growth;
        next.provenance.users = Some(stamp);
        next.fetched_at = next.fetched_at.max(stamp.fetched_at);
        next.replace_raw(Source::Users, raw);
        next
    }

    /// Returns true if any field group has been committed.
    pub fn has_data(&self) -> bool {
        self.provenance.meetings.is_some() || self.provenance.users.is_some()
    }

    fn replace_raw(&mut self, source: Source, raw: RawPayloads) {
        for kind in source.payloads() {
            self.raw.remove(*kind);
        }
        for kind in source.payloads() {
            if let Some(payload) = raw.get(*kind) {
                self.raw.insert(*kind, payload.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn stamp(filter: TimeFilter, secs: i64, attempt: u64) -> GroupStamp {
        GroupStamp {
            filter,
            fetched_at: Utc.timestamp_opt(secs, 0).single().unwrap(),
            attempt,
        }
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("7d".parse::<TimeFilter>().unwrap(), TimeFilter::Last7Days);
        assert_eq!("month".parse::<TimeFilter>().unwrap(), TimeFilter::Last30Days);
        assert_eq!("year".parse::<TimeFilter>().unwrap(), TimeFilter::Last365Days);
        assert!("14d".parse::<TimeFilter>().is_err());
        assert_eq!(TimeFilter::Last90Days.to_string(), "90d");
        assert_eq!(TimeFilter::default(), TimeFilter::Last30Days);
    }

    #[test]
    fn test_filter_serde() {
        let value = serde_json::to_value(TimeFilter::Last365Days).unwrap();
        assert_eq!(value, json!("365d"));
        let back: TimeFilter = serde_json::from_value(json!("7d")).unwrap();
        assert_eq!(back, TimeFilter::Last7Days);
    }

    #[test]
    fn test_with_meetings_does_not_mutate_original() {
        let base = MetricsSnapshot::empty(TimeFilter::Last30Days, Utc.timestamp_opt(0, 0).unwrap());
        let group = MeetingsGroup {
            counts: MeetingCounts {
                booked: 4,
                ..Default::default()
            },
            over_time: Some(vec![]),
        };
        let raw = RawPayloads::new().with(PayloadKind::Meetings, json!({"totalBooked": 4}));

        let next = base.with_meetings(group, stamp(TimeFilter::Last7Days, 10, 1), raw);

        assert_eq!(base.meetings.booked, 0);
        assert!(!base.has_data());
        assert_eq!(next.meetings.booked, 4);
        assert_eq!(next.source_filter, TimeFilter::Last7Days);
        assert_eq!(next.series.meetings_over_time, Some(vec![]));
        assert_eq!(next.provenance.meetings.unwrap().attempt, 1);
        assert!(next.raw.get(PayloadKind::Meetings).is_some());
    }

    #[test]
    fn test_users_commit_keeps_meetings_filter() {
        let base = MetricsSnapshot::empty(TimeFilter::Last30Days, Utc.timestamp_opt(0, 0).unwrap());
        let with_meetings = base.with_meetings(
            MeetingsGroup::default(),
            stamp(TimeFilter::Last7Days, 10, 1),
            RawPayloads::new(),
        );
        let both = with_meetings.with_users(
            UsersGroup::default(),
            stamp(TimeFilter::Last30Days, 20, 1),
            RawPayloads::new(),
        );

        assert_eq!(both.source_filter, TimeFilter::Last7Days);
        assert_eq!(both.fetched_at, Utc.timestamp_opt(20, 0).unwrap());
        assert_eq!(both.provenance.get(Source::Users).unwrap().filter, TimeFilter::Last30Days);
    }

    #[test]
    fn test_users_commit_leaves_source_filter() {
        let base = MetricsSnapshot::empty(TimeFilter::Last7Days, Utc.timestamp_opt(0, 0).unwrap());
        let next = base.with_users(
            UsersGroup::default(),
            stamp(TimeFilter::Last30Days, 5, 1),
            RawPayloads::new(),
        );

        assert_eq!(next.source_filter, TimeFilter::Last7Days);
        assert_eq!(next.provenance.users.map(|s| s.filter), Some(TimeFilter::Last30Days));
        assert!(next.provenance.meetings.is_none());
    }

    #[test]
    fn test_raw_replaced_per_source() {
        let base = MetricsSnapshot::empty(TimeFilter::Last30Days, Utc.timestamp_opt(0, 0).unwrap());
        let first = base.with_meetings(
            MeetingsGroup::default(),
            stamp(TimeFilter::Last30Days, 1, 1),
            RawPayloads::new()
                .with(PayloadKind::Meetings, json!({"a": 1}))
                .with(PayloadKind::MeetingsGraph, json!([])),
        );
        let first = first.with_users(
            UsersGroup::default(),
            stamp(TimeFilter::Last30Days, 1, 1),
            RawPayloads::new().with(PayloadKind::Users, json!({"DAU": 2})),
        );
        let second = first.with_meetings(
            MeetingsGroup::default(),
            stamp(TimeFilter::Last30Days, 2, 2),
            RawPayloads::new().with(PayloadKind::Meetings, json!({"a": 2})),
        );

        assert_eq!(second.raw.get(PayloadKind::Meetings), Some(&json!({"a": 2})));
        assert_eq!(second.raw.get(PayloadKind::MeetingsGraph), None);
        assert_eq!(second.raw.get(PayloadKind::Users), Some(&json!({"DAU": 2})));
    }
}
