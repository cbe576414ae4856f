//! Metric normalization.
//!
//! Maps raw upstream payloads onto the canonical model. Normalization is
//! total: any JSON input produces a snapshot, and malformed values degrade
//! to zero (scalars) or absent (time-series).

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::alias::{AliasTable, CanonicalField};
use crate::error::DashboardError;
use crate::types::{
    GroupStamp, GrowthPoint, MeetingCounts, MeetingsGroup, MeetingsPoint, MetricsSnapshot,
    PayloadKind, RawPayloads, Source, TimeFilter, UserCounts, UsersGroup,
};

/// Canonical fields that fell back to their default during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Scalar fields that resolved to 0 because no alias was present.
    pub defaulted: Vec<CanonicalField>,
    /// Time-series fields left absent.
    pub absent_series: Vec<CanonicalField>,
    /// Time-series elements dropped for lack of a period label.
    pub dropped_points: usize,
}

impl NormalizationReport {
    /// Returns true if every field resolved.
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty() && self.absent_series.is_empty() && self.dropped_points == 0
    }

    fn merge(&mut self, other: NormalizationReport) {
        self.defaulted.extend(other.defaulted);
        self.absent_series.extend(other.absent_series);
        self.dropped_points += other.dropped_points;
    }
}

/// Normalizes raw payloads using an alias table.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    table: AliasTable,
}

impl Normalizer {
    /// Creates a normalizer over the given table.
    pub fn new(table: AliasTable) -> Self {
        Self { table }
    }

    /// Gets the alias table.
    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Normalizes all payloads into a snapshot stamped with `filter` and now.
    pub fn normalize(&self, raw: &RawPayloads, filter: TimeFilter) -> MetricsSnapshot {
        self.normalize_with_report(raw, filter, Utc::now()).0
    }

    /// Normalizes all payloads and reports which fields fell back to defaults.
    pub fn normalize_with_report(
        &self,
        raw: &RawPayloads,
        filter: TimeFilter,
        at: DateTime<Utc>,
    ) -> (MetricsSnapshot, NormalizationReport) {
        let (meetings, mut report) = self.normalize_meetings(raw);
        let (users, users_report) = self.normalize_users(raw);
        report.merge(users_report);

        let stamp = GroupStamp {
            filter,
            fetched_at: at,
            attempt: 0,
        };
        let snapshot = MetricsSnapshot::empty(filter, at)
            .with_meetings(meetings, stamp, raw.clone())
            .with_users(users, stamp, raw.clone());

        (snapshot, report)
    }

    /// Normalizes the meetings field group.
    pub fn normalize_meetings(&self, raw: &RawPayloads) -> (MeetingsGroup, NormalizationReport) {
        let mut report = NormalizationReport::default();
        let counts = MeetingCounts {
            booked: self.scalar(raw, CanonicalField::MeetingsBooked, &mut report),
            scheduled: self.scalar(raw, CanonicalField::MeetingsScheduled, &mut report),
            cancelled: self.scalar(raw, CanonicalField::MeetingsCancelled, &mut report),
            upcoming: self.scalar(raw, CanonicalField::MeetingsUpcoming, &mut report),
        };
        let over_time = self
            .series(raw, CanonicalField::MeetingsOverTime, &mut report)
            .map(|items| {
                self.points(items, &mut report, |table, item, period| MeetingsPoint {
                    period,
                    booked: count_of(table, CanonicalField::PointBooked, item),
                    scheduled: count_of(table, CanonicalField::PointScheduled, item),
                    cancelled: count_of(table, CanonicalField::PointCancelled, item),
                })
            });

        log_schema_drift(Source::Meetings, raw, &report, &MEETING_SCALARS);
        (MeetingsGroup { counts, over_time }, report)
    }

    /// Normalizes the users field group.
    pub fn normalize_users(&self, raw: &RawPayloads) -> (UsersGroup, NormalizationReport) {
        let mut report = NormalizationReport::default();
        let counts = UserCounts {
            total: self.scalar(raw, CanonicalField::UsersTotal, &mut report),
            daily: self.scalar(raw, CanonicalField::UsersDaily, &mut report),
            weekly: self.scalar(raw, CanonicalField::UsersWeekly, &mut report),
            monthly: self.scalar(raw, CanonicalField::UsersMonthly, &mut report),
        };
        let growth = self
            .series(raw, CanonicalField::UserGrowth, &mut report)
            .map(|items| {
                self.points(items, &mut report, |table, item, period| GrowthPoint {
                    period,
                    count: count_of(table, CanonicalField::PointCount, item),
                })
            });

        log_schema_drift(Source::Users, raw, &report, &USER_SCALARS);
        (UsersGroup { counts, growth }, report)
    }

    fn scalar(
        &self,
        raw: &RawPayloads,
        field: CanonicalField,
        report: &mut NormalizationReport,
    ) -> u64 {
        let found = self
            .table
            .payloads(field)
            .iter()
            .filter_map(|kind| raw.get(*kind))
            .find_map(|payload| self.table.resolve(field, payload));

        match found {
            Some(value) => coerce_count(value),
            None => {
                report.defaulted.push(field);
                0
            }
        }
    }

    fn series<'a>(
        &self,
        raw: &'a RawPayloads,
        field: CanonicalField,
        report: &mut NormalizationReport,
    ) -> Option<&'a Vec<Value>> {
        let found = self.table.payloads(field).iter().find_map(|kind| {
            let payload = raw.get(*kind)?;
            if kind.carries_bare_series() {
                if let Value::Array(items) = payload {
                    return Some(items);
                }
            }
            self.table.resolve(field, payload)?.as_array()
        });

        if found.is_none() {
            report.absent_series.push(field);
        }
        found
    }

    fn points<T>(
        &self,
        items: &[Value],
        report: &mut NormalizationReport,
        build: impl Fn(&AliasTable, &Value, String) -> T,
    ) -> Vec<T> {
        let mut points = Vec::with_capacity(items.len());
        for item in items {
            match period_of(&self.table, item) {
                Some(period) => points.push(build(&self.table, item, period)),
                None => report.dropped_points += 1,
            }
        }
        points
    }
}

const MEETING_SCALARS: [CanonicalField; 4] = [
    CanonicalField::MeetingsBooked,
    CanonicalField::MeetingsScheduled,
    CanonicalField::MeetingsCancelled,
    CanonicalField::MeetingsUpcoming,
];

const USER_SCALARS: [CanonicalField; 4] = [
    CanonicalField::UsersTotal,
    CanonicalField::UsersDaily,
    CanonicalField::UsersWeekly,
    CanonicalField::UsersMonthly,
];

/// Normalizes payloads with the built-in alias table.
pub fn normalize(raw: &RawPayloads, filter: TimeFilter) -> MetricsSnapshot {
    Normalizer::default().normalize(raw, filter)
}

/// Coerces an untrusted JSON value to a non-negative integer.
///
/// Negative, non-finite, and non-numeric values become 0. Fractions are
/// truncated. Numeric strings are parsed.
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v
            } else if n.as_i64().is_some() {
                0
            } else {
                n.as_f64().map(coerce_float).unwrap_or(0)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(coerce_float))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn coerce_float(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.trunc() as u64
    } else {
        0
    }
}

fn count_of(table: &AliasTable, field: CanonicalField, item: &Value) -> u64 {
    table.resolve(field, item).map(coerce_count).unwrap_or(0)
}

/// A period label is a non-blank string or an integer.
fn period_of(table: &AliasTable, item: &Value) -> Option<String> {
    match table.resolve(CanonicalField::PointPeriod, item)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn log_schema_drift(
    source: Source,
    raw: &RawPayloads,
    report: &NormalizationReport,
    scalars: &[CanonicalField],
) {
    let present = source.payloads().iter().any(|kind| raw.get(*kind).is_some());
    if !present {
        debug!(source = %source, "no payload captured, group defaults to zero");
        return;
    }

    let missing: Vec<CanonicalField> = scalars
        .iter()
        .copied()
        .filter(|field| report.defaulted.contains(field))
        .collect();
    if missing.len() == scalars.len() {
        let err = DashboardError::schema(
            source.as_str(),
            missing.iter().map(|f| f.path().to_string()).collect(),
        );
        warn!(source = %source, error = %err, "payload matched no known field names");
    } else if !missing.is_empty() {
        debug!(
            source = %source,
            fields = ?missing.iter().map(CanonicalField::path).collect::<Vec<_>>(),
            "fields defaulted to zero"
        );
    }
}
