//! Chart adapter.
//!
//! Pure projections from a snapshot onto the point and series shapes a
//! charting surface consumes.

use serde::{Deserialize, Serialize};

use crate::types::{MeetingsPoint, MetricsSnapshot};

/// Which time-series to project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesKind {
    /// Booked, scheduled, and cancelled counts per period.
    MeetingsOverTime,
    /// New users per period.
    UserGrowth,
}

impl SeriesKind {
    /// Names of the values carried by each point, in order.
    pub fn value_labels(&self) -> &'static [&'static str] {
        match self {
            Self::MeetingsOverTime => &["Booked", "Scheduled", "Cancelled"],
            Self::UserGrowth => &["New Users"],
        }
    }
}

/// One labeled point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub label: String,
    pub values: Vec<u64>,
}

impl LabeledPoint {
    /// Returns the first value, for single-valued series.
    pub fn value(&self) -> u64 {
        self.values.first().copied().unwrap_or(0)
    }
}

/// Projects a time-series from the snapshot.
///
/// Returns an empty sequence when the snapshot holds no series of that
/// kind; callers render a "no data" state instead of an empty chart.
pub fn to_series(snapshot: &MetricsSnapshot, kind: SeriesKind) -> Vec<LabeledPoint> {
    match kind {
        SeriesKind::MeetingsOverTime => snapshot
            .series
            .meetings_over_time
            .iter()
            .flatten()
            .map(|p| LabeledPoint {
                label: p.period.clone(),
                values: vec![p.booked, p.scheduled, p.cancelled],
            })
            .collect(),
        SeriesKind::UserGrowth => snapshot
            .series
            .user_growth
            .iter()
            .flatten()
            .map(|p| LabeledPoint {
                label: p.period.clone(),
                values: vec![p.count],
            })
            .collect(),
    }
}

/// One named line of a multi-line chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

/// Splits the meetings series into Booked, Cancelled, and Scheduled lines.
pub fn meetings_datasets(snapshot: &MetricsSnapshot) -> Vec<Dataset> {
    let Some(points) = snapshot.series.meetings_over_time.as_ref() else {
        return Vec::new();
    };
    let labels: Vec<String> = points.iter().map(|p| p.period.clone()).collect();
    let line = |label: &str, pick: fn(&MeetingsPoint) -> u64| Dataset {
        label: label.to_string(),
        labels: labels.clone(),
        data: points.iter().map(pick).collect(),
    };

    vec![
        line("Booked", |p| p.booked),
        line("Cancelled", |p| p.cancelled),
        line("Scheduled", |p| p.scheduled),
    ]
}

/// Activity window for the active/inactive breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityWindow {
    Daily,
    Weekly,
    Monthly,
}

impl ActivityWindow {
    /// Label of the active slice.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily Active Users",
            Self::Weekly => "Weekly Active Users",
            Self::Monthly => "Monthly Active Users",
        }
    }
}

/// One slice of a pie chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub label: String,
    pub value: u64,
    /// Share of the pie, rounded to whole percent.
    pub percent: u64,
}

/// Active vs. inactive users for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBreakdown {
    pub active: Slice,
    pub inactive: Slice,
}

/// Splits total users into active and inactive for a window.
pub fn activity_breakdown(snapshot: &MetricsSnapshot, window: ActivityWindow) -> ActivityBreakdown {
    let users = &snapshot.users;
    let active = match window {
        ActivityWindow::Daily => users.daily,
        ActivityWindow::Weekly => users.weekly,
        ActivityWindow::Monthly => users.monthly,
    };
    let inactive = users.total.saturating_sub(active);
    let sum = active + inactive;

    ActivityBreakdown {
        active: Slice {
            label: window.label().to_string(),
            value: active,
            percent: rounded_percent(active, sum),
        },
        inactive: Slice {
            label: "Inactive Users".to_string(),
            value: inactive,
            percent: rounded_percent(inactive, sum),
        },
    }
}

/// Daily actives relative to the average day of the monthly window, in percent.
///
/// `None` when there are no monthly actives to compare against.
pub fn daily_trend_percent(snapshot: &MetricsSnapshot) -> Option<f64> {
    let monthly = snapshot.users.monthly;
    if monthly == 0 {
        return None;
    }
    let average_day = monthly as f64 / 30.0;
    Some((snapshot.users.daily as f64 - average_day) / average_day * 100.0)
}

fn rounded_percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::{PayloadKind, RawPayloads, TimeFilter};
    use serde_json::json;

    fn snapshot(users: serde_json::Value) -> MetricsSnapshot {
        normalize(
            &RawPayloads::new().with(PayloadKind::Users, users),
            TimeFilter::Last30Days,
        )
    }

    #[test]
    fn test_user_growth_single_point() {
        let snap = snapshot(json!({"userGrowth": [{"period": "Jan", "count": 10}]}));
        let points = to_series(&snap, SeriesKind::UserGrowth);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].label, "Jan");
        assert_eq!(points[0].value(), 10);
    }

    #[test]
    fn test_missing_series_is_empty() {
        let snap = snapshot(json!({"DAU": 3}));
        assert!(to_series(&snap, SeriesKind::UserGrowth).is_empty());
        assert!(to_series(&snap, SeriesKind::MeetingsOverTime).is_empty());
        assert!(meetings_datasets(&snap).is_empty());
    }

    #[test]
    fn test_meetings_datasets_share_labels() {
        let raw = RawPayloads::new().with(
            PayloadKind::Meetings,
            json!({"meetingsOverTime": [
                {"period": "Mon", "booked": 2, "cancelled": 1, "scheduled": 4},
                {"period": "Tue", "booked": 5, "canceled": 0, "scheduled": 1}
            ]}),
        );
        let snap = normalize(&raw, TimeFilter::Last7Days);
        let sets = meetings_datasets(&snap);

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].label, "Booked");
        assert_eq!(sets[0].data, vec![2, 5]);
        assert_eq!(sets[1].data, vec![1, 0]);
        assert_eq!(sets[2].labels, vec!["Mon".to_string(), "Tue".to_string()]);

        let points = to_series(&snap, SeriesKind::MeetingsOverTime);
        assert_eq!(points[0].values, vec![2, 4, 1]);
    }

    #[test]
    fn test_activity_breakdown() {
        let snap = snapshot(json!({"totalUsers": 200, "DAU": 50, "MAU": 250}));
        let daily = activity_breakdown(&snap, ActivityWindow::Daily);
        assert_eq!(daily.active.value, 50);
        assert_eq!(daily.inactive.value, 150);
        assert_eq!(daily.active.percent, 25);
        assert_eq!(daily.inactive.percent, 75);

        let monthly = activity_breakdown(&snap, ActivityWindow::Monthly);
        assert_eq!(monthly.inactive.value, 0);
        assert_eq!(monthly.active.percent, 100);

        let empty = activity_breakdown(&snapshot(json!({})), ActivityWindow::Weekly);
        assert_eq!(empty.active.percent, 0);
        assert_eq!(empty.inactive.percent, 0);
    }

    #[test]
    fn test_daily_trend() {
        let snap = snapshot(json!({"DAU": 12, "MAU": 300}));
        let trend = daily_trend_percent(&snap).unwrap();
        assert!((trend - 20.0).abs() < 1e-9);
        assert_eq!(daily_trend_percent(&snapshot(json!({"DAU": 5}))), None);
    }
}
