//! The tabular contract shared by every format.
//!
//! Row order is fixed per block and does not depend on the output format.

use dashboard_core::types::{MeetingCounts, MetricsSnapshot, UserCounts};

use crate::types::Scope;

/// Column headers of every table.
pub const HEADER: [&str; 2] = ["Metric", "Value"];

/// One metric row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricRow {
    pub metric: &'static str,
    pub value: u64,
}

/// A titled group of rows. The name doubles as the worksheet name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: &'static str,
    pub title: &'static str,
    pub rows: Vec<MetricRow>,
}

pub fn meetings_block(counts: &MeetingCounts) -> Block {
    Block {
        name: "meetings",
        title: "Meetings",
        rows: vec![
            MetricRow { metric: "Booked", value: counts.booked },
            MetricRow { metric: "Scheduled", value: counts.scheduled },
            MetricRow { metric: "Cancelled", value: counts.cancelled },
            MetricRow { metric: "Upcoming", value: counts.upcoming },
        ],
    }
}

pub fn users_block(counts: &UserCounts) -> Block {
    Block {
        name: "users",
        title: "Users",
        rows: vec![
            MetricRow { metric: "Total", value: counts.total },
            MetricRow { metric: "Daily", value: counts.daily },
            MetricRow { metric: "Weekly", value: counts.weekly },
            MetricRow { metric: "Monthly", value: counts.monthly },
        ],
    }
}

/// Returns the blocks for a scope. `Raw` has no tabular form.
pub fn blocks(snapshot: &MetricsSnapshot, scope: Scope) -> Vec<Block> {
    match scope {
        Scope::Meetings => vec![meetings_block(&snapshot.meetings)],
        Scope::Users => vec![users_block(&snapshot.users)],
        Scope::All => vec![
            meetings_block(&snapshot.meetings),
            users_block(&snapshot.users),
        ],
        Scope::Raw => Vec::new(),
    }
}
