//! Field alias table.
//!
//! Upstream deployments disagree on field names (`totalCanceled` vs
//! `cancelled`, `DAU` vs `dailyActiveUsers`). Every accepted spelling lives
//! in [`BUILTIN_ALIASES`]; the normalizer only ever asks the table which
//! candidate comes first. Adding a spelling is a one-line data change.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;
use crate::types::PayloadKind;

/// A normalized metric name, independent of upstream naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    MeetingsBooked,
    MeetingsScheduled,
    MeetingsCancelled,
    MeetingsUpcoming,
    UsersTotal,
    UsersDaily,
    UsersWeekly,
    UsersMonthly,
    MeetingsOverTime,
    UserGrowth,
    /// Fields probed on each time-series element.
    PointPeriod,
    PointBooked,
    PointScheduled,
    PointCancelled,
    PointCount,
}

impl CanonicalField {
    /// Every canonical field, in table order.
    pub const ALL: [CanonicalField; 15] = [
        CanonicalField::MeetingsBooked,
        CanonicalField::MeetingsScheduled,
        CanonicalField::MeetingsCancelled,
        CanonicalField::MeetingsUpcoming,
        CanonicalField::UsersTotal,
        CanonicalField::UsersDaily,
        CanonicalField::UsersWeekly,
        CanonicalField::UsersMonthly,
        CanonicalField::MeetingsOverTime,
        CanonicalField::UserGrowth,
        CanonicalField::PointPeriod,
        CanonicalField::PointBooked,
        CanonicalField::PointScheduled,
        CanonicalField::PointCancelled,
        CanonicalField::PointCount,
    ];

    /// Returns the dotted path used in configuration and logs.
    pub fn path(&self) -> &'static str {
        match self {
            Self::MeetingsBooked => "meetings.booked",
            Self::MeetingsScheduled => "meetings.scheduled",
            Self::MeetingsCancelled => "meetings.cancelled",
            Self::MeetingsUpcoming => "meetings.upcoming",
            Self::UsersTotal => "users.total",
            Self::UsersDaily => "users.daily",
            Self::UsersWeekly => "users.weekly",
            Self::UsersMonthly => "users.monthly",
            Self::MeetingsOverTime => "series.meetingsOverTime",
            Self::UserGrowth => "series.userGrowth",
            Self::PointPeriod => "point.period",
            Self::PointBooked => "point.booked",
            Self::PointScheduled => "point.scheduled",
            Self::PointCancelled => "point.cancelled",
            Self::PointCount => "point.count",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for CanonicalField {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|field| field.path() == s)
            .copied()
            .ok_or_else(|| DashboardError::config(format!("unknown canonical field '{s}'")))
    }
}

/// One row of the built-in alias table.
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    pub field: CanonicalField,
    /// Payloads probed, in order. Empty for time-series element fields.
    pub payloads: &'static [PayloadKind],
    /// Upstream names probed, in order.
    pub candidates: &'static [&'static str],
}

const MEETINGS: &[PayloadKind] = &[PayloadKind::Meetings];
const USERS: &[PayloadKind] = &[PayloadKind::Users];
const ELEMENT: &[PayloadKind] = &[];

/// The built-in alias table.
pub static BUILTIN_ALIASES: &[FieldAlias] = &[
    FieldAlias {
        field: CanonicalField::MeetingsBooked,
        payloads: MEETINGS,
        candidates: &["totalBooked", "booked", "bookedMeetings", "meetingsBooked"],
    },
    FieldAlias {
        field: CanonicalField::MeetingsScheduled,
        payloads: MEETINGS,
        candidates: &["totalScheduled", "scheduled", "scheduledMeetings", "meetingsScheduled"],
    },
    FieldAlias {
        field: CanonicalField::MeetingsCancelled,
        payloads: MEETINGS,
        candidates: &["totalCanceled", "totalCancelled", "cancelled", "canceled"],
    },
    FieldAlias {
        field: CanonicalField::MeetingsUpcoming,
        payloads: MEETINGS,
        candidates: &["totalUpcoming", "upcoming", "upcomingMeetings"],
    },
    FieldAlias {
        field: CanonicalField::UsersTotal,
        payloads: USERS,
        candidates: &["totalUsers", "total", "userCount"],
    },
    FieldAlias {
        field: CanonicalField::UsersDaily,
        payloads: USERS,
        candidates: &["DAU", "dailyActiveUsers", "dau"],
    },
    FieldAlias {
        field: CanonicalField::UsersWeekly,
        payloads: USERS,
        candidates: &["WAU", "weeklyActiveUsers", "wau"],
    },
    FieldAlias {
        field: CanonicalField::UsersMonthly,
        payloads: USERS,
        candidates: &["MAU", "monthlyActiveUsers", "mau"],
    },
    FieldAlias {
        field: CanonicalField::MeetingsOverTime,
        payloads: &[PayloadKind::MeetingsGraph, PayloadKind::Meetings],
        candidates: &["meetingsOverTime", "meetings_over_time", "series", "data"],
    },
    FieldAlias {
        field: CanonicalField::UserGrowth,
        payloads: USERS,
        candidates: &["userGrowth", "user_growth", "growth"],
    },
    FieldAlias {
        field: CanonicalField::PointPeriod,
        payloads: ELEMENT,
        candidates: &["period", "label", "date", "name"],
    },
    FieldAlias {
        field: CanonicalField::PointBooked,
        payloads: ELEMENT,
        candidates: &["booked", "totalBooked"],
    },
    FieldAlias {
        field: CanonicalField::PointScheduled,
        payloads: ELEMENT,
        candidates: &["scheduled", "totalScheduled"],
    },
    FieldAlias {
        field: CanonicalField::PointCancelled,
        payloads: ELEMENT,
        candidates: &["canceled", "cancelled", "totalCanceled", "totalCancelled"],
    },
    FieldAlias {
        field: CanonicalField::PointCount,
        payloads: ELEMENT,
        candidates: &["count", "users", "newUsers", "value"],
    },
];

/// An owned alias table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub field: CanonicalField,
    pub payloads: Vec<PayloadKind>,
    pub candidates: Vec<String>,
}

/// The alias table consulted by the normalizer.
///
/// Starts from [`BUILTIN_ALIASES`]; extra candidates are appended after the
/// built-in ones so declared order always wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Creates the built-in table.
    pub fn builtin() -> Self {
        let entries = BUILTIN_ALIASES
            .iter()
            .map(|alias| AliasEntry {
                field: alias.field,
                payloads: alias.payloads.to_vec(),
                candidates: alias.candidates.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }

    /// Appends an upstream name for a field. Duplicates are ignored.
    pub fn with_alias(mut self, field: CanonicalField, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.field == field) {
            if !entry.candidates.iter().any(|c| *c == name) {
                entry.candidates.push(name);
            }
        }
        self
    }

    /// Returns the entry for a field.
    pub fn entry(&self, field: CanonicalField) -> Option<&AliasEntry> {
        self.entries.iter().find(|e| e.field == field)
    }

    /// Returns the candidate names for a field.
    pub fn candidates(&self, field: CanonicalField) -> &[String] {
        self.entry(field).map(|e| e.candidates.as_slice()).unwrap_or(&[])
    }

    /// Returns the payloads probed for a field.
    pub fn payloads(&self, field: CanonicalField) -> &[PayloadKind] {
        self.entry(field).map(|e| e.payloads.as_slice()).unwrap_or(&[])
    }

    /// Probes `object` for a field; the first present candidate wins.
    pub fn resolve<'a>(&self, field: CanonicalField, object: &'a Value) -> Option<&'a Value> {
        first_present(object, self.candidates(field).iter().map(String::as_str))
    }

    /// Iterates all entries.
    pub fn entries(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Returns the value of the first candidate key present in a JSON object.
///
/// A key holding `null` counts as present. Non-objects resolve nothing.
pub fn first_present<'a, 'k>(
    object: &'a Value,
    candidates: impl IntoIterator<Item = &'k str>,
) -> Option<&'a Value> {
    let map = object.as_object()?;
    candidates.into_iter().find_map(|key| map.get(key))
}
