//! Export formats, scopes, and artifacts.

use std::fmt;
use std::str::FromStr;

use dashboard_core::error::{DashboardError, DashboardResult};

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Xlsx,
    Pdf,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Csv, Format::Xlsx, Format::Pdf];

    /// Returns the lowercase format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }

    /// Returns the file extension.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Returns the MIME type.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "pdf" => Ok(Self::Pdf),
            other => Err(DashboardError::config(format!("unknown export format '{other}'"))),
        }
    }
}

/// The part of a snapshot being exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Meetings,
    Users,
    All,
    /// The pre-normalization payloads, as JSON.
    Raw,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Meetings, Scope::Users, Scope::All, Scope::Raw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Users => "users",
            Self::All => "all",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meetings" => Ok(Self::Meetings),
            "users" => Ok(Self::Users),
            "all" => Ok(Self::All),
            "raw" => Ok(Self::Raw),
            other => Err(DashboardError::config(format!("unknown export scope '{other}'"))),
        }
    }
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested filename, `{scope}-{YYYY-MM-DD}.{ext}`.
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Returns the bytes as UTF-8 text, for the text formats.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Result of an export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Artifact(Artifact),
    /// The scope had nothing to serialize; no file should be written.
    NothingToExport,
}

impl ExportOutcome {
    /// Converts to the artifact, treating "nothing to export" as an error.
    pub fn into_artifact(self, scope: Scope) -> DashboardResult<Artifact> {
        match self {
            Self::Artifact(artifact) => Ok(artifact),
            Self::NothingToExport => Err(DashboardError::NothingToExport {
                scope: scope.to_string(),
            }),
        }
    }
}
