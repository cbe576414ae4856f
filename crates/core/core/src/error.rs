//! Error types for the dashboard engine.
//!
//! This module defines the `DashboardError` enum which represents every
//! failure the fetch, normalization, and export paths can report.

use thiserror::Error;

/// The main error type for dashboard operations.
///
/// Normalization never produces one of these as a return value; schema
/// drift is reported as a `Schema` error through the log only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    // ==================== Transport Errors ====================
    /// The upstream request failed or returned a non-2xx status.
    #[error("Transport error from '{origin}': {message}")]
    Transport {
        origin: String,
        message: String,
        status: Option<u16>,
    },

    /// The upstream request did not complete in time.
    #[error("Request to '{origin}' timed out after {after_ms}ms")]
    Timeout { origin: String, after_ms: u64 },

    // ==================== Schema Errors ====================
    /// A payload was present but none of the aliased fields resolved.
    #[error("Schema drift in '{origin}': no alias resolved for {}", .fields.join(", "))]
    Schema { origin: String, fields: Vec<String> },

    // ==================== Export Errors ====================
    /// The target format library failed to produce the artifact.
    #[error("Export to {format} failed: {message}")]
    Export { format: String, message: String },

    /// There is no data for the requested export scope.
    #[error("Nothing to export for scope '{scope}'")]
    NothingToExport { scope: String },

    // ==================== Configuration Errors ====================
    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ==================== Internal Errors ====================
    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl DashboardError {
    /// Creates a new transport error without an HTTP status.
    pub fn transport(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            origin: origin.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Creates a transport error for a non-2xx response.
    pub fn http_status(origin: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        Self::Transport {
            origin: origin.into(),
            message,
            status: Some(status),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(origin: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            origin: origin.into(),
            after_ms,
        }
    }

    /// Creates a new schema error.
    pub fn schema(origin: impl Into<String>, fields: Vec<String>) -> Self {
        Self::Schema {
            origin: origin.into(),
            fields,
        }
    }

    /// Creates a new export error.
    pub fn export(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Export {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns true if this error came from the upstream transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

/// A Result type alias using DashboardError.
pub type DashboardResult<T> = Result<T, DashboardError>;

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashboardError::http_status("meetings", 503, "");
        assert_eq!(err.to_string(), "Transport error from 'meetings': HTTP 503");

        let err = DashboardError::schema("users", vec!["users.total".into(), "users.daily".into()]);
        assert_eq!(
            err.to_string(),
            "Schema drift in 'users': no alias resolved for users.total, users.daily"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(DashboardError::timeout("meetings", 100).is_retryable());
        assert!(DashboardError::transport("meetings", "connection reset").is_retryable());
        assert!(DashboardError::http_status("meetings", 502, "bad gateway").is_retryable());
        assert!(!DashboardError::http_status("meetings", 404, "").is_retryable());
        assert!(!DashboardError::export("pdf", "font").is_retryable());
    }

    #[test]
    fn test_is_transport() {
        assert!(DashboardError::timeout("users", 5).is_transport());
        assert!(!DashboardError::config("bad filter").is_transport());
    }
}
