//! Dashboard configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashboard_core::alias::{AliasTable, CanonicalField};
use dashboard_core::types::TimeFilter;
use dashboard_fetch::{EndpointPaths, ExponentialBackoff, FetchSettings, NoRetry, RetryStrategy};
use serde::{Deserialize, Serialize};

/// Top-level configuration, one table per section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub upstream: UpstreamConfig,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    /// Extra alias candidates per canonical field path, appended after the
    /// built-in ones.
    pub aliases: BTreeMap<String, Vec<String>>,
    pub logging: LoggingConfig,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the admin API.
    pub base_url: String,
    /// Transport-level request timeout in milliseconds.
    pub request_timeout_ms: u64,
    pub meetings_count_path: String,
    pub analytics_path: String,
    pub meetings_graph_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let paths = EndpointPaths::default();
        Self {
            base_url: "http://localhost:3000/api/admin".to_string(),
            request_timeout_ms: 10_000,
            meetings_count_path: paths.meetings_count,
            analytics_path: paths.analytics,
            meetings_graph_path: paths.meetings_graph,
        }
    }
}

/// Fetch coordination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Filter active at startup (`7d`, `30d`, `90d`, `365d`, or a legacy label).
    pub default_filter: String,
    /// Whether the users source follows the filter.
    pub users_filter_scoped: bool,
    /// Whether the meetings source also requests the graph endpoint.
    pub fetch_meetings_graph: bool,
    /// Hard per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_filter: TimeFilter::default().as_query().to_string(),
            users_filter_scoped: false,
            fetch_meetings_graph: true,
            timeout_ms: 15_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter: 0.1,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parses the configured level.
    pub fn max_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl DashboardConfig {
    /// Parses configuration from TOML text. Missing sections use defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: toml::Value =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let config = Self {
            upstream: section(&config, "upstream")?,
            fetch: section(&config, "fetch")?,
            retry: section(&config, "retry")?,
            aliases: section(&config, "aliases")?,
            logging: section(&config, "logging")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the upstream base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.upstream.base_url = url.into();
        self
    }

    /// Sets the startup filter.
    pub fn with_default_filter(mut self, filter: TimeFilter) -> Self {
        self.fetch.default_filter = filter.as_query().to_string();
        self
    }

    /// Sets whether the users source follows the filter.
    pub fn with_users_filter_scoped(mut self, scoped: bool) -> Self {
        self.fetch.users_filter_scoped = scoped;
        self
    }

    /// Appends an alias candidate for a canonical field path.
    pub fn with_alias(mut self, field: impl Into<String>, name: impl Into<String>) -> Self {
        self.aliases.entry(field.into()).or_default().push(name.into());
        self
    }

    /// Checks every value that is parsed lazily.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.base_url is empty".to_string()));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_ms must be positive".to_string()));
        }
        self.default_filter()?;
        self.alias_table()?;
        self.logging.max_level()?;
        Ok(())
    }

    /// Parses the startup filter.
    pub fn default_filter(&self) -> Result<TimeFilter, ConfigError> {
        self.fetch
            .default_filter
            .parse()
            .map_err(|e: dashboard_core::DashboardError| ConfigError::Invalid(e.to_string()))
    }

    /// Builds the alias table: built-ins first, then the configured extras.
    pub fn alias_table(&self) -> Result<AliasTable, ConfigError> {
        let mut table = AliasTable::builtin();
        for (path, names) in &self.aliases {
            let field: CanonicalField = path
                .parse()
                .map_err(|e: dashboard_core::DashboardError| ConfigError::Invalid(e.to_string()))?;
            for name in names {
                table = table.with_alias(field, name.clone());
            }
        }
        Ok(table)
    }

    /// Builds the fetch coordinator settings.
    pub fn fetch_settings(&self) -> Result<FetchSettings, ConfigError> {
        Ok(FetchSettings::new()
            .initial_filter(self.default_filter()?)
            .users_filter_scoped(self.fetch.users_filter_scoped)
            .fetch_meetings_graph(self.fetch.fetch_meetings_graph)
            .timeout(Duration::from_millis(self.fetch.timeout_ms)))
    }

    /// Builds the retry strategy.
    pub fn retry_strategy(&self) -> Arc<dyn RetryStrategy> {
        if self.retry.max_attempts <= 1 {
            return Arc::new(NoRetry);
        }
        Arc::new(
            ExponentialBackoff::new()
                .base(Duration::from_millis(self.retry.base_delay_ms))
                .max_delay(Duration::from_millis(self.retry.max_delay_ms))
                .max_attempts(self.retry.max_attempts)
                .jitter(self.retry.jitter),
        )
    }

    /// Returns the upstream request paths.
    pub fn endpoint_paths(&self) -> EndpointPaths {
        EndpointPaths {
            meetings_count: self.upstream.meetings_count_path.clone(),
            analytics: self.upstream.analytics_path.clone(),
            meetings_graph: self.upstream.meetings_graph_path.clone(),
        }
    }
}

fn section<T>(config: &toml::Value, name: &str) -> Result<T, ConfigError>
where
    T: Default + serde::de::DeserializeOwned,
{
    config
        .get(name)
        .map(|v| toml::Value::try_into(v.clone()))
        .transpose()
        .map_err(|e| ConfigError::ParseError(format!("[{name}]: {e}")))
        .map(Option::unwrap_or_default)
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &str) -> Result<DashboardConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    DashboardConfig::from_toml_str(&content)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
