//! Logging initialization.

use crate::config::{ConfigError, LoggingConfig};

/// Installs the global `tracing` subscriber at the configured level.
///
/// Returns `Ok(false)` if a subscriber was already installed; the existing
/// one is kept.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let level = config.max_level()?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok();
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let config = LoggingConfig::default();
        init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn test_bad_level_is_rejected() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
        };
        assert!(matches!(init_logging(&config), Err(ConfigError::Invalid(_))));
    }
}
