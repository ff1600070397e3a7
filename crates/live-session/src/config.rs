//! Session configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! match the live-class page's behaviour.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default delay before attaching a remote video track to its render target.
pub const DEFAULT_VIDEO_ATTACH_DELAY_MS: u64 = 50;

/// Default capacity of the session actor mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "live_session=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Live session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before a remote video track is attached to `player-<uid>`,
    /// giving the UI time to create the render target.
    pub video_attach_delay: Duration,

    /// Bounded mailbox size; callers wait when it is full.
    pub mailbox_capacity: usize,

    /// Log output format for [`crate::observability::init_tracing`].
    pub log_format: LogFormat,

    /// Fallback tracing filter directive.
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            video_attach_delay: Duration::from_millis(DEFAULT_VIDEO_ATTACH_DELAY_MS),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            log_format: LogFormat::Text,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl SessionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let video_attach_delay_ms = match vars.get("LIVE_VIDEO_ATTACH_DELAY_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!("LIVE_VIDEO_ATTACH_DELAY_MS: {e}"))
            })?,
            None => DEFAULT_VIDEO_ATTACH_DELAY_MS,
        };

        let mailbox_capacity = match vars.get("LIVE_MAILBOX_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue(format!("LIVE_MAILBOX_CAPACITY: {e}")))?,
            None => DEFAULT_MAILBOX_CAPACITY,
        };
        // tokio::sync::mpsc::channel panics on zero capacity
        if mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "LIVE_MAILBOX_CAPACITY must be greater than 0".to_string(),
            ));
        }

        let log_format = match vars.get("LIVE_LOG_FORMAT").map(String::as_str) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "LIVE_LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )))
            }
        };

        let log_filter = vars
            .get("LIVE_LOG_FILTER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(SessionConfig {
            video_attach_delay: Duration::from_millis(video_attach_delay_ms),
            mailbox_capacity,
            log_format,
            log_filter,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = SessionConfig::from_vars(&HashMap::new()).expect("defaults should load");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.video_attach_delay, Duration::from_millis(50));
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("LIVE_VIDEO_ATTACH_DELAY_MS".to_string(), "0".to_string()),
            ("LIVE_MAILBOX_CAPACITY".to_string(), "8".to_string()),
            ("LIVE_LOG_FORMAT".to_string(), "json".to_string()),
            ("LIVE_LOG_FILTER".to_string(), "live_session=debug".to_string()),
        ]);

        let config = SessionConfig::from_vars(&vars).expect("config should load");
        assert_eq!(config.video_attach_delay, Duration::ZERO);
        assert_eq!(config.mailbox_capacity, 8);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "live_session=debug");
    }

    #[test]
    fn test_from_vars_rejects_bad_delay() {
        let vars = HashMap::from([(
            "LIVE_VIDEO_ATTACH_DELAY_MS".to_string(),
            "soon".to_string(),
        )]);
        assert!(matches!(
            SessionConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("LIVE_VIDEO_ATTACH_DELAY_MS")
        ));
    }

    #[test]
    fn test_from_vars_rejects_zero_mailbox() {
        let vars = HashMap::from([("LIVE_MAILBOX_CAPACITY".to_string(), "0".to_string())]);
        assert!(matches!(
            SessionConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_unknown_log_format() {
        let vars = HashMap::from([("LIVE_LOG_FORMAT".to_string(), "xml".to_string())]);
        assert!(matches!(
            SessionConfig::from_vars(&vars),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("xml")
        ));
    }
}
