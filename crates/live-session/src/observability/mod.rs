//! Observability for the live session client.
//!
//! # Privacy by Default
//!
//! Session transitions use `#[instrument(skip_all)]` with explicit safe
//! fields. The access credential is never a span or event field. Metric labels
//! are bounded:
//! - `operation`: 7 values (join, leave, publish, toggle_audio, toggle_video,
//!   toggle_screen_share, teardown)
//! - `status`: 2 values (success, error)
//! - `event`: 4 values (user-joined, user-left, user-published, user-unpublished)
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `live_session_transitions_total` | Counter | `operation`, `status` | Transition outcomes |
//! | `live_transition_duration_seconds` | Histogram | `operation` | Time a transition held the session |
//! | `live_transport_events_total` | Counter | `event`, `status` | Dispatched remote events |
//! | `live_tracks_closed_total` | Counter | `source` | Device releases |
//! | `live_remote_participants` | Gauge | none | Current remote participant count |
//! | `live_mailbox_depth` | Gauge | none | Pending session requests |

pub mod metrics;

use crate::config::{LogFormat, SessionConfig};
use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// A global subscriber is already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInstall(#[from] TryInitError),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_filter`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &SessionConfig) -> Result<(), ObservabilityError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into());
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_installs_once() {
        let config = SessionConfig {
            log_format: LogFormat::Json,
            ..SessionConfig::default()
        };
        // Another subscriber may already be installed by the harness
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(ObservabilityError::SubscriberInstall(_))
        ));
    }
}
