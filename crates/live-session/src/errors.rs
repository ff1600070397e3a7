//! Live session error types.
//!
//! Error types map to stable error codes for the UI layer. Transport details
//! are logged but not exposed through `client_message`.

use crate::transport::{MediaKind, TrackSource};
use thiserror::Error;

/// Session error type.
///
/// Maps to error codes:
/// - `InvalidOptions`: `INVALID_ARGUMENT` (1)
/// - `Connection`: `CONNECTION_FAILED` (2)
/// - `Device`: `DEVICE_UNAVAILABLE` (3)
/// - `NotJoined`, `NoLocalTrack`, `NotPublisher`: `FAILED_PRECONDITION` (4)
/// - `AlreadyJoined`: `CONFLICT` (5)
/// - `TransportEvent`, `Internal`: `INTERNAL_ERROR` (6)
#[derive(Debug, Error)]
pub enum SessionError {
    /// Join options failed validation before reaching the transport.
    #[error("Invalid join options: {0}")]
    InvalidOptions(String),

    /// Transport join or leave failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Camera, microphone or screen-capture acquisition or control failed.
    #[error("Device error ({source_kind}): {reason}")]
    Device {
        source_kind: TrackSource,
        reason: String,
    },

    /// Operation requires an active session.
    #[error("Not joined to a room")]
    NotJoined,

    /// Join requested while a session is already connected.
    #[error("Already joined to room {0}")]
    AlreadyJoined(String),

    /// Publishing requested by a subscriber-role session.
    #[error("Session role does not publish local media")]
    NotPublisher,

    /// Toggle requested for a media kind with no local track.
    #[error("No local {0} track")]
    NoLocalTrack(MediaKind),

    /// Malformed or unexpected transport event. Logged, never fatal.
    #[error("Transport event error: {0}")]
    TransportEvent(String),

    /// Session actor unreachable (mailbox closed or reply dropped).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Shorthand for a device error.
    pub fn device(source_kind: TrackSource, reason: impl Into<String>) -> Self {
        SessionError::Device {
            source_kind,
            reason: reason.into(),
        }
    }

    /// Returns the error code value for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SessionError::InvalidOptions(_) => 1,
            SessionError::Connection(_) => 2,
            SessionError::Device { .. } => 3,
            SessionError::NotJoined
            | SessionError::NoLocalTrack(_)
            | SessionError::NotPublisher => 4,
            SessionError::AlreadyJoined(_) => 5,
            SessionError::TransportEvent(_) | SessionError::Internal(_) => 6,
        }
    }

    /// Returns a UI-safe message (no transport internals).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SessionError::InvalidOptions(msg) => msg.clone(),
            SessionError::Connection(_) => "Could not connect to the live class".to_string(),
            SessionError::Device { source_kind, .. } => match source_kind {
                TrackSource::Microphone => "Microphone is unavailable".to_string(),
                TrackSource::Camera => "Camera is unavailable".to_string(),
                TrackSource::Screen => "Screen sharing is unavailable".to_string(),
            },
            SessionError::NotJoined => "You are not in a live class".to_string(),
            SessionError::AlreadyJoined(_) => "You are already in a live class".to_string(),
            SessionError::NotPublisher => "Your role cannot share audio or video".to_string(),
            SessionError::NoLocalTrack(kind) => format!("No local {kind} to control"),
            SessionError::TransportEvent(_) | SessionError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            SessionError::InvalidOptions("room".to_string()).error_code(),
            1
        );
        assert_eq!(
            SessionError::Connection("refused".to_string()).error_code(),
            2
        );
        assert_eq!(
            SessionError::device(TrackSource::Camera, "denied").error_code(),
            3
        );
        assert_eq!(SessionError::NotJoined.error_code(), 4);
        assert_eq!(SessionError::NotPublisher.error_code(), 4);
        assert_eq!(SessionError::NoLocalTrack(MediaKind::Audio).error_code(), 4);
        assert_eq!(
            SessionError::AlreadyJoined("room1".to_string()).error_code(),
            5
        );
        assert_eq!(
            SessionError::TransportEvent("bad".to_string()).error_code(),
            6
        );
        assert_eq!(SessionError::Internal("closed".to_string()).error_code(), 6);
    }

    #[test]
    fn test_client_message_hides_transport_details() {
        let err = SessionError::Connection("token expired: sig=abc123".to_string());
        let msg = err.client_message();
        assert!(!msg.contains("abc123"));
        assert_eq!(msg, "Could not connect to the live class");

        let err = SessionError::device(TrackSource::Screen, "NotAllowedError: permission denied");
        assert_eq!(err.client_message(), "Screen sharing is unavailable");
    }

    #[test]
    fn test_display_includes_context() {
        let err = SessionError::device(TrackSource::Microphone, "no device");
        assert_eq!(err.to_string(), "Device error (microphone): no device");

        let err = SessionError::NoLocalTrack(MediaKind::Video);
        assert_eq!(err.to_string(), "No local video track");
    }
}
