//! RTC transport seam.
//!
//! The vendor real-time-communication client does all signaling, media
//! transport and encoding. This module defines the capability the session
//! consumes from it and nothing more.
//!
//! # Ownership
//!
//! - The transport owns the authoritative remote participant list; the session
//!   only ever reads it through [`Transport::remote_users`].
//! - Local tracks are created by the transport but owned by the session, which
//!   guarantees [`Transport::close_track`] is called at most once per track.
//! - The event receiver returned from [`Transport::join`] is the session's
//!   subscription; dropping it unsubscribes.

pub mod track;

pub use track::{LocalTrack, RemoteTrack, RemoteUser, TrackId};

use crate::identity::CallerId;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Returns the kind as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture device behind a local track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    /// Media kind produced by this source.
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        match self {
            TrackSource::Microphone => MediaKind::Audio,
            TrackSource::Camera | TrackSource::Screen => MediaKind::Video,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Microphone => "microphone",
            TrackSource::Camera => "camera",
            TrackSource::Screen => "screen",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote participant events delivered between join and leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    UserJoined { uid: CallerId },
    UserLeft { uid: CallerId },
    UserPublished { uid: CallerId, kind: MediaKind },
    UserUnpublished { uid: CallerId, kind: MediaKind },
}

impl TransportEvent {
    /// Event name for logs and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            TransportEvent::UserJoined { .. } => "user-joined",
            TransportEvent::UserLeft { .. } => "user-left",
            TransportEvent::UserPublished { .. } => "user-published",
            TransportEvent::UserUnpublished { .. } => "user-unpublished",
        }
    }

    /// Remote caller the event refers to.
    #[must_use]
    pub fn uid(&self) -> &CallerId {
        match self {
            TransportEvent::UserJoined { uid }
            | TransportEvent::UserLeft { uid }
            | TransportEvent::UserPublished { uid, .. }
            | TransportEvent::UserUnpublished { uid, .. } => uid,
        }
    }
}

/// Result of a successful transport join.
#[derive(Debug)]
pub struct JoinedRoom {
    /// Uid the transport assigned (equal to the requested one when given).
    pub uid: CallerId,
    /// Remote participant events for this room.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Errors reported by transport implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Join rejected (bad credential, room full, network failure).
    #[error("join rejected: {0}")]
    JoinRejected(String),

    /// Device permission denied or device missing.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Publish or unpublish failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Subscribe to a remote track failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Playback or render-target attachment failed.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Network-level failure outside of join.
    #[error("network error: {0}")]
    Network(String),
}

/// Capability consumed from the vendor RTC client.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Join a room. The returned receiver carries remote participant events
    /// until [`Transport::leave`] completes or the receiver is dropped.
    async fn join(
        &self,
        room: &str,
        credential: &SecretString,
        uid: &CallerId,
    ) -> Result<JoinedRoom, TransportError>;

    /// Leave the current room.
    async fn leave(&self) -> Result<(), TransportError>;

    /// Acquire the microphone. May wait indefinitely on a permission prompt.
    ///
    /// The session drives every `create_*` future to completion on its own
    /// task, even when the transition that asked for it is abandoned, and
    /// closes a track it no longer needs. Implementations therefore never see
    /// these futures dropped mid-acquisition and need no cancel handling.
    async fn create_microphone_track(&self) -> Result<LocalTrack, TransportError>;

    async fn create_camera_track(&self) -> Result<LocalTrack, TransportError>;

    async fn create_screen_track(&self) -> Result<LocalTrack, TransportError>;

    async fn publish(&self, tracks: &[LocalTrack]) -> Result<(), TransportError>;

    async fn unpublish(&self, tracks: &[LocalTrack]) -> Result<(), TransportError>;

    /// Enable or disable a local track without unpublishing it.
    async fn set_track_enabled(
        &self,
        track: &LocalTrack,
        enabled: bool,
    ) -> Result<(), TransportError>;

    /// Release the device behind a local track.
    async fn close_track(&self, track: &LocalTrack);

    /// Subscribe to a remote participant's media of the given kind.
    async fn subscribe(
        &self,
        uid: &CallerId,
        kind: MediaKind,
    ) -> Result<RemoteTrack, TransportError>;

    /// Attach a remote video track to a named render target.
    async fn play_video(&self, track: &RemoteTrack, target: &str) -> Result<(), TransportError>;

    /// Start playback of a remote audio track.
    async fn play_audio(&self, track: &RemoteTrack) -> Result<(), TransportError>;

    /// Authoritative remote participant list at this instant.
    fn remote_users(&self) -> Vec<RemoteUser>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind() {
        assert_eq!(TrackSource::Microphone.kind(), MediaKind::Audio);
        assert_eq!(TrackSource::Camera.kind(), MediaKind::Video);
        assert_eq!(TrackSource::Screen.kind(), MediaKind::Video);
    }

    #[test]
    fn test_event_names_and_uid() {
        let event = TransportEvent::UserPublished {
            uid: CallerId::Numeric(7),
            kind: MediaKind::Video,
        };
        assert_eq!(event.name(), "user-published");
        assert_eq!(event.uid(), &CallerId::Numeric(7));

        let event = TransportEvent::UserLeft {
            uid: CallerId::Named("tutor".to_string()),
        };
        assert_eq!(event.name(), "user-left");
    }
}
