//! Message types for the session actor.
//!
//! Every state transition is a request on the actor mailbox with a
//! `tokio::sync::oneshot` reply, so transitions never overlap.

use crate::errors::SessionError;
use crate::identity::{CallerId, JoinOptions, Role};
use crate::transport::RemoteUser;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// Requests sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Join a room and, for publishers, publish microphone and camera.
    Join {
        options: JoinOptions,
        respond_to: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },

    /// Release local tracks and leave the room.
    Leave {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Acquire and publish whichever local tracks are missing or unpublished.
    PublishLocalTracks {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Flip the local microphone's enabled flag. Replies with the new flag.
    ToggleAudio {
        respond_to: oneshot::Sender<Result<bool, SessionError>>,
    },

    /// Flip the local camera's enabled flag. Replies with the new flag.
    ToggleVideo {
        respond_to: oneshot::Sender<Result<bool, SessionError>>,
    },

    /// Swap between camera and screen capture. Replies with the new sharing state.
    ToggleScreenShare {
        respond_to: oneshot::Sender<Result<bool, SessionError>>,
    },
}

impl SessionMessage {
    /// Operation name for logs and metric labels.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            SessionMessage::Join { .. } => "join",
            SessionMessage::Leave { .. } => "leave",
            SessionMessage::PublishLocalTracks { .. } => "publish",
            SessionMessage::ToggleAudio { .. } => "toggle_audio",
            SessionMessage::ToggleVideo { .. } => "toggle_video",
            SessionMessage::ToggleScreenShare { .. } => "toggle_screen_share",
        }
    }
}

/// Read-only session state exposed to UI collaborators.
///
/// Published once at the end of each transition, never mid-way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub room: Option<String>,
    pub uid: Option<CallerId>,
    pub role: Option<Role>,
    pub joined_at: Option<DateTime<Utc>>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub audio_published: bool,
    /// Camera track published (false while screen sharing).
    pub video_published: bool,
    pub screen_sharing: bool,
    pub remote_users: Vec<RemoteUser>,
}

impl SessionSnapshot {
    /// Look up a remote participant by uid.
    #[must_use]
    pub fn remote_user(&self, uid: &CallerId) -> Option<&RemoteUser> {
        self.remote_users.iter().find(|u| &u.uid == uid)
    }
}
