//! Live-class session client.
//!
//! Drives one learner's or tutor's participation in a live class over a
//! vendor real-time-communication transport:
//!
//! - Join/leave lifecycle with guaranteed release of camera, microphone and
//!   screen-capture tracks
//! - Publication of local media for the publisher role
//! - Audio, video and screen-share toggles
//! - A remote participant view resynchronized from the transport after every
//!   event
//!
//! # Architecture
//!
//! Each session is an actor: a single tokio task owns the transport handle and
//! all track state, and serves requests from a bounded mailbox one at a time.
//! UI collaborators hold a cloneable [`SessionHandle`] and observe state
//! through a `watch` channel of [`SessionSnapshot`]s.
//!
//! ```rust,ignore
//! use live_session::{JoinOptions, Role, SessionActor, SessionConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let (session, _task) =
//!     SessionActor::spawn(transport, SessionConfig::default(), CancellationToken::new());
//! session.join(JoinOptions::new("room1", "42", token, Role::Publisher)).await?;
//! session.toggle_screen_share().await?;
//! session.leave().await?;
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with UI-safe messages
//! - [`identity`] - Caller identity normalization and join options
//! - [`observability`] - Tracing setup and metrics
//! - [`session`] - Session actor, event dispatch, track registry
//! - [`transport`] - The RTC transport seam and track handles

pub mod config;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use errors::SessionError;
pub use identity::{CallerId, JoinOptions, Role};
pub use session::{SessionActor, SessionHandle, SessionSnapshot};
pub use transport::{
    JoinedRoom, LocalTrack, MediaKind, RemoteTrack, RemoteUser, TrackId, TrackSource, Transport,
    TransportError, TransportEvent,
};
