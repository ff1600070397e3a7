//! Local and remote track handles.

use super::{MediaKind, TrackSource};
use crate::identity::CallerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Opaque track identifier assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a local capture track.
///
/// Clones share state. The enabled flag mirrors what the transport last
/// confirmed; the closed flag guards against double release; the ended signal
/// fires when the device stops outside the session's control (for example the
/// OS "stop sharing" button).
#[derive(Clone)]
pub struct LocalTrack {
    id: TrackId,
    source: TrackSource,
    inner: Arc<LocalTrackState>,
}

struct LocalTrackState {
    enabled: AtomicBool,
    closed: AtomicBool,
    ended: CancellationToken,
}

impl LocalTrack {
    /// Create a new, enabled, open track.
    #[must_use]
    pub fn new(id: TrackId, source: TrackSource) -> Self {
        Self {
            id,
            source,
            inner: Arc::new(LocalTrackState {
                enabled: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                ended: CancellationToken::new(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    #[must_use]
    pub fn source(&self) -> TrackSource {
        self.source
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.source.kind()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Record the enabled state confirmed by the transport.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Mark the track closed. Returns `true` only for the call that performed
    /// the transition, so the caller releases the device exactly once.
    pub fn mark_closed(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }

    /// Signal that the device stopped externally.
    pub fn end(&self) {
        self.inner.ended.cancel();
    }

    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.inner.ended.is_cancelled()
    }

    /// Future resolving once [`LocalTrack::end`] has been called.
    #[must_use]
    pub fn ended(&self) -> WaitForCancellationFutureOwned {
        self.inner.ended.clone().cancelled_owned()
    }

    /// Whether two handles refer to the same underlying track.
    #[must_use]
    pub fn same_track(&self, other: &LocalTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("enabled", &self.is_enabled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle to a subscribed remote track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: TrackId,
    pub kind: MediaKind,
    pub owner: CallerId,
}

/// Remote participant as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub uid: CallerId,
    pub audio_track: Option<RemoteTrack>,
    pub video_track: Option<RemoteTrack>,
}

impl RemoteUser {
    /// A participant with no subscribed tracks.
    #[must_use]
    pub fn new(uid: CallerId) -> Self {
        Self {
            uid,
            audio_track: None,
            video_track: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_mark_closed_once() {
        let track = LocalTrack::new(TrackId::new("mic-1"), TrackSource::Microphone);
        assert!(!track.is_closed());
        assert!(track.mark_closed());
        assert!(!track.mark_closed());

        // Clones share the flag
        let clone = track.clone();
        assert!(clone.is_closed());
        assert!(!clone.mark_closed());
    }

    #[test]
    fn test_enabled_mirror() {
        let track = LocalTrack::new(TrackId::new("cam-1"), TrackSource::Camera);
        assert!(track.is_enabled());
        track.set_enabled(false);
        assert!(!track.clone().is_enabled());
        assert_eq!(track.kind(), MediaKind::Video);
    }

    #[test]
    fn test_same_track() {
        let a = LocalTrack::new(TrackId::new("cam-1"), TrackSource::Camera);
        let b = LocalTrack::new(TrackId::new("cam-1"), TrackSource::Camera);
        assert!(a.same_track(&a.clone()));
        assert!(!a.same_track(&b));
    }

    #[tokio::test]
    async fn test_ended_resolves_after_end() {
        let track = LocalTrack::new(TrackId::new("screen-1"), TrackSource::Screen);
        let ended = track.ended();
        assert!(!track.has_ended());

        track.end();
        tokio::time::timeout(Duration::from_millis(100), ended)
            .await
            .expect("ended future should resolve");
        assert!(track.has_ended());
    }
}
