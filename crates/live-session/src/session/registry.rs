//! Track registry.
//!
//! Holds the session's local tracks with their publication state, and the
//! last remote participant list read from the transport. The remote list is
//! only ever replaced wholesale by [`TrackRegistry::resync_remote`].

use crate::transport::{LocalTrack, RemoteUser, TrackSource};
use tokio_util::sync::WaitForCancellationFutureOwned;

#[derive(Debug)]
struct Slot {
    track: LocalTrack,
    published: bool,
}

/// Local and remote track bookkeeping for one session.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    microphone: Option<Slot>,
    camera: Option<Slot>,
    screen: Option<Slot>,
    remote: Vec<RemoteUser>,
}

impl TrackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, source: TrackSource) -> Option<&Slot> {
        match source {
            TrackSource::Microphone => self.microphone.as_ref(),
            TrackSource::Camera => self.camera.as_ref(),
            TrackSource::Screen => self.screen.as_ref(),
        }
    }

    fn slot_mut(&mut self, source: TrackSource) -> &mut Option<Slot> {
        match source {
            TrackSource::Microphone => &mut self.microphone,
            TrackSource::Camera => &mut self.camera,
            TrackSource::Screen => &mut self.screen,
        }
    }

    /// Register a freshly acquired, unpublished track in its source slot.
    ///
    /// Returns the track previously held in that slot, if any.
    pub fn insert(&mut self, track: LocalTrack) -> Option<LocalTrack> {
        let slot = self.slot_mut(track.source());
        slot.replace(Slot {
            track,
            published: false,
        })
        .map(|previous| previous.track)
    }

    /// Remove and return the track for a source.
    pub fn take(&mut self, source: TrackSource) -> Option<LocalTrack> {
        self.slot_mut(source).take().map(|slot| slot.track)
    }

    #[must_use]
    pub fn get(&self, source: TrackSource) -> Option<&LocalTrack> {
        self.slot(source).map(|slot| &slot.track)
    }

    #[must_use]
    pub fn is_published(&self, source: TrackSource) -> bool {
        self.slot(source).is_some_and(|slot| slot.published)
    }

    /// Record publication state for a source. No-op for an empty slot.
    pub fn set_published(&mut self, source: TrackSource, published: bool) {
        if let Some(slot) = self.slot_mut(source) {
            slot.published = published;
        }
    }

    /// Tracks that should be published but are not.
    ///
    /// The camera is excluded while a screen track is held.
    #[must_use]
    pub fn unpublished(&self) -> Vec<LocalTrack> {
        let mut pending = Vec::new();
        if let Some(slot) = self.microphone.as_ref().filter(|s| !s.published) {
            pending.push(slot.track.clone());
        }
        if self.screen.is_none() {
            if let Some(slot) = self.camera.as_ref().filter(|s| !s.published) {
                pending.push(slot.track.clone());
            }
        }
        pending
    }

    /// Remove every local track, returning them for release.
    pub fn drain_local(&mut self) -> Vec<LocalTrack> {
        [
            self.screen.take(),
            self.camera.take(),
            self.microphone.take(),
        ]
        .into_iter()
        .flatten()
        .map(|slot| slot.track)
        .collect()
    }

    #[must_use]
    pub fn has_local_tracks(&self) -> bool {
        self.microphone.is_some() || self.camera.is_some() || self.screen.is_some()
    }

    #[must_use]
    pub fn is_screen_sharing(&self) -> bool {
        self.is_published(TrackSource::Screen)
    }

    /// Future resolving when the held screen track ends externally.
    #[must_use]
    pub fn screen_ended(&self) -> Option<WaitForCancellationFutureOwned> {
        self.screen.as_ref().map(|slot| slot.track.ended())
    }

    /// Replace the remote list with the transport's authoritative list.
    pub fn resync_remote(&mut self, users: Vec<RemoteUser>) {
        self.remote = users;
    }

    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    #[must_use]
    pub fn remote(&self) -> &[RemoteUser] {
        &self.remote
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::identity::CallerId;
    use crate::transport::TrackId;

    fn track(id: &str, source: TrackSource) -> LocalTrack {
        LocalTrack::new(TrackId::new(id), source)
    }

    #[test]
    fn test_insert_and_publish() {
        let mut registry = TrackRegistry::new();
        assert!(!registry.has_local_tracks());

        registry.insert(track("mic", TrackSource::Microphone));
        registry.insert(track("cam", TrackSource::Camera));
        assert_eq!(registry.unpublished().len(), 2);

        registry.set_published(TrackSource::Microphone, true);
        let pending = registry.unpublished();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source(), TrackSource::Camera);
        assert!(registry.is_published(TrackSource::Microphone));
    }

    #[test]
    fn test_camera_not_pending_while_screen_held() {
        let mut registry = TrackRegistry::new();
        registry.insert(track("cam", TrackSource::Camera));
        registry.insert(track("screen", TrackSource::Screen));
        assert!(registry.unpublished().is_empty());
        assert!(!registry.is_screen_sharing());

        registry.set_published(TrackSource::Screen, true);
        assert!(registry.is_screen_sharing());
        assert!(registry.screen_ended().is_some());
    }

    #[test]
    fn test_set_published_on_empty_slot_is_noop() {
        let mut registry = TrackRegistry::new();
        registry.set_published(TrackSource::Camera, true);
        assert!(!registry.is_published(TrackSource::Camera));
    }

    #[test]
    fn test_drain_local_empties_registry() {
        let mut registry = TrackRegistry::new();
        registry.insert(track("mic", TrackSource::Microphone));
        registry.insert(track("cam", TrackSource::Camera));
        registry.insert(track("screen", TrackSource::Screen));

        let drained = registry.drain_local();
        assert_eq!(drained.len(), 3);
        assert!(!registry.has_local_tracks());
        assert!(registry.drain_local().is_empty());
    }

    #[test]
    fn test_insert_returns_previous() {
        let mut registry = TrackRegistry::new();
        assert!(registry.insert(track("cam-1", TrackSource::Camera)).is_none());
        let previous = registry.insert(track("cam-2", TrackSource::Camera));
        assert_eq!(previous.unwrap().id().as_str(), "cam-1");
    }

    #[test]
    fn test_resync_replaces_remote_list() {
        let mut registry = TrackRegistry::new();
        registry.resync_remote(vec![
            RemoteUser::new(CallerId::Numeric(1)),
            RemoteUser::new(CallerId::Numeric(2)),
        ]);
        assert_eq!(registry.remote().len(), 2);

        registry.resync_remote(vec![RemoteUser::new(CallerId::Numeric(2))]);
        assert_eq!(registry.remote().len(), 1);
        assert_eq!(registry.remote()[0].uid, CallerId::Numeric(2));

        registry.clear_remote();
        assert!(registry.remote().is_empty());
    }
}
