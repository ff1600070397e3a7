//! In-memory RTC transport for session testing.
//!
//! Records every call the session makes, hands out real `LocalTrack` handles,
//! and lets tests drive remote participant events and device failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use live_session_test_utils::MockTransport;
//!
//! let transport = MockTransport::builder()
//!     .deny_camera()
//!     .fail_screen_publish()
//!     .build();
//!
//! // Drive a remote participant
//! transport.add_remote_user(CallerId::Numeric(7));
//! transport.publish_remote(&CallerId::Numeric(7), MediaKind::Video);
//! ```

use async_trait::async_trait;
use live_session::identity::CallerId;
use live_session::transport::{
    JoinedRoom, LocalTrack, MediaKind, RemoteTrack, RemoteUser, TrackId, TrackSource, Transport,
    TransportError, TransportEvent,
};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

/// Event channel capacity for a joined mock room.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Join { room: String, uid: CallerId },
    Leave,
    CreateTrack(TrackSource),
    Publish(Vec<TrackSource>),
    Unpublish(Vec<TrackSource>),
    SetEnabled(TrackSource, bool),
    CloseTrack(TrackSource),
    Subscribe(CallerId, MediaKind),
    PlayVideo { target: String },
    PlayAudio(CallerId),
}

/// Mock transport. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MockTransport {
    behavior: Arc<MockBehavior>,
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockBehavior {
    reject_join: bool,
    expected_credential: Option<String>,
    deny_microphone: bool,
    deny_camera: bool,
    deny_screen: bool,
    /// Camera acquisition waits for a permit (an open permission prompt).
    camera_gate: Option<Semaphore>,
    /// Publish calls are recorded, then wait for a permit before applying.
    publish_gate: Option<Semaphore>,
    fail_publish: bool,
    fail_screen_publish: bool,
    fail_subscribe: bool,
    fail_leave: bool,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    calls: Vec<TransportCall>,
    joined: bool,
    events: Option<mpsc::Sender<TransportEvent>>,
    remote: Vec<RemoteUser>,
    created: Vec<LocalTrack>,
    published: Vec<LocalTrack>,
    peak_published_video: usize,
    close_counts: HashMap<TrackId, usize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransportBuilder::default().build()
    }
}

impl MockTransport {
    /// Create a new MockTransport builder.
    #[must_use]
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockTransportInner> {
        self.inner.lock().expect("mock transport lock poisoned")
    }

    fn record(&self, call: TransportCall) {
        self.lock().calls.push(call);
    }

    fn create_track(&self, source: TrackSource, deny: bool) -> Result<LocalTrack, TransportError> {
        self.record(TransportCall::CreateTrack(source));
        self.mint_track(source, deny)
    }

    fn mint_track(&self, source: TrackSource, deny: bool) -> Result<LocalTrack, TransportError> {
        let mut inner = self.lock();
        if deny {
            return Err(TransportError::DeviceUnavailable(format!(
                "{source} permission denied"
            )));
        }
        let track = LocalTrack::new(TrackId::new(format!("{source}-{}", Uuid::new_v4())), source);
        inner.created.push(track.clone());
        Ok(track)
    }

    fn emit(&self, event: TransportEvent) {
        let sender = self.lock().events.clone();
        if let Some(sender) = sender {
            sender
                .try_send(event)
                .expect("mock transport event channel full or closed");
        }
    }

    // ------------------------------------------------------------------
    // Gates
    // ------------------------------------------------------------------

    /// Let `n` gated camera acquisitions complete.
    pub fn release_camera(&self, n: usize) {
        if let Some(gate) = &self.behavior.camera_gate {
            gate.add_permits(n);
        }
    }

    /// Let `n` gated publish calls complete.
    pub fn release_publish(&self, n: usize) {
        if let Some(gate) = &self.behavior.publish_gate {
            gate.add_permits(n);
        }
    }

    // ------------------------------------------------------------------
    // Remote participant simulation
    // ------------------------------------------------------------------

    /// Add a remote participant and deliver `user-joined`.
    pub fn add_remote_user(&self, uid: CallerId) {
        self.lock().remote.push(RemoteUser::new(uid.clone()));
        self.emit(TransportEvent::UserJoined { uid });
    }

    /// Remove a remote participant and deliver `user-left`.
    pub fn remove_remote_user(&self, uid: &CallerId) {
        self.lock().remote.retain(|u| &u.uid != uid);
        self.emit(TransportEvent::UserLeft { uid: uid.clone() });
    }

    /// Give a remote participant a track of `kind` and deliver `user-published`.
    pub fn publish_remote(&self, uid: &CallerId, kind: MediaKind) {
        {
            let mut inner = self.lock();
            if let Some(user) = inner.remote.iter_mut().find(|u| &u.uid == uid) {
                let track = Some(remote_track(uid, kind));
                match kind {
                    MediaKind::Audio => user.audio_track = track,
                    MediaKind::Video => user.video_track = track,
                }
            }
        }
        self.emit(TransportEvent::UserPublished {
            uid: uid.clone(),
            kind,
        });
    }

    /// Remove a remote participant's track and deliver `user-unpublished`.
    pub fn unpublish_remote(&self, uid: &CallerId, kind: MediaKind) {
        {
            let mut inner = self.lock();
            if let Some(user) = inner.remote.iter_mut().find(|u| &u.uid == uid) {
                match kind {
                    MediaKind::Audio => user.audio_track = None,
                    MediaKind::Video => user.video_track = None,
                }
            }
        }
        self.emit(TransportEvent::UserUnpublished {
            uid: uid.clone(),
            kind,
        });
    }

    /// Drop the event sender, ending the session's event stream.
    pub fn close_event_stream(&self) {
        self.lock().events = None;
    }

    /// Simulate the OS-level "stop sharing" control on the latest screen track.
    ///
    /// Returns false if no screen track was ever created.
    pub fn end_screen_share(&self) -> bool {
        let screen = self
            .lock()
            .created
            .iter()
            .rev()
            .find(|t| t.source() == TrackSource::Screen)
            .cloned();
        match screen {
            Some(track) => {
                track.end();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.lock().joined
    }

    /// Every local track handed out, including ones later closed.
    #[must_use]
    pub fn created_tracks(&self) -> Vec<LocalTrack> {
        self.lock().created.clone()
    }

    /// Created tracks for one source.
    #[must_use]
    pub fn created_for(&self, source: TrackSource) -> Vec<LocalTrack> {
        self.lock()
            .created
            .iter()
            .filter(|t| t.source() == source)
            .cloned()
            .collect()
    }

    /// Sources of the currently published local tracks.
    #[must_use]
    pub fn published_sources(&self) -> Vec<TrackSource> {
        self.lock().published.iter().map(LocalTrack::source).collect()
    }

    /// Most video tracks (camera or screen) ever published at the same time.
    #[must_use]
    pub fn peak_published_video(&self) -> usize {
        self.lock().peak_published_video
    }

    /// Times `close_track` was called for a track.
    #[must_use]
    pub fn close_count(&self, id: &TrackId) -> usize {
        self.lock().close_counts.get(id).copied().unwrap_or(0)
    }

    /// Render targets passed to `play_video`, in order.
    #[must_use]
    pub fn video_targets(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::PlayVideo { target } => Some(target.clone()),
                _ => None,
            })
            .collect()
    }
}

async fn pass_gate(gate: Option<&Semaphore>) {
    if let Some(gate) = gate {
        gate.acquire()
            .await
            .expect("mock transport gate closed")
            .forget();
    }
}

fn remote_track(uid: &CallerId, kind: MediaKind) -> RemoteTrack {
    RemoteTrack {
        id: TrackId::new(format!("remote-{kind}-{uid}")),
        kind,
        owner: uid.clone(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn join(
        &self,
        room: &str,
        credential: &SecretString,
        uid: &CallerId,
    ) -> Result<JoinedRoom, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(TransportCall::Join {
            room: room.to_string(),
            uid: uid.clone(),
        });

        if self.behavior.reject_join {
            return Err(TransportError::JoinRejected("room unavailable".to_string()));
        }
        if let Some(expected) = &self.behavior.expected_credential {
            if credential.expose_secret() != expected {
                return Err(TransportError::JoinRejected("invalid token".to_string()));
            }
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        inner.events = Some(tx);
        inner.joined = true;

        Ok(JoinedRoom {
            uid: uid.clone(),
            events: rx,
        })
    }

    async fn leave(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.calls.push(TransportCall::Leave);
        inner.events = None;
        inner.joined = false;
        inner.remote.clear();
        inner.published.clear();
        if self.behavior.fail_leave {
            return Err(TransportError::Network("leave timed out".to_string()));
        }
        Ok(())
    }

    async fn create_microphone_track(&self) -> Result<LocalTrack, TransportError> {
        self.create_track(TrackSource::Microphone, self.behavior.deny_microphone)
    }

    async fn create_camera_track(&self) -> Result<LocalTrack, TransportError> {
        self.record(TransportCall::CreateTrack(TrackSource::Camera));
        pass_gate(self.behavior.camera_gate.as_ref()).await;
        self.mint_track(TrackSource::Camera, self.behavior.deny_camera)
    }

    async fn create_screen_track(&self) -> Result<LocalTrack, TransportError> {
        self.create_track(TrackSource::Screen, self.behavior.deny_screen)
    }

    async fn publish(&self, tracks: &[LocalTrack]) -> Result<(), TransportError> {
        self.record(TransportCall::Publish(
            tracks.iter().map(LocalTrack::source).collect(),
        ));
        pass_gate(self.behavior.publish_gate.as_ref()).await;

        let mut inner = self.lock();
        let has_screen = tracks.iter().any(|t| t.source() == TrackSource::Screen);
        if self.behavior.fail_publish || (has_screen && self.behavior.fail_screen_publish) {
            return Err(TransportError::Publish("publish rejected".to_string()));
        }
        for track in tracks {
            if !inner.published.iter().any(|p| p.same_track(track)) {
                inner.published.push(track.clone());
            }
        }
        let video = inner
            .published
            .iter()
            .filter(|t| t.kind() == MediaKind::Video)
            .count();
        inner.peak_published_video = inner.peak_published_video.max(video);
        Ok(())
    }

    async fn unpublish(&self, tracks: &[LocalTrack]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(TransportCall::Unpublish(tracks.iter().map(LocalTrack::source).collect()));
        inner
            .published
            .retain(|p| !tracks.iter().any(|t| t.same_track(p)));
        Ok(())
    }

    async fn set_track_enabled(
        &self,
        track: &LocalTrack,
        enabled: bool,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::SetEnabled(track.source(), enabled));
        Ok(())
    }

    async fn close_track(&self, track: &LocalTrack) {
        let mut inner = self.lock();
        inner.calls.push(TransportCall::CloseTrack(track.source()));
        *inner.close_counts.entry(track.id().clone()).or_insert(0) += 1;
        inner.published.retain(|p| !p.same_track(track));
    }

    async fn subscribe(
        &self,
        uid: &CallerId,
        kind: MediaKind,
    ) -> Result<RemoteTrack, TransportError> {
        self.record(TransportCall::Subscribe(uid.clone(), kind));
        if self.behavior.fail_subscribe {
            return Err(TransportError::Subscribe(format!("{kind} not available")));
        }
        Ok(remote_track(uid, kind))
    }

    async fn play_video(&self, _track: &RemoteTrack, target: &str) -> Result<(), TransportError> {
        self.record(TransportCall::PlayVideo {
            target: target.to_string(),
        });
        Ok(())
    }

    async fn play_audio(&self, track: &RemoteTrack) -> Result<(), TransportError> {
        self.record(TransportCall::PlayAudio(track.owner.clone()));
        Ok(())
    }

    fn remote_users(&self) -> Vec<RemoteUser> {
        self.lock().remote.clone()
    }
}

/// Builder for MockTransport configuration.
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    behavior: MockBehavior,
    initial_remote: Vec<RemoteUser>,
}

impl MockTransportBuilder {
    /// Reject every join attempt.
    #[must_use]
    pub fn reject_join(mut self) -> Self {
        self.behavior.reject_join = true;
        self
    }

    /// Reject joins whose credential differs from `credential`.
    #[must_use]
    pub fn expect_credential(mut self, credential: impl Into<String>) -> Self {
        self.behavior.expected_credential = Some(credential.into());
        self
    }

    #[must_use]
    pub fn deny_microphone(mut self) -> Self {
        self.behavior.deny_microphone = true;
        self
    }

    #[must_use]
    pub fn deny_camera(mut self) -> Self {
        self.behavior.deny_camera = true;
        self
    }

    #[must_use]
    pub fn deny_screen(mut self) -> Self {
        self.behavior.deny_screen = true;
        self
    }

    /// Camera acquisition waits until [`MockTransport::release_camera`]
    /// (a permission prompt left open until then).
    #[must_use]
    pub fn gate_camera(mut self) -> Self {
        self.behavior.camera_gate = Some(Semaphore::new(0));
        self
    }

    /// Publish calls are recorded immediately but only take effect after
    /// [`MockTransport::release_publish`].
    #[must_use]
    pub fn gate_publish(mut self) -> Self {
        self.behavior.publish_gate = Some(Semaphore::new(0));
        self
    }

    /// Fail every publish call.
    #[must_use]
    pub fn fail_publish(mut self) -> Self {
        self.behavior.fail_publish = true;
        self
    }

    /// Fail publish calls that include a screen track.
    #[must_use]
    pub fn fail_screen_publish(mut self) -> Self {
        self.behavior.fail_screen_publish = true;
        self
    }

    #[must_use]
    pub fn fail_subscribe(mut self) -> Self {
        self.behavior.fail_subscribe = true;
        self
    }

    /// Leave clears transport state but reports a network error.
    #[must_use]
    pub fn fail_leave(mut self) -> Self {
        self.behavior.fail_leave = true;
        self
    }

    /// Participants already in the room at join time.
    #[must_use]
    pub fn with_remote_user(mut self, uid: CallerId) -> Self {
        self.initial_remote.push(RemoteUser::new(uid));
        self
    }

    /// Build the MockTransport.
    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport {
            behavior: Arc::new(self.behavior),
            inner: Arc::new(Mutex::new(MockTransportInner {
                remote: self.initial_remote,
                ..MockTransportInner::default()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_opens_event_stream() {
        let transport = MockTransport::default();
        let mut joined = transport
            .join("room1", &SecretString::from("token"), &CallerId::Numeric(42))
            .await
            .unwrap();
        assert_eq!(joined.uid, CallerId::Numeric(42));
        assert!(transport.is_joined());

        transport.add_remote_user(CallerId::Numeric(7));
        let event = joined.events.recv().await.unwrap();
        assert_eq!(event.name(), "user-joined");
        assert_eq!(transport.remote_users().len(), 1);

        transport.leave().await.unwrap();
        assert!(joined.events.recv().await.is_none());
        assert!(transport.remote_users().is_empty());
    }

    #[tokio::test]
    async fn test_expected_credential() {
        let transport = MockTransport::builder().expect_credential("good").build();
        let result = transport
            .join("room1", &SecretString::from("bad"), &CallerId::Numeric(1))
            .await;
        assert!(matches!(result, Err(TransportError::JoinRejected(_))));
        assert!(!transport.is_joined());
    }

    #[tokio::test]
    async fn test_close_counts_and_publish_set() {
        let transport = MockTransport::default();
        let mic = transport.create_microphone_track().await.unwrap();
        let cam = transport.create_camera_track().await.unwrap();
        transport.publish(&[mic.clone(), cam.clone()]).await.unwrap();
        assert_eq!(
            transport.published_sources(),
            vec![TrackSource::Microphone, TrackSource::Camera]
        );

        transport.close_track(&mic).await;
        assert_eq!(transport.close_count(mic.id()), 1);
        assert_eq!(transport.close_count(cam.id()), 0);
        assert_eq!(transport.published_sources(), vec![TrackSource::Camera]);
    }

    #[tokio::test]
    async fn test_gated_camera_waits_for_release() {
        let transport = MockTransport::builder().gate_camera().build();
        let pending = tokio::spawn({
            let transport = transport.clone();
            async move { transport.create_camera_track().await }
        });
        while transport.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.calls(), vec![TransportCall::CreateTrack(TrackSource::Camera)]);
        assert!(transport.created_tracks().is_empty());

        transport.release_camera(1);
        let track = pending.await.unwrap().unwrap();
        let created = transport.created_for(TrackSource::Camera);
        assert_eq!(created.len(), 1);
        assert!(created[0].same_track(&track));
    }

    #[tokio::test]
    async fn test_denied_device() {
        let transport = MockTransport::builder().deny_screen().build();
        let result = transport.create_screen_track().await;
        assert!(matches!(result, Err(TransportError::DeviceUnavailable(_))));
        assert!(!transport.end_screen_share());
    }
}
