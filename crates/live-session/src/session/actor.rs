//! `SessionActor` - owns one live-class session (connection, local tracks,
//! remote participant view) and applies state transitions one at a time.
//!
//! # Lifecycle
//!
//! 1. Created with [`SessionActor::spawn`] when the live-class view mounts
//! 2. Serves join/leave/toggle requests from its mailbox in order
//! 3. Torn down on [`SessionHandle::shutdown`] or when every handle is dropped;
//!    teardown interrupts an in-flight transition, releases every track
//!    acquired so far, and leaves the room
//!
//! # Preemption
//!
//! [`SessionHandle::leave`] does not wait behind a stuck transition (a join
//! blocked on a device prompt, say). It cancels the current preemption token
//! before queueing, so the in-flight transition and anything queued ahead of
//! the leave are abandoned; their callers get `SessionError::Internal`. The
//! actor installs a fresh token once the leave has been served.
//!
//! Device acquisitions run on their own task. A device the transport hands out
//! after its transition was abandoned is still closed.
//!
//! # Screen Share
//!
//! ```text
//! NOT_SHARING --toggle--> acquire screen, unpublish camera, publish screen --> SHARING
//! SHARING --toggle / track ended--> unpublish + close screen, republish camera --> NOT_SHARING
//! ```

use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::identity::{CallerId, JoinOptions, Role};
use crate::observability::metrics;
use crate::transport::{LocalTrack, TrackSource, Transport, TransportError, TransportEvent};

use super::mailbox::MailboxMonitor;
use super::messages::{SessionMessage, SessionSnapshot};
use super::registry::TrackRegistry;

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, error, info, instrument, warn};

/// Handle to a `SessionActor`.
///
/// Cloneable; every clone drives the same session.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    preempt: Arc<Mutex<CancellationToken>>,
    mailbox: Arc<MailboxMonitor>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(build(tx)).await {
            self.mailbox.record_drop();
            return Err(SessionError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))?
    }

    /// Join a room. Publishers also acquire and publish microphone and camera.
    ///
    /// # Errors
    ///
    /// - `InvalidOptions` if the room or credential is empty
    /// - `AlreadyJoined` if the session is connected
    /// - `Connection` if the transport rejects the join (state stays disconnected)
    /// - `Device` if track acquisition or publish fails (session stays joined)
    pub async fn join(&self, options: JoinOptions) -> Result<SessionSnapshot, SessionError> {
        self.request(|respond_to| SessionMessage::Join {
            options,
            respond_to,
        })
        .await
    }

    /// Leave the room. A no-op when not joined.
    ///
    /// Preempts the in-flight transition and any request queued before this one.
    pub async fn leave(&self) -> Result<(), SessionError> {
        lock_preempt(&self.preempt).cancel();
        self.request(|respond_to| SessionMessage::Leave { respond_to })
            .await
    }

    /// Retry acquisition and publication of missing local tracks.
    pub async fn publish_local_tracks(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::PublishLocalTracks { respond_to })
            .await
    }

    /// Flip the microphone's enabled flag. Returns the new flag.
    pub async fn toggle_audio(&self) -> Result<bool, SessionError> {
        self.request(|respond_to| SessionMessage::ToggleAudio { respond_to })
            .await
    }

    /// Flip the camera's enabled flag. Returns the new flag.
    pub async fn toggle_video(&self) -> Result<bool, SessionError> {
        self.request(|respond_to| SessionMessage::ToggleVideo { respond_to })
            .await
    }

    /// Start or stop screen sharing. Returns whether the session is now sharing.
    pub async fn toggle_screen_share(&self) -> Result<bool, SessionError> {
        self.request(|respond_to| SessionMessage::ToggleScreenShare { respond_to })
            .await
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified after every completed transition or dispatched event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Tear the session down (unmount). Idempotent.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }
}

/// Connection state, present only between a successful join and leave.
pub(super) struct Connection {
    pub(super) room: String,
    pub(super) uid: CallerId,
    pub(super) role: Role,
    pub(super) joined_at: DateTime<Utc>,
    /// Remote participant events; `None` once the transport closes the stream.
    pub(super) events: Option<mpsc::Receiver<TransportEvent>>,
    /// Cancels deferred video attachments on leave.
    pub(super) attach_token: CancellationToken,
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    pub(super) transport: Arc<dyn Transport>,
    pub(super) config: SessionConfig,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    /// Cancelled by `SessionHandle::leave`; replaced after the leave is served.
    preempt: Arc<Mutex<CancellationToken>>,
    pub(super) connection: Option<Connection>,
    pub(super) tracks: TrackRegistry,
    /// Device acquisition in progress, kept so an abandoned result is closed.
    acquiring: Option<JoinHandle<Result<LocalTrack, TransportError>>>,
    state_tx: watch::Sender<SessionSnapshot>,
    mailbox: Arc<MailboxMonitor>,
}

impl SessionActor {
    /// Spawn a new session actor.
    ///
    /// Returns a handle and the task join handle.
    ///
    /// # Arguments
    ///
    /// * `transport` - RTC transport this session exclusively drives
    /// * `config` - Session configuration
    /// * `cancel_token` - Teardown token (cancel on unmount)
    pub fn spawn(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.mailbox_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::default());
        let mailbox = Arc::new(MailboxMonitor::new(config.mailbox_capacity));
        let preempt = Arc::new(Mutex::new(CancellationToken::new()));

        let actor = Self {
            transport,
            config,
            receiver,
            cancel_token: cancel_token.clone(),
            preempt: Arc::clone(&preempt),
            connection: None,
            tracks: TrackRegistry::new(),
            acquiring: None,
            state_tx,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            cancel_token,
            preempt,
            mailbox,
            state: state_rx,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "live.session")]
    async fn run(mut self) {
        info!(target: "live.session", "SessionActor started");

        loop {
            let screen_ended = self.tracks.screen_ended();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "live.session",
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            if self.serve(message).await == Outcome::TornDown {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "live.session",
                                "All session handles dropped, exiting"
                            );
                            break;
                        }
                    }
                }

                event = next_event(&mut self.connection) => {
                    match event {
                        Some(event) => self.dispatch_event(event).await,
                        None => self.handle_event_stream_closed(),
                    }
                }

                () = wait_cancelled(screen_ended) => {
                    self.handle_screen_ended().await;
                }
            }
        }

        self.teardown().await;

        info!(
            target: "live.session",
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    /// Run one request, racing it against teardown and, unless it is a
    /// leave, against preemption.
    async fn serve(&mut self, message: SessionMessage) -> Outcome {
        let operation = message.operation();
        let is_leave = matches!(message, SessionMessage::Leave { .. });
        let teardown = self.cancel_token.clone();
        let preempted = (!is_leave).then(|| lock_preempt(&self.preempt).clone().cancelled_owned());
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            () = teardown.cancelled() => Outcome::TornDown,
            () = wait_cancelled(preempted) => Outcome::Preempted,
            () = self.handle_message(message) => Outcome::Completed,
        };

        match outcome {
            Outcome::Completed => {
                if is_leave {
                    *lock_preempt(&self.preempt) = CancellationToken::new();
                }
            }
            Outcome::Preempted => {
                warn!(
                    target: "live.session",
                    operation,
                    "Transition preempted by leave"
                );
                metrics::record_transition(operation, false, started.elapsed());
                self.publish_state();
            }
            Outcome::TornDown => {
                warn!(
                    target: "live.session",
                    operation,
                    "Transition interrupted by teardown"
                );
            }
        }
        outcome
    }

    /// Handle a single request and record its outcome.
    async fn handle_message(&mut self, message: SessionMessage) {
        let operation = message.operation();
        let started = Instant::now();

        let success = match message {
            SessionMessage::Join {
                options,
                respond_to,
            } => {
                let result = self.handle_join(options).await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }

            SessionMessage::Leave { respond_to } => {
                let result = self.handle_leave().await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }

            SessionMessage::PublishLocalTracks { respond_to } => {
                let result = self.handle_publish_request().await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }

            SessionMessage::ToggleAudio { respond_to } => {
                let result = self.handle_toggle_enabled(TrackSource::Microphone).await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }

            SessionMessage::ToggleVideo { respond_to } => {
                let result = self.handle_toggle_enabled(TrackSource::Camera).await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }

            SessionMessage::ToggleScreenShare { respond_to } => {
                let result = self.handle_toggle_screen_share().await;
                let ok = result.is_ok();
                let _ = respond_to.send(result);
                ok
            }
        };

        metrics::record_transition(operation, success, started.elapsed());
        self.publish_state();
    }

    /// Join the room and, for publishers, publish local media.
    #[instrument(skip_all, fields(room = %options.room, uid = %options.uid, role = options.role.as_str()))]
    async fn handle_join(&mut self, options: JoinOptions) -> Result<SessionSnapshot, SessionError> {
        options.validate()?;

        if let Some(connection) = &self.connection {
            return Err(SessionError::AlreadyJoined(connection.room.clone()));
        }

        let joined = self
            .transport
            .join(&options.room, &options.credential, &options.uid)
            .await
            .map_err(|e| {
                warn!(target: "live.session", error = %e, "Transport join failed");
                SessionError::Connection(e.to_string())
            })?;

        self.connection = Some(Connection {
            room: options.room,
            uid: joined.uid,
            role: options.role,
            joined_at: Utc::now(),
            events: Some(joined.events),
            attach_token: self.cancel_token.child_token(),
        });
        self.resync_remote_users();

        info!(
            target: "live.session",
            remote_participants = self.tracks.remote().len(),
            "Joined room"
        );

        if options.role.publishes() {
            // Partial state on failure: joined but unpublished; the caller may retry
            self.publish_local_tracks().await?;
        }

        Ok(self.snapshot())
    }

    /// Acquire missing local tracks, then publish everything unpublished.
    ///
    /// Each track is registered as soon as acquisition resolves so that
    /// teardown can release it even if a later step fails or is interrupted.
    async fn publish_local_tracks(&mut self) -> Result<(), SessionError> {
        if self.tracks.get(TrackSource::Microphone).is_none() {
            self.acquire(TrackSource::Microphone).await?;
        }

        if self.tracks.get(TrackSource::Camera).is_none() {
            self.acquire(TrackSource::Camera).await?;
        }

        let pending = self.tracks.unpublished();
        let Some(first) = pending.first() else {
            return Ok(());
        };
        let first_source = first.source();

        self.transport
            .publish(&pending)
            .await
            .map_err(|e| device_error(first_source, &e))?;

        for track in &pending {
            self.tracks.set_published(track.source(), true);
        }

        debug!(
            target: "live.session",
            published = pending.len(),
            "Local tracks published"
        );
        Ok(())
    }

    /// Acquire a device track on its own task and register it.
    ///
    /// The task handle is parked in `self.acquiring` while awaited, so if this
    /// transition is abandoned the eventual track is closed by
    /// [`Self::release_local_tracks`].
    async fn acquire(&mut self, source: TrackSource) -> Result<LocalTrack, SessionError> {
        let transport = Arc::clone(&self.transport);
        let task = self
            .acquiring
            .insert(tokio::spawn(async move { create_track(transport.as_ref(), source).await }));
        let joined = task.await;
        self.acquiring = None;

        let track = joined
            .map_err(|e| SessionError::Internal(format!("track acquisition task failed: {e}")))?
            .map_err(|e| device_error(source, &e))?;

        if let Some(previous) = self.tracks.insert(track.clone()) {
            self.close_track(&previous).await;
        }
        Ok(track)
    }

    async fn handle_publish_request(&mut self) -> Result<(), SessionError> {
        let role = self
            .connection
            .as_ref()
            .map(|c| c.role)
            .ok_or(SessionError::NotJoined)?;
        if !role.publishes() {
            return Err(SessionError::NotPublisher);
        }
        self.publish_local_tracks().await
    }

    /// Release local tracks, leave the transport, clear state.
    #[instrument(skip_all)]
    async fn handle_leave(&mut self) -> Result<(), SessionError> {
        let Some(connection) = self.connection.take() else {
            // Never joined (or already left); nothing acquired can remain
            self.release_local_tracks().await;
            return Ok(());
        };

        connection.attach_token.cancel();
        self.release_local_tracks().await;

        let result = self.transport.leave().await.map_err(|e| {
            warn!(target: "live.session", error = %e, "Transport leave failed");
            SessionError::Connection(e.to_string())
        });

        // Unsubscribe from remote events only after the transport has left
        drop(connection);
        self.tracks.clear_remote();
        metrics::set_remote_participants(0);

        info!(target: "live.session", "Left room");
        result
    }

    /// Close every registered local track exactly once, including the result
    /// of an abandoned acquisition.
    async fn release_local_tracks(&mut self) {
        if let Some(task) = self.acquiring.take() {
            self.release_abandoned_acquisition(task).await;
        }
        for track in self.tracks.drain_local() {
            self.close_track(&track).await;
        }
    }

    async fn release_abandoned_acquisition(
        &self,
        task: JoinHandle<Result<LocalTrack, TransportError>>,
    ) {
        if task.is_finished() {
            if let Ok(Ok(track)) = task.await {
                self.close_track(&track).await;
            }
            return;
        }

        // Still waiting on the device (an open permission prompt); close
        // whatever it eventually yields.
        debug!(
            target: "live.session",
            "Device acquisition still pending, releasing on completion"
        );
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Ok(Ok(track)) = task.await {
                release_track(transport.as_ref(), &track).await;
            }
        });
    }

    pub(super) async fn close_track(&self, track: &LocalTrack) {
        release_track(self.transport.as_ref(), track).await;
    }

    /// Flip the enabled flag of the microphone or camera track.
    #[instrument(skip_all, fields(source = source.as_str()))]
    async fn handle_toggle_enabled(&mut self, source: TrackSource) -> Result<bool, SessionError> {
        if self.connection.is_none() {
            return Err(SessionError::NotJoined);
        }

        let track = self
            .tracks
            .get(source)
            .cloned()
            .ok_or(SessionError::NoLocalTrack(source.kind()))?;

        let enabled = !track.is_enabled();
        self.transport
            .set_track_enabled(&track, enabled)
            .await
            .map_err(|e| device_error(source, &e))?;
        track.set_enabled(enabled);

        debug!(target: "live.session", enabled, "Local track toggled");
        Ok(enabled)
    }

    #[instrument(skip_all)]
    async fn handle_toggle_screen_share(&mut self) -> Result<bool, SessionError> {
        if self.connection.is_none() {
            return Err(SessionError::NotJoined);
        }

        if self.tracks.get(TrackSource::Screen).is_some() {
            self.stop_screen_share().await?;
            Ok(false)
        } else {
            self.start_screen_share().await?;
            Ok(true)
        }
    }

    /// NOT_SHARING -> SHARING.
    ///
    /// The sharing flag only flips once the transport confirms the screen
    /// publish; on any failure the screen track is closed and the camera is
    /// restored to its previous publication state.
    async fn start_screen_share(&mut self) -> Result<(), SessionError> {
        let screen = self.acquire(TrackSource::Screen).await?;

        let camera_was_published = self.tracks.is_published(TrackSource::Camera);
        if camera_was_published {
            if let Some(camera) = self.tracks.get(TrackSource::Camera).cloned() {
                if let Err(e) = self.transport.unpublish(&[camera]).await {
                    self.discard_screen_track().await;
                    return Err(device_error(TrackSource::Camera, &e));
                }
                self.tracks.set_published(TrackSource::Camera, false);
            }
        }

        if let Err(e) = self.transport.publish(&[screen.clone()]).await {
            warn!(
                target: "live.session",
                error = %e,
                "Screen publish failed, restoring camera"
            );
            self.discard_screen_track().await;
            if camera_was_published {
                if let Err(restore) = self.republish_camera().await {
                    error!(
                        target: "live.session",
                        error = %restore,
                        "Camera republish failed after screen publish failure"
                    );
                }
            }
            return Err(device_error(TrackSource::Screen, &e));
        }
        self.tracks.set_published(TrackSource::Screen, true);

        info!(
            target: "live.session",
            track_id = %screen.id(),
            "Screen sharing started"
        );
        Ok(())
    }

    /// SHARING -> NOT_SHARING.
    ///
    /// Always closes the screen track and attempts the camera republish, even
    /// when the screen unpublish fails.
    pub(super) async fn stop_screen_share(&mut self) -> Result<(), SessionError> {
        let was_published = self.tracks.is_published(TrackSource::Screen);
        let Some(screen) = self.tracks.take(TrackSource::Screen) else {
            return Ok(());
        };

        let unpublished = if was_published {
            self.transport
                .unpublish(&[screen.clone()])
                .await
                .map_err(|e| device_error(TrackSource::Screen, &e))
        } else {
            Ok(())
        };
        self.close_track(&screen).await;

        let republished = self.republish_camera().await;

        info!(target: "live.session", "Screen sharing stopped");
        unpublished.and(republished)
    }

    /// Drop a screen track that never became the published video source.
    async fn discard_screen_track(&mut self) {
        if let Some(screen) = self.tracks.take(TrackSource::Screen) {
            self.close_track(&screen).await;
        }
    }

    /// Publish the camera track again if one exists and is unpublished.
    async fn republish_camera(&mut self) -> Result<(), SessionError> {
        let Some(camera) = self.tracks.get(TrackSource::Camera).cloned() else {
            return Ok(());
        };
        if self.tracks.is_published(TrackSource::Camera) {
            return Ok(());
        }

        self.transport
            .publish(&[camera])
            .await
            .map_err(|e| device_error(TrackSource::Camera, &e))?;
        self.tracks.set_published(TrackSource::Camera, true);
        Ok(())
    }

    /// The user stopped sharing through the OS-level control.
    async fn handle_screen_ended(&mut self) {
        info!(
            target: "live.session",
            "Screen track ended externally, returning to camera"
        );
        if let Err(e) = self.stop_screen_share().await {
            warn!(
                target: "live.session",
                error = %e,
                "Automatic screen share stop failed"
            );
        }
        self.publish_state();
    }

    /// Teardown on unmount: leave if joined, release anything still held.
    async fn teardown(&mut self) {
        if self.connection.is_none() && !self.tracks.has_local_tracks() && self.acquiring.is_none()
        {
            return;
        }
        let started = Instant::now();
        let result = self.handle_leave().await;
        if let Err(e) = &result {
            warn!(target: "live.session", error = %e, "Leave during teardown failed");
        }
        metrics::record_transition("teardown", result.is_ok(), started.elapsed());
        self.publish_state();
    }

    /// Build the exposed state from the current connection and registry.
    pub(super) fn snapshot(&self) -> SessionSnapshot {
        let Some(connection) = &self.connection else {
            return SessionSnapshot::default();
        };

        let microphone = self.tracks.get(TrackSource::Microphone);
        let camera = self.tracks.get(TrackSource::Camera);

        SessionSnapshot {
            connected: true,
            room: Some(connection.room.clone()),
            uid: Some(connection.uid.clone()),
            role: Some(connection.role),
            joined_at: Some(connection.joined_at),
            audio_enabled: microphone.is_some_and(LocalTrack::is_enabled),
            video_enabled: camera.is_some_and(LocalTrack::is_enabled),
            audio_published: self.tracks.is_published(TrackSource::Microphone),
            video_published: self.tracks.is_published(TrackSource::Camera),
            screen_sharing: self.tracks.is_screen_sharing(),
            remote_users: self.tracks.remote().to_vec(),
        }
    }

    pub(super) fn publish_state(&self) {
        self.state_tx.send_replace(self.snapshot());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Preempted,
    TornDown,
}

/// Next remote event, or pending forever when there is no subscription.
async fn next_event(connection: &mut Option<Connection>) -> Option<TransportEvent> {
    match connection.as_mut().and_then(|c| c.events.as_mut()) {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolves when the token fires, or never when there is none.
async fn wait_cancelled(cancelled: Option<WaitForCancellationFutureOwned>) {
    match cancelled {
        Some(cancelled) => cancelled.await,
        None => std::future::pending().await,
    }
}

fn lock_preempt(slot: &Mutex<CancellationToken>) -> MutexGuard<'_, CancellationToken> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn create_track(
    transport: &dyn Transport,
    source: TrackSource,
) -> Result<LocalTrack, TransportError> {
    match source {
        TrackSource::Microphone => transport.create_microphone_track().await,
        TrackSource::Camera => transport.create_camera_track().await,
        TrackSource::Screen => transport.create_screen_track().await,
    }
}

/// Close a local track through the transport unless it was already closed.
async fn release_track(transport: &dyn Transport, track: &LocalTrack) {
    if track.mark_closed() {
        transport.close_track(track).await;
        metrics::record_track_closed(track.source().as_str());
        debug!(
            target: "live.session",
            track_id = %track.id(),
            source = track.source().as_str(),
            "Local track closed"
        );
    }
}

fn device_error(source: TrackSource, err: &TransportError) -> SessionError {
    warn!(
        target: "live.session",
        source = source.as_str(),
        error = %err,
        "Device operation failed"
    );
    SessionError::device(source, err.to_string())
}
