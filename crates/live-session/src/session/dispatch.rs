//! Remote participant event dispatch.
//!
//! The dispatcher keeps no participant bookkeeping of its own. Every event
//! ends with a pull of the transport's authoritative remote list, so the
//! exposed list reflects at least the state as of the last delivered event.
//!
//! Handling failures are logged and counted; they never end the session.

use crate::errors::SessionError;
use crate::identity::CallerId;
use crate::observability::metrics;
use crate::transport::{MediaKind, TransportEvent};

use super::actor::SessionActor;

use std::sync::Arc;
use tracing::{debug, warn};

impl SessionActor {
    /// Handle one remote participant event, then resynchronize.
    pub(super) async fn dispatch_event(&mut self, event: TransportEvent) {
        let name = event.name();

        let result = match &event {
            TransportEvent::UserPublished { uid, kind } => {
                self.handle_user_published(uid, *kind).await
            }
            TransportEvent::UserUnpublished { .. }
            | TransportEvent::UserJoined { .. }
            | TransportEvent::UserLeft { .. } => Ok(()),
        };

        self.resync_remote_users();

        match result {
            Ok(()) => {
                debug!(
                    target: "live.dispatch",
                    event = name,
                    uid = %event.uid(),
                    remote_participants = self.tracks.remote().len(),
                    "Transport event handled"
                );
                metrics::record_transport_event(name, true);
            }
            Err(e) => {
                warn!(
                    target: "live.dispatch",
                    event = name,
                    uid = %event.uid(),
                    error = %e,
                    "Transport event handling failed"
                );
                metrics::record_transport_event(name, false);
            }
        }

        self.publish_state();
    }

    /// Subscribe to newly published remote media and start rendering it.
    async fn handle_user_published(
        &mut self,
        uid: &CallerId,
        kind: MediaKind,
    ) -> Result<(), SessionError> {
        let Some(attach_token) = self.connection.as_ref().map(|c| c.attach_token.clone()) else {
            return Err(SessionError::TransportEvent(
                "publish event received while not joined".to_string(),
            ));
        };

        let track = self.transport.subscribe(uid, kind).await.map_err(|e| {
            SessionError::TransportEvent(format!("subscribe to {kind} failed: {e}"))
        })?;

        match kind {
            MediaKind::Audio => {
                self.transport.play_audio(&track).await.map_err(|e| {
                    SessionError::TransportEvent(format!("audio playback failed: {e}"))
                })?;
            }
            MediaKind::Video => {
                // The render target is created asynchronously by the UI
                let transport = Arc::clone(&self.transport);
                let target = uid.player_target();
                let delay = self.config.video_attach_delay;
                tokio::spawn(async move {
                    tokio::select! {
                        () = attach_token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            if let Err(e) = transport.play_video(&track, &target).await {
                                warn!(
                                    target: "live.dispatch",
                                    render_target = %target,
                                    error = %e,
                                    "Remote video attach failed"
                                );
                            }
                        }
                    }
                });
            }
        }

        Ok(())
    }

    /// Replace the exposed remote list with the transport's current list.
    pub(super) fn resync_remote_users(&mut self) {
        let users = self.transport.remote_users();
        metrics::set_remote_participants(users.len());
        self.tracks.resync_remote(users);
    }

    /// The transport closed the event stream while still joined.
    pub(super) fn handle_event_stream_closed(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            connection.events = None;
        }
        warn!(
            target: "live.dispatch",
            "Transport event stream closed, remote participant updates stopped"
        );
    }
}
