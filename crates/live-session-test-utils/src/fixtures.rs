//! Pre-configured join options and session setup for tests.

use crate::mock_transport::MockTransport;
use live_session::config::SessionConfig;
use live_session::identity::{JoinOptions, Role};
use live_session::session::{SessionActor, SessionHandle, SessionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Join options fixture.
#[derive(Debug, Clone)]
pub struct TestJoinOptions {
    pub room: String,
    pub identity: String,
    pub credential: String,
    pub role: Role,
}

impl Default for TestJoinOptions {
    fn default() -> Self {
        Self {
            room: "room1".to_string(),
            identity: "42".to_string(),
            credential: "test-access-token".to_string(),
            role: Role::Publisher,
        }
    }
}

impl TestJoinOptions {
    /// Publisher joining `room1` as uid 42.
    #[must_use]
    pub fn publisher() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscriber() -> Self {
        Self {
            role: Role::Subscriber,
            ..Self::default()
        }
    }

    /// Random room name.
    #[must_use]
    pub fn random_room(mut self) -> Self {
        self.room = format!("room-{}", Uuid::new_v4());
        self
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    #[must_use]
    pub fn build(self) -> JoinOptions {
        JoinOptions::new(self.room, &self.identity, self.credential, self.role)
    }
}

/// Config with a short video attach delay for fast tests.
#[must_use]
pub fn test_config() -> SessionConfig {
    SessionConfig {
        video_attach_delay: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

/// Yield until `condition` holds.
///
/// Panics after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

/// A spawned session wired to a mock transport.
pub struct TestSession {
    pub handle: SessionHandle,
    pub transport: MockTransport,
    pub task: JoinHandle<()>,
}

impl TestSession {
    /// Spawn a session over `transport` with [`test_config`].
    #[must_use]
    pub fn spawn(transport: MockTransport) -> Self {
        Self::spawn_with_config(transport, test_config())
    }

    #[must_use]
    pub fn spawn_with_config(transport: MockTransport, config: SessionConfig) -> Self {
        let (handle, task) =
            SessionActor::spawn(Arc::new(transport.clone()), config, CancellationToken::new());
        Self {
            handle,
            transport,
            task,
        }
    }

    /// Wait until the exposed state satisfies `predicate`.
    ///
    /// Panics after five seconds or if the actor stops.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut state = self.handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), state.wait_for(predicate))
            .await
            .expect("timed out waiting for session state")
            .expect("session actor stopped")
            .clone();
        snapshot
    }

    /// Shut the session down and wait for teardown to finish.
    pub async fn shutdown(self) -> MockTransport {
        self.handle.shutdown();
        self.task.await.expect("session task panicked");
        self.transport
    }
}
