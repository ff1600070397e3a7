//! # Live Session Test Utilities
//!
//! Shared test utilities for the live-class session client.
//!
//! ## Modules
//!
//! - `mock_transport` - In-memory RTC transport with scripted failures
//! - `fixtures` - Join options and spawned-session helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use live_session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let session = TestSession::spawn(MockTransport::builder().deny_camera().build());
//!
//!     let result = session.handle.join(TestJoinOptions::publisher().build()).await;
//!     assert!(result.is_err());
//!     assert!(session.handle.state().connected);
//! }
//! ```

pub mod fixtures;
pub mod mock_transport;

pub use fixtures::{test_config, wait_until, TestJoinOptions, TestSession};
pub use mock_transport::{MockTransport, MockTransportBuilder, TransportCall};
