//! Live session actor (join/leave/publish state machine).
//!
//! ```text
//! SessionHandle (cloneable, held by UI collaborators)
//! └── SessionActor (one per mounted live-class view)
//!     ├── owns the Transport handle and the TrackRegistry
//!     ├── serves one request at a time from its mailbox
//!     └── dispatches remote participant events between join and leave
//! ```
//!
//! # Modules
//!
//! - [`actor`] - `SessionActor` and `SessionHandle`
//! - `dispatch` - remote participant event handling
//! - [`mailbox`] - mailbox depth monitoring
//! - [`messages`] - request types and the exposed `SessionSnapshot`
//! - [`registry`] - local track slots and the resynchronized remote list

pub mod actor;
mod dispatch;
pub mod mailbox;
pub mod messages;
pub mod registry;

pub use actor::{SessionActor, SessionHandle};
pub use mailbox::{MailboxLevel, MailboxMonitor};
pub use messages::{SessionMessage, SessionSnapshot};
pub use registry::TrackRegistry;
