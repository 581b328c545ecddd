//! Push-event subsystem.
//!
//! # Data Flow
//! ```text
//! node websocket
//!     → connection.rs (reconnecting socket task)
//!     → types.rs (confirmation parsing; legacy events dropped)
//!     → stream.rs (broadcast to subscribers)
//!     → engine event pump
//!
//! engine watch/unwatch
//!     → stream.rs (ref-counted registrations)
//!     → connection.rs (register/unregister frames)
//! ```

pub mod connection;
pub mod stream;
pub mod types;

pub use connection::EventConnection;
pub use stream::{EventStream, OutboundReceiver};
pub use types::{ConfirmationEvent, EventBlock, EventError, OutboundMessage, Subtype};
