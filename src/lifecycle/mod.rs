//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Ledger client → Event stream → Engine
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → trigger → websocket task and event pump exit → engine timers aborted
//!     → drain (abort tasks still running after the grace period)
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
