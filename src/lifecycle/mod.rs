//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry + shared state → Bind status API → Spawn tasks → Supervise
//!
//! Shutdown (shutdown.rs):
//!     Signal received or task died → Broadcast stop → Drain tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then shared state, then tasks
//! - A background task ending on its own is a fatal error
//! - Shutdown has timeout: forced abort after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
