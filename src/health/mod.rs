//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each relay concurrently (probe.rs)
//!     → Update state.rs
//!     → Fail over if the active relay degraded
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With a bounded counter to prevent flapping
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive contrary results
//! - Health state is per-relay and lives in the shared selection state
//! - The fast path reacts within one health interval, not one selection interval

pub mod active;
pub mod probe;
pub mod state;
