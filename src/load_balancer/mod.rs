//! Active relay selection subsystem.
//!
//! # Data Flow
//! ```text
//! Selection timer fires
//!     → engine.rs (pick mode, read healthy relays from state.rs)
//!     → metrics_source.rs (Prometheus range query, prometheus mode only)
//!     → lowest mean wins, or fallback.rs when metrics cannot decide
//!     → state.rs (publish active relay)
//! ```
//!
//! # Design Decisions
//! - Only healthy relays are compared
//! - Every failure path still publishes some relay
//! - Randomness is injected into the pure selection helpers for testing

pub mod endpoint;
pub mod engine;
pub mod fallback;
pub mod metrics_source;
pub mod state;

pub use endpoint::{Endpoint, Registry};
pub use engine::{Outcome, Selection, SelectionEngine};
pub use metrics_source::{MetricsError, MetricsSource, PrometheusClient};
pub use state::{SelectionState, Snapshot};
