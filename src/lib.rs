//! TURN relay balancer library.
//!
//! Keeps a health table for a fixed set of coturn relays, picks one of them
//! as the active relay, and serves that choice over a small HTTP API.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::BalancerConfig;
pub use http::StatusServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Endpoint, Registry, SelectionState};
