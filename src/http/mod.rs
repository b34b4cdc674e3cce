//! Status API subsystem.
//!
//! # Data Flow
//! ```text
//! GET /coturn          → handlers.rs → SelectionState snapshot → JSON
//! GET /p/health_check  → handlers.rs → 200 if a relay is active, else 500
//! ```
//!
//! The API is read-only; nothing here mutates the selection.

pub mod handlers;
pub mod server;

pub use server::{build_router, StatusServer};
