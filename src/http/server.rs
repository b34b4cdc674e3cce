//! Status API server.
//!
//! # Responsibilities
//! - Create Axum Router with the read-only status handlers
//! - Wire up request tracing
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::handlers::{get_health, get_selection};
use crate::load_balancer::state::SelectionState;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub selection: Arc<SelectionState>,
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(selection: Arc<SelectionState>) -> Router {
    Router::new()
        .route("/coturn", get(get_selection))
        .route("/p/health_check", get(get_health))
        .with_state(AppState { selection })
        .layer(TraceLayer::new_for_http())
}

/// HTTP server exposing the current selection.
pub struct StatusServer {
    router: Router,
}

impl StatusServer {
    pub fn new(selection: Arc<SelectionState>) -> Self {
        Self {
            router: build_router(selection),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Status API listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Status API stopped");
        Ok(())
    }
}
