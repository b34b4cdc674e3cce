use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::health::state::EndpointHealth;
use crate::http::server::AppState;
use crate::load_balancer::endpoint::Endpoint;

/// Body of `GET /coturn`.
#[derive(Serialize)]
pub struct SelectionStatus {
    pub turn_server: Option<Endpoint>,
    pub turn_data: BTreeMap<Endpoint, EndpointHealth>,
}

#[derive(Serialize)]
pub struct ApiHealth {
    pub health: &'static str,
}

pub async fn get_selection(State(state): State<AppState>) -> Json<SelectionStatus> {
    let snapshot = state.selection.snapshot();
    Json(SelectionStatus {
        turn_server: snapshot.active.clone(),
        turn_data: snapshot.health.clone(),
    })
}

/// Healthy iff an active relay has been published.
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealth>) {
    if state.selection.active().is_some() {
        (StatusCode::OK, Json(ApiHealth { health: "healthy" }))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiHealth { health: "unhealthy" }),
        )
    }
}
