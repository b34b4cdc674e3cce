//! Shared utilities for integration testing.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Start a relay stand-in that accepts and immediately drops connections.
pub async fn start_mock_relay(addr: SocketAddr) -> SocketAddr {
    let listener = TcpListener::bind(addr).await.unwrap();
    let local = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    local
}

/// Start relays on every `ip`, all sharing one port. Returns that port.
pub async fn start_mock_relays(ips: &[&str]) -> u16 {
    let mut port = 0;
    for ip in ips {
        let ip: IpAddr = ip.parse().unwrap();
        port = start_mock_relay(SocketAddr::new(ip, port)).await.port();
    }
    port
}

/// What the mock Prometheus answers and what it was asked.
#[derive(Clone)]
pub struct MockPrometheus {
    pub status: StatusCode,
    pub body: Value,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl MockPrometheus {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            queries: Arc::default(),
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self {
            status,
            body: json!({"status": "error", "errorType": "internal", "error": "boom"}),
            queries: Arc::default(),
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

async fn query_range(
    State(mock): State<MockPrometheus>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if let Some(query) = params.get("query") {
        mock.queries.lock().unwrap().push(query.clone());
    }
    (mock.status, Json(mock.body.clone()))
}

/// Serve `mock` on an ephemeral local port.
pub async fn start_mock_prometheus(mock: MockPrometheus) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/api/v1/query_range", get(query_range))
        .with_state(mock);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A matrix response with one series per `(instance, values)` pair.
pub fn matrix(series: &[(&str, &[f64])]) -> Value {
    let result: Vec<Value> = series
        .iter()
        .map(|(instance, values)| {
            let points: Vec<Value> = values
                .iter()
                .enumerate()
                .map(|(i, v)| json!([1_700_000_000 + 60 * i as u64, v.to_string()]))
                .collect();
            json!({"metric": {"instance": instance}, "values": points})
        })
        .collect();
    json!({"status": "success", "data": {"resultType": "matrix", "result": result}})
}
