//! End-to-end selection: real TCP probes, a mock Prometheus and the status API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time;

use turn_balancer::config::{Algorithm, HealthCheckConfig, LoadBalancerConfig, PrometheusConfig};
use turn_balancer::health::active::HealthMonitor;
use turn_balancer::health::probe::TcpProber;
use turn_balancer::health::state::HealthState;
use turn_balancer::load_balancer::{Outcome, PrometheusClient, SelectionEngine};
use turn_balancer::{Endpoint, Registry, SelectionState, StatusServer};

use common::{matrix, start_mock_prometheus, start_mock_relays, MockPrometheus};

const UP_A: &str = "127.0.0.1";
const DOWN: &str = "127.0.0.2";
const UP_B: &str = "127.0.0.3";

struct Harness {
    state: Arc<SelectionState>,
    monitor: HealthMonitor<TcpProber>,
    health: HealthCheckConfig,
}

async fn harness() -> Harness {
    let port = start_mock_relays(&[UP_A, UP_B]).await;
    let state = Arc::new(SelectionState::new(
        Registry::new([UP_A, DOWN, UP_B]).unwrap(),
        1,
    ));
    let health = HealthCheckConfig {
        port,
        interval_secs: 1,
        timeout_secs: 1,
        success_threshold: 1,
    };
    let prober = TcpProber::new(port, health.timeout());
    let monitor = HealthMonitor::new(state.clone(), health.clone(), prober);
    Harness {
        state,
        monitor,
        health,
    }
}

fn prometheus_config(addr: std::net::SocketAddr, algorithm: Algorithm) -> LoadBalancerConfig {
    LoadBalancerConfig {
        algorithm,
        interval_minutes: 1,
        duration_minutes: 3,
        timeout_secs: 2,
        prometheus: PrometheusConfig {
            endpoint: format!("http://{}", addr.ip()),
            port: addr.port(),
            query: r#"avg_over_time(turn_load{instance=~"%s"}[1m])"#.to_string(),
        },
    }
}

async fn get_json(base: &str, path: &str) -> (StatusCode, Value) {
    let res = reqwest::get(format!("{base}{path}")).await.unwrap();
    let status = StatusCode::from_u16(res.status().as_u16()).unwrap();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_lowest_mean_relay_is_published() {
    let h = harness().await;
    h.monitor.check_all().await;

    let snap = h.state.snapshot();
    assert_eq!(snap.status(UP_A), Some(HealthState::Healthy));
    assert_eq!(snap.status(DOWN), Some(HealthState::Unhealthy));
    assert_eq!(snap.status(UP_B), Some(HealthState::Healthy));

    let mock = MockPrometheus::ok(matrix(&[
        (UP_A, &[5.0, 6.0, 7.0][..]),
        (UP_B, &[1.0, 2.0, 3.0][..]),
    ]));
    let addr = start_mock_prometheus(mock.clone()).await;
    let source = PrometheusClient::new(&prometheus_config(addr, Algorithm::Prometheus)).unwrap();
    let engine = SelectionEngine::new(
        h.state.clone(),
        prometheus_config(addr, Algorithm::Prometheus),
        source,
    );

    let selection = engine.select_once().await;
    assert_eq!(selection.outcome, Outcome::LowestMean);
    assert_eq!(selection.endpoint, Endpoint::from(UP_B));
    assert_eq!(
        mock.received(),
        vec![r#"avg_over_time(turn_load{instance=~"127.0.0.1|127.0.0.3"}[1m])"#.to_string()]
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = broadcast::channel(1);
    let server = tokio::spawn(StatusServer::new(h.state.clone()).run(listener, rx));

    let (status, body) = get_json(&base, "/coturn").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turn_server"], UP_B);
    assert_eq!(body["turn_data"][DOWN]["status"], "unhealthy");
    assert_eq!(body["turn_data"][UP_A]["failed_checks"], 0);
    assert_eq!(body["turn_data"][UP_A]["success_threshold"], h.health.success_threshold);

    let (status, body) = get_json(&base, "/p/health_check").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"], "healthy");

    tx.send(()).unwrap();
    time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_prometheus_error_falls_back_to_healthy_relay() {
    let h = harness().await;
    h.monitor.check_all().await;

    let mock = MockPrometheus::failing(StatusCode::INTERNAL_SERVER_ERROR);
    let addr = start_mock_prometheus(mock.clone()).await;
    let config = prometheus_config(addr, Algorithm::Prometheus);
    let engine = SelectionEngine::new(
        h.state.clone(),
        config.clone(),
        PrometheusClient::new(&config).unwrap(),
    );

    let selection = engine.select_once().await;
    assert_eq!(selection.outcome, Outcome::QueryFailed);
    assert_ne!(selection.endpoint, Endpoint::from(DOWN));
    assert_eq!(h.state.active(), Some(selection.endpoint));
    assert_eq!(mock.received().len(), 1);
}

#[tokio::test]
async fn test_unknown_series_falls_back_to_healthy_relay() {
    let h = harness().await;
    h.monitor.check_all().await;

    let mock = MockPrometheus::ok(matrix(&[
        (UP_A, &[1.0, 1.0, 1.0][..]),
        ("10.9.9.9", &[0.0, 0.0, 0.0][..]),
    ]));
    let addr = start_mock_prometheus(mock).await;
    let config = prometheus_config(addr, Algorithm::Prometheus);
    let engine = SelectionEngine::new(
        h.state.clone(),
        config.clone(),
        PrometheusClient::new(&config).unwrap(),
    );

    let selection = engine.select_once().await;
    assert_eq!(selection.outcome, Outcome::UnknownSeries);
    assert_ne!(selection.endpoint, Endpoint::from(DOWN));
}

#[tokio::test]
async fn test_background_tasks_publish_a_relay() {
    let h = harness().await;
    let mock = MockPrometheus::ok(matrix(&[]));
    let addr = start_mock_prometheus(mock).await;
    let config = prometheus_config(addr, Algorithm::Random);
    let engine = SelectionEngine::new(
        h.state.clone(),
        config.clone(),
        PrometheusClient::new(&config).unwrap(),
    );

    let (tx, _) = broadcast::channel(1);
    let monitor_task = tokio::spawn(h.monitor.run(tx.subscribe()));
    let engine_task = tokio::spawn(engine.run(tx.subscribe()));

    let active = time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(active) = h.state.active() {
                return active;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("a relay should be selected after the first health pass");
    assert_ne!(active, Endpoint::from(DOWN));
    assert!(h.state.is_ready());

    tx.send(()).unwrap();
    for task in [monitor_task, engine_task] {
        time::timeout(Duration::from_secs(2), task)
            .await
            .expect("task should stop")
            .unwrap();
    }
}
