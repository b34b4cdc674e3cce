//! Startup orchestration and task supervision.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start the health monitor, selection engine and status API
//! - Treat the unexpected end of any of them as fatal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The supervisor blocks on task completion, it never polls liveness
//! - Shutdown has a deadline; stragglers are aborted

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::select_all;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::BalancerConfig;
use crate::health::active::HealthMonitor;
use crate::health::probe::TcpProber;
use crate::http::StatusServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::load_balancer::{MetricsError, PrometheusClient, Registry, SelectionEngine, SelectionState};
use crate::observability::metrics;

/// How long stopped tasks get to finish after shutdown is triggered.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("turn.address_mapping is empty")]
    EmptyRegistry,

    #[error("failed to bind status API on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build Prometheus client: {0}")]
    Metrics(#[from] MetricsError),

    #[error("{task} stopped unexpectedly: {reason}")]
    TaskExited { task: &'static str, reason: String },
}

/// Start every subsystem and supervise it until a shutdown signal arrives.
pub async fn run(config: BalancerConfig) -> Result<(), StartupError> {
    let registry = Registry::new(config.turn.addresses()).ok_or(StartupError::EmptyRegistry)?;
    tracing::info!(
        relays = registry.endpoints().len(),
        algorithm = ?config.load_balancer.algorithm,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = Arc::new(SelectionState::new(
        registry,
        config.health_check.success_threshold,
    ));

    let listener = TcpListener::bind(&config.web_api.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.web_api.bind_address.clone(),
            source,
        })?;

    let prober = TcpProber::new(config.health_check.port, config.health_check.timeout());
    let monitor = HealthMonitor::new(state.clone(), config.health_check.clone(), prober);
    let source = PrometheusClient::new(&config.load_balancer)?;
    let engine = SelectionEngine::new(state.clone(), config.load_balancer.clone(), source);
    let server = StatusServer::new(state);

    let shutdown = Shutdown::new();
    let health_task = tokio::spawn(monitor.run(shutdown.subscribe()));
    let selection_task = tokio::spawn(engine.run(shutdown.subscribe()));
    let server_shutdown = shutdown.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = server.run(listener, server_shutdown).await {
            tracing::error!(error = %e, "Status API failed");
        }
    });

    supervise(
        &shutdown,
        vec![
            ("health-monitor", health_task),
            ("selection-engine", selection_task),
            ("status-api", api_task),
        ],
        shutdown_signal(),
    )
    .await
}

/// Wait until `stop` resolves or any task ends. A task ending first is an
/// error. Either way every task is then told to shut down and drained.
pub async fn supervise<S>(
    shutdown: &Shutdown,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    stop: S,
) -> Result<(), StartupError>
where
    S: Future<Output = ()>,
{
    let (names, mut handles): (Vec<&'static str>, Vec<JoinHandle<()>>) = tasks.into_iter().unzip();
    if handles.is_empty() {
        stop.await;
        shutdown.trigger();
        return Ok(());
    }

    let crashed = tokio::select! {
        (result, index, _) = select_all(handles.iter_mut()) => Some((index, result)),
        _ = stop => None,
    };
    shutdown.trigger();

    let crashed_index = crashed.as_ref().map(|(index, _)| *index);
    let outcome = match crashed {
        Some((index, result)) => {
            let reason = match result {
                Ok(()) => "returned".to_string(),
                Err(e) if e.is_panic() => "panicked".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!(task = names[index], reason = %reason, "Task stopped unexpectedly, shutting down");
            Err(StartupError::TaskExited {
                task: names[index],
                reason,
            })
        }
        None => {
            tracing::info!("Shutdown requested, stopping tasks");
            Ok(())
        }
    };

    let drain = async {
        for (index, handle) in handles.iter_mut().enumerate() {
            if Some(index) != crashed_index {
                let _ = handle.await;
            }
        }
    };
    if time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Tasks did not stop in time, aborting");
        for handle in &handles {
            handle.abort();
        }
    }

    outcome
}
