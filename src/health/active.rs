//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every relay concurrently
//! - Update relay health state based on results
//! - Fail over immediately when the active relay stops being healthy
//! - Signal readiness once every relay has been probed

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::probe::Prober;
use crate::health::state::{HealthState, Transition};
use crate::load_balancer::endpoint::{Endpoint, Registry};
use crate::load_balancer::fallback::pick_random_healthy;
use crate::load_balancer::state::{SelectionState, Snapshot};
use crate::observability::metrics;

/// Active relay replaced by the fast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failover {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// Effects of applying one probe result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub transition: Option<Transition>,
    pub failover: Option<Failover>,
    pub healthy: bool,
}

/// True when the active relay must be replaced right away: it is no longer
/// healthy, and the outage is partial (at least one relay unhealthy, but not
/// all of them).
pub fn needs_failover(snapshot: &Snapshot) -> bool {
    let Some(active) = &snapshot.active else {
        return false;
    };
    let unhealthy = snapshot.unhealthy_count();
    let partial_outage = unhealthy >= 1 && unhealthy < snapshot.health.len();
    partial_outage && snapshot.status(active.as_str()) != Some(HealthState::Healthy)
}

/// Record one probe result on `snapshot`, then run the fast path.
pub fn apply_probe<R: Rng + ?Sized>(
    snapshot: &mut Snapshot,
    registry: &Registry,
    endpoint: &Endpoint,
    passed: bool,
    rng: &mut R,
) -> ProbeOutcome {
    let Some(health) = snapshot.health.get_mut(endpoint.as_str()) else {
        return ProbeOutcome::default();
    };
    let transition = health.record(passed);
    let healthy = health.is_healthy();

    let failover = if needs_failover(snapshot) {
        let from = snapshot.active.clone();
        let to = pick_random_healthy(snapshot, registry, rng);
        snapshot.active = Some(to.clone());
        from.map(|from| Failover { from, to })
    } else {
        None
    };

    ProbeOutcome {
        transition,
        failover,
        healthy,
    }
}

pub struct HealthMonitor<P> {
    state: Arc<SelectionState>,
    config: HealthCheckConfig,
    prober: P,
}

impl<P: Prober> HealthMonitor<P> {
    pub fn new(state: Arc<SelectionState>, config: HealthCheckConfig, prober: P) -> Self {
        Self {
            state,
            config,
            prober,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            port = self.config.port,
            success_threshold = self.config.success_threshold,
            "Health monitor starting"
        );

        let interval = self.config.interval();
        loop {
            let start = Instant::now();
            self.check_all().await;

            if !self.state.is_ready() && self.state.snapshot().all_probed() {
                tracing::info!("Initial health check complete");
                self.state.mark_ready();
            }
            tracing::debug!(snapshot = ?self.state.snapshot(), "Current health table");

            let sleep_for = interval.saturating_sub(start.elapsed());
            tracing::debug!(sleep_secs = sleep_for.as_secs_f64(), "Health monitor sleeping");

            tokio::select! {
                _ = time::sleep(sleep_for) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every relay once, applying each result as soon as it arrives.
    pub async fn check_all(&self) {
        let mut probes: FuturesUnordered<_> = self
            .state
            .registry()
            .endpoints()
            .iter()
            .map(|endpoint| async move { (endpoint, self.prober.probe(endpoint).await) })
            .collect();

        while let Some((endpoint, result)) = probes.next().await {
            match &result {
                Ok(()) => tracing::debug!(endpoint = %endpoint, "Successfully connected relay"),
                Err(e) => tracing::warn!(endpoint = %endpoint, error = %e, "Unable to connect relay"),
            }
            self.apply(endpoint, result.is_ok());
        }
    }

    fn apply(&self, endpoint: &Endpoint, passed: bool) -> ProbeOutcome {
        let outcome = {
            let mut rng = rand::thread_rng();
            self.state.update(|snapshot| {
                apply_probe(snapshot, self.state.registry(), endpoint, passed, &mut rng)
            })
        };

        metrics::record_probe(endpoint.as_str(), passed);
        metrics::record_endpoint_health(endpoint.as_str(), outcome.healthy);

        if let Some(transition) = outcome.transition {
            match transition.to {
                HealthState::Healthy => {
                    tracing::info!(endpoint = %endpoint, from = ?transition.from, "Relay changed status to Healthy");
                }
                HealthState::Unhealthy => {
                    tracing::warn!(endpoint = %endpoint, from = ?transition.from, "Relay changed status to Unhealthy");
                }
                HealthState::Unknown => {}
            }
        }
        if let Some(failover) = &outcome.failover {
            tracing::warn!(
                from = %failover.from,
                to = %failover.to,
                "Active relay is no longer healthy, switched to a random healthy relay"
            );
            metrics::record_selection("failover");
        }
        outcome
    }
}
