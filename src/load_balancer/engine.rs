//! Periodic active-relay selection.
//!
//! # Responsibilities
//! - Wait for the first complete health pass
//! - Every `interval_minutes`, pick the active relay:
//!   - random mode: random healthy relay
//!   - prometheus mode: relay with the lowest mean metric value
//! - Degrade to the fallback policies whenever metrics cannot decide
//!
//! # Fallback Cascade
//! ```text
//! no healthy relay          → random_any
//! one healthy relay         → that relay (no query)
//! query error / no series   → random_healthy
//! series for unknown relay  → random_healthy (logged as error)
//! too few samples for all   → random_healthy
//! otherwise                 → lowest mean, ties broken at random
//! winner no longer healthy  → random_healthy, in the publishing update
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::{Algorithm, LoadBalancerConfig};
use crate::health::state::HealthState;
use crate::load_balancer::endpoint::{Endpoint, Registry};
use crate::load_balancer::fallback;
use crate::load_balancer::metrics_source::{render_query, MetricsSource, RangeQuery, Series};
use crate::load_balancer::state::SelectionState;
use crate::observability::metrics;

/// Why a relay was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Random mode.
    Random,
    /// Metric comparison picked the lowest mean.
    LowestMean,
    /// Only one relay was healthy.
    SingleHealthy,
    /// No relay was healthy.
    AllUnhealthy,
    /// The metrics query failed.
    QueryFailed,
    /// The query returned no series.
    NoData,
    /// A series could not be matched to a relay.
    UnknownSeries,
    /// No relay had enough samples.
    InsufficientData,
    /// The chosen relay stopped being healthy before it could be published.
    HealthChanged,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Random => "random",
            Outcome::LowestMean => "lowest_mean",
            Outcome::SingleHealthy => "single_healthy",
            Outcome::AllUnhealthy => "all_unhealthy",
            Outcome::QueryFailed => "query_failed",
            Outcome::NoData => "no_data",
            Outcome::UnknownSeries => "unknown_series",
            Outcome::InsufficientData => "insufficient_data",
            Outcome::HealthChanged => "health_changed",
        }
    }
}

/// Result of one selection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub endpoint: Endpoint,
    pub outcome: Outcome,
}

/// A series whose labels name no registry relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSeries {
    pub labels: BTreeMap<String, String>,
}

/// Group samples per healthy relay, dropping relays with fewer than
/// `min_samples` finite values.
pub fn collect_samples(
    series: Vec<Series>,
    registry: &Registry,
    healthy: &[Endpoint],
    min_samples: usize,
) -> Result<BTreeMap<Endpoint, Vec<f64>>, UnknownSeries> {
    let mut samples = BTreeMap::new();

    for series in series {
        let endpoint = series
            .labels
            .values()
            .find_map(|value| registry.lookup(value))
            .cloned();
        let Some(endpoint) = endpoint else {
            return Err(UnknownSeries {
                labels: series.labels,
            });
        };

        if !healthy.contains(&endpoint) {
            tracing::debug!(endpoint = %endpoint, "Ignoring series for relay outside the healthy set");
            continue;
        }

        let values: Vec<f64> = series.values.into_iter().filter(|v| v.is_finite()).collect();
        if values.len() < min_samples {
            tracing::info!(
                endpoint = %endpoint,
                count = values.len(),
                required = min_samples,
                "Not enough data points, ignoring relay"
            );
            continue;
        }
        samples.insert(endpoint, values);
    }

    Ok(samples)
}

/// Relay with the lowest arithmetic mean; ties are broken uniformly at random.
pub fn lowest_mean<R: Rng + ?Sized>(
    samples: &BTreeMap<Endpoint, Vec<f64>>,
    rng: &mut R,
) -> Option<(Endpoint, f64)> {
    let means: Vec<(&Endpoint, f64)> = samples
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(ep, values)| (ep, values.iter().sum::<f64>() / values.len() as f64))
        .collect();

    let min = means
        .iter()
        .map(|(_, mean)| *mean)
        .fold(f64::INFINITY, f64::min);

    let best: Vec<&(&Endpoint, f64)> = means.iter().filter(|(_, mean)| *mean == min).collect();
    tracing::debug!(candidates = best.len(), mean = min, "Best relays by mean");

    best.choose(rng).map(|&&(ep, mean)| (ep.clone(), mean))
}

/// The selection loop.
pub struct SelectionEngine<M> {
    state: Arc<SelectionState>,
    config: LoadBalancerConfig,
    source: M,
}

impl<M: MetricsSource> SelectionEngine<M> {
    pub fn new(state: Arc<SelectionState>, config: LoadBalancerConfig, source: M) -> Self {
        Self {
            state,
            config,
            source,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            algorithm = ?self.config.algorithm,
            interval_minutes = self.config.interval_minutes,
            "Selection engine waiting for initial health check"
        );

        tokio::select! {
            _ = self.state.wait_ready() => {}
            _ = shutdown.recv() => {
                tracing::info!("Selection engine received shutdown signal, exiting loop");
                return;
            }
        }

        let interval = self.config.interval();
        loop {
            let start = Instant::now();
            self.select_once().await;

            let sleep_for = interval.saturating_sub(start.elapsed());
            tracing::debug!(sleep_secs = sleep_for.as_secs_f64(), "Selection engine sleeping");

            tokio::select! {
                _ = time::sleep(sleep_for) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Selection engine received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one selection cycle and publish the result.
    pub async fn select_once(&self) -> Selection {
        let selection = match self.config.algorithm {
            Algorithm::Random => Selection {
                endpoint: fallback::random_healthy(&self.state),
                outcome: Outcome::Random,
            },
            Algorithm::Prometheus => self.select_by_metrics().await,
        };

        metrics::record_selection(selection.outcome.as_str());
        tracing::info!(
            endpoint = %selection.endpoint,
            outcome = selection.outcome.as_str(),
            "Active relay selected"
        );
        selection
    }

    async fn select_by_metrics(&self) -> Selection {
        let healthy = self.state.snapshot().healthy();
        match healthy.as_slice() {
            [] => {
                tracing::warn!("All relays are unhealthy, using fallback: random_server");
                return Selection {
                    endpoint: fallback::random_any(&self.state),
                    outcome: Outcome::AllUnhealthy,
                };
            }
            [only] => {
                tracing::debug!(endpoint = %only, "Only 1 healthy relay exists, skipping metrics query");
                return self.publish(only.clone(), Outcome::SingleHealthy);
            }
            _ => {}
        }

        let query = RangeQuery::lookback(
            render_query(&self.config.prometheus.query, &healthy),
            self.config.lookback(),
        );
        let started = Instant::now();
        let result = self.source.query_range(&query).await;
        metrics::record_query_duration(started);

        let series = match result {
            Ok(series) if series.is_empty() => {
                tracing::warn!(
                    query = %query.query,
                    "No hits for query, using fallback: random_healthy_server"
                );
                return self.fallback(Outcome::NoData);
            }
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Error querying Prometheus, using fallback: random_healthy_server"
                );
                return self.fallback(Outcome::QueryFailed);
            }
        };

        let min_samples = usize::try_from(self.config.duration_minutes).unwrap_or(usize::MAX);
        let samples = match collect_samples(series, self.state.registry(), &healthy, min_samples) {
            Ok(samples) => samples,
            Err(unknown) => {
                tracing::error!(
                    labels = ?unknown.labels,
                    query = %query.query,
                    "Unable to identify relay from metric labels, check the Prometheus query \
                     and turn.address_mapping; using fallback: random_healthy_server"
                );
                return self.fallback(Outcome::UnknownSeries);
            }
        };

        let winner = {
            let mut rng = rand::thread_rng();
            lowest_mean(&samples, &mut rng)
        };
        match winner {
            Some((endpoint, mean)) => {
                tracing::debug!(endpoint = %endpoint, mean, "Lowest mean relay");
                self.publish(endpoint, Outcome::LowestMean)
            }
            None => {
                tracing::warn!("Not enough metrics, using fallback: random_healthy_server");
                self.fallback(Outcome::InsufficientData)
            }
        }
    }

    /// Publish `candidate` if it is still Healthy in the current table.
    /// Otherwise publish a random healthy relay in the same update.
    fn publish(&self, candidate: Endpoint, outcome: Outcome) -> Selection {
        let mut rng = rand::thread_rng();
        let selection = self.state.update(|snapshot| {
            let selection = if snapshot.status(candidate.as_str()) == Some(HealthState::Healthy) {
                Selection {
                    endpoint: candidate.clone(),
                    outcome,
                }
            } else {
                Selection {
                    endpoint: fallback::pick_random_healthy(snapshot, self.state.registry(), &mut rng),
                    outcome: Outcome::HealthChanged,
                }
            };
            snapshot.active = Some(selection.endpoint.clone());
            selection
        });

        if selection.outcome == Outcome::HealthChanged {
            tracing::warn!(
                endpoint = %candidate,
                "Selected relay is no longer healthy, using fallback: random_healthy_server"
            );
        }
        selection
    }

    fn fallback(&self, outcome: Outcome) -> Selection {
        Selection {
            endpoint: fallback::random_healthy(&self.state),
            outcome,
        }
    }
}
