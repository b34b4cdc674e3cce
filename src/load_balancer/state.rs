//! Shared selection state.
//!
//! # Responsibilities
//! - Hold the active relay and the per-relay health table
//! - Give every reader one consistent snapshot
//! - Make every write a single atomic update
//! - Carry the one-shot "first health pass complete" signal
//!
//! # Design Decisions
//! - Immutable snapshots behind `ArcSwap`; writers go through read-copy-update
//! - Readers (status API) never block writers
//! - Business rules live with the callers, not here

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::health::state::{EndpointHealth, HealthState};
use crate::load_balancer::endpoint::{Endpoint, Registry};

/// Point-in-time view of the selection.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Relay currently designated as the answer, if any was chosen yet.
    pub active: Option<Endpoint>,
    /// Health record per registry relay.
    pub health: BTreeMap<Endpoint, EndpointHealth>,
}

impl Snapshot {
    fn new(registry: &Registry, success_threshold: u32) -> Self {
        let health = registry
            .endpoints()
            .iter()
            .map(|ep| (ep.clone(), EndpointHealth::new(success_threshold)))
            .collect();
        Self {
            active: None,
            health,
        }
    }

    pub fn status(&self, endpoint: &str) -> Option<HealthState> {
        self.health.get(endpoint).map(EndpointHealth::status)
    }

    /// Relays currently classified Healthy, in registry order.
    pub fn healthy(&self) -> Vec<Endpoint> {
        self.health
            .iter()
            .filter(|(_, h)| h.is_healthy())
            .map(|(ep, _)| ep.clone())
            .collect()
    }

    pub fn unhealthy_count(&self) -> usize {
        self.health.values().filter(|h| h.is_unhealthy()).count()
    }

    /// True once every relay has been probed at least once.
    pub fn all_probed(&self) -> bool {
        self.health
            .values()
            .all(|h| h.status() != HealthState::Unknown)
    }
}

/// Concurrently shared `(active relay, health table)` record.
#[derive(Debug)]
pub struct SelectionState {
    registry: Registry,
    current: ArcSwap<Snapshot>,
    ready: watch::Sender<bool>,
}

impl SelectionState {
    pub fn new(registry: Registry, success_threshold: u32) -> Self {
        let snapshot = Snapshot::new(&registry, success_threshold);
        let (ready, _) = watch::channel(false);
        Self {
            registry,
            current: ArcSwap::from_pointee(snapshot),
            ready,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Atomic read of the whole record.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn active(&self) -> Option<Endpoint> {
        self.current.load().active.clone()
    }

    /// Atomic read-modify-write.
    ///
    /// `f` works on a private copy that replaces the current snapshot in one
    /// step. It may run more than once when writers race, so it must not have
    /// side effects beyond its return value.
    pub fn update<F, R>(&self, mut f: F) -> R
    where
        F: FnMut(&mut Snapshot) -> R,
    {
        let mut outcome = None;
        self.current.rcu(|current| {
            let mut next = Snapshot::clone(current);
            outcome = Some(f(&mut next));
            next
        });
        match outcome {
            Some(outcome) => outcome,
            None => unreachable!("rcu always runs the update at least once"),
        }
    }

    /// Atomic write of the active relay.
    pub fn set_active(&self, endpoint: Endpoint) {
        self.update(|snapshot| snapshot.active = Some(endpoint.clone()));
    }

    /// Atomic write of one relay's health record. Unknown relays are ignored.
    pub fn set_health(&self, endpoint: &Endpoint, health: EndpointHealth) {
        self.update(|snapshot| {
            if let Some(slot) = snapshot.health.get_mut(endpoint.as_str()) {
                *slot = health.clone();
            }
        });
    }

    /// Signal that the first full health pass has completed.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until [`mark_ready`](Self::mark_ready) has been called.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
