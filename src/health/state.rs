//! Relay health state machine.
//!
//! # States
//! - Unknown: not probed yet
//! - Healthy: relay may be selected
//! - Unhealthy: relay excluded from selection
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy | Unhealthy: first probe result decides directly
//! Healthy   → Unhealthy: success_threshold consecutive failed probes
//! Unhealthy → Healthy: success_threshold consecutive passed probes
//! ```
//!
//! A single counter tracks both directions. It sits at 0 while healthy and at
//! `success_threshold` while unhealthy; every contrary probe moves it one step
//! towards the other end, every agreeing probe one step back. Status only
//! flips when the counter reaches an end, which makes the required results
//! consecutive.

use serde::Serialize;

/// Health classification of one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// A status change produced by [`EndpointHealth::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Hysteresis record for one relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointHealth {
    status: HealthState,
    /// `None` until the first probe.
    failed_checks: Option<u32>,
    success_threshold: u32,
}

impl EndpointHealth {
    pub fn new(success_threshold: u32) -> Self {
        Self {
            status: HealthState::Unknown,
            failed_checks: None,
            success_threshold: success_threshold.max(1),
        }
    }

    pub fn status(&self) -> HealthState {
        self.status
    }

    pub fn failed_checks(&self) -> Option<u32> {
        self.failed_checks
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthState::Unhealthy
    }

    /// Apply one probe result. Returns the status change, if any.
    pub fn record(&mut self, passed: bool) -> Option<Transition> {
        let threshold = self.success_threshold;

        let counter = match self.failed_checks {
            None => {
                if passed {
                    0
                } else {
                    threshold
                }
            }
            Some(current) if passed => {
                if current == 0 {
                    0
                } else if self.status == HealthState::Healthy {
                    // Healthy with a non-zero counter cannot come from a
                    // normal sequence; restore the invariant.
                    0
                } else {
                    current - 1
                }
            }
            Some(current) => {
                if current >= threshold {
                    threshold
                } else if self.status == HealthState::Unhealthy {
                    threshold
                } else {
                    current + 1
                }
            }
        };
        self.failed_checks = Some(counter);

        let next = if counter == 0 {
            HealthState::Healthy
        } else if counter == threshold {
            HealthState::Unhealthy
        } else {
            self.status
        };

        if next == self.status {
            return None;
        }
        let transition = Transition {
            from: self.status,
            to: next,
        };
        self.status = next;
        Some(transition)
    }
}
