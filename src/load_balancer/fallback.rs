//! Fallback selection policies.
//!
//! Used whenever the metric-driven path cannot produce an answer, and directly
//! in random mode:
//! - random-healthy: uniform choice among Healthy relays, else random-any
//! - random-any: uniform choice among all relays, regardless of health
//!
//! Random-any always succeeds, so some relay is always published.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::load_balancer::endpoint::{Endpoint, Registry};
use crate::load_balancer::state::{SelectionState, Snapshot};

/// Pick a random Healthy relay from `snapshot`, or any relay if none is.
pub fn pick_random_healthy<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    registry: &Registry,
    rng: &mut R,
) -> Endpoint {
    match snapshot.healthy().choose(rng) {
        Some(endpoint) => endpoint.clone(),
        None => pick_random_any(registry, rng),
    }
}

/// Pick any relay from the registry.
pub fn pick_random_any<R: Rng + ?Sized>(registry: &Registry, rng: &mut R) -> Endpoint {
    registry.choose(rng).clone()
}

/// Random-healthy selection written to `state` as one atomic update.
pub fn random_healthy(state: &SelectionState) -> Endpoint {
    let mut rng = rand::thread_rng();
    let selected = state.update(|snapshot| {
        let selected = pick_random_healthy(snapshot, state.registry(), &mut rng);
        snapshot.active = Some(selected.clone());
        selected
    });
    tracing::debug!(endpoint = %selected, "Fallback random_healthy_server selected");
    selected
}

/// Random-any selection written to `state` as one atomic update.
pub fn random_any(state: &SelectionState) -> Endpoint {
    let mut rng = rand::thread_rng();
    let selected = state.update(|snapshot| {
        let selected = pick_random_any(state.registry(), &mut rng);
        snapshot.active = Some(selected.clone());
        selected
    });
    tracing::debug!(endpoint = %selected, "Fallback random_server selected");
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::EndpointHealth;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn probed(state: &SelectionState, results: &[(&str, bool)]) {
        for (endpoint, passed) in results {
            let mut health = EndpointHealth::new(1);
            health.record(*passed);
            state.set_health(&Endpoint::from(*endpoint), health);
        }
    }

    #[test]
    fn test_random_healthy_only_picks_healthy() {
        let state = SelectionState::new(Registry::new(["a", "b", "c"]).unwrap(), 1);
        probed(&state, &[("a", false), ("b", true), ("c", false)]);

        for _ in 0..50 {
            assert_eq!(random_healthy(&state), Endpoint::from("b"));
        }
        assert_eq!(state.active(), Some(Endpoint::from("b")));
    }

    #[test]
    fn test_random_healthy_falls_back_to_any() {
        let state = SelectionState::new(Registry::new(["a", "b"]).unwrap(), 1);
        probed(&state, &[("a", false), ("b", false)]);

        let selected = random_healthy(&state);
        assert!(state.registry().contains(selected.as_str()));
        assert_eq!(state.active(), Some(selected));
    }

    #[test]
    fn test_random_any_ignores_health() {
        let state = SelectionState::new(Registry::new(["a", "b"]).unwrap(), 1);
        probed(&state, &[("a", true), ("b", false)]);

        let mut picks = BTreeMap::new();
        for _ in 0..200 {
            *picks.entry(random_any(&state)).or_insert(0) += 1;
        }
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_pick_random_healthy_is_uniform() {
        let registry = Registry::new(["a", "b", "c"]).unwrap();
        let state = SelectionState::new(registry.clone(), 1);
        probed(&state, &[("a", true), ("b", true), ("c", false)]);
        let snapshot = state.snapshot();

        let mut rng = StdRng::seed_from_u64(42);
        let mut a = 0;
        for _ in 0..1_000 {
            match pick_random_healthy(&snapshot, &registry, &mut rng).as_str() {
                "a" => a += 1,
                "b" => {}
                other => panic!("unhealthy relay {other} selected"),
            }
        }
        assert!((400..600).contains(&a), "a picked {a} times");
    }
}
