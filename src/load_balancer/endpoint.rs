//! Relay endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single relay address
//! - Hold the immutable, non-empty registry of relays loaded at startup

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Serialize, Serializer};

/// A single relay, identified by its network address (host or IP).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(Arc::from(address.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Borrow<str> for Endpoint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// The fixed pool of candidate relays.
#[derive(Debug, Clone)]
pub struct Registry {
    endpoints: Vec<Endpoint>,
}

impl Registry {
    /// Build a registry. Returns `None` for an empty pool.
    pub fn new<I, S>(addresses: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints: Vec<Endpoint> = addresses.into_iter().map(Endpoint::new).collect();
        if endpoints.is_empty() {
            return None;
        }
        Some(Self { endpoints })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lookup(address).is_some()
    }

    /// Registry entry for an address, if the address is a known relay.
    pub fn lookup(&self, address: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|ep| ep.as_str() == address)
    }

    /// Uniformly random relay.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Endpoint {
        &self.endpoints[rng.gen_range(0..self.endpoints.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_registry_rejected() {
        assert!(Registry::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_lookup() {
        let registry = Registry::new(["10.0.0.1", "10.0.0.2"]).unwrap();
        assert_eq!(registry.endpoints().len(), 2);
        assert!(registry.contains("10.0.0.2"));
        assert!(!registry.contains("10.0.0.3"));
        assert_eq!(registry.lookup("10.0.0.1"), Some(&Endpoint::from("10.0.0.1")));
    }

    #[test]
    fn test_choose_covers_pool() {
        let registry = Registry::new(["a", "b", "c"]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(registry.choose(&mut rng).clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&Endpoint::from("10.0.0.1")).unwrap();
        assert_eq!(json, "\"10.0.0.1\"");
    }
}
