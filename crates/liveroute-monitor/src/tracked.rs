use liveroute_model::{ProcessAttribution, Route};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Destinations already handed to a trace during this process lifetime.
#[derive(Debug, Default)]
pub struct TrackedSet {
    addresses: Mutex<HashSet<String>>,
}

impl TrackedSet {
    /// Marks `address` as tracked. Returns `true` only for the first caller.
    pub fn mark(&self, address: &str) -> bool {
        let mut addresses = self.addresses.lock().unwrap_or_else(PoisonError::into_inner);
        if addresses.contains(address) {
            return false;
        }
        addresses.insert(address.to_string())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which processes talked through which hop. Only ever grows.
#[derive(Debug, Default)]
pub struct AttributionMap {
    inner: Mutex<ProcessAttribution>,
}

impl AttributionMap {
    pub fn merge(&self, route: &Route, process: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for hop in &route.hops {
            inner
                .entry(hop.ip().to_string())
                .or_default()
                .insert(process.to_string());
        }
    }

    pub fn snapshot(&self) -> ProcessAttribution {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
