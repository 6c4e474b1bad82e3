//! Shared data structures for LiveRoute.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One line of path-tracer output that carried an address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hop {
    pub ttl: Option<u32>,
    pub ip: String,
    pub rtt_ms: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
}

/// A hop whose address resolved to a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedHop {
    #[serde(flatten)]
    pub hop: Hop,
    #[serde(flatten)]
    pub location: GeoPoint,
}

impl EnrichedHop {
    pub fn ip(&self) -> &str {
        &self.hop.ip
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.location.latitude, self.location.longitude)
    }
}

/// Resolvable hops towards one destination, in trace order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub destination: String,
    pub discovered_at_utc: String,
    pub hops: Vec<EnrichedHop>,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Hop address -> names of processes whose connections crossed it.
pub type ProcessAttribution = BTreeMap<String, BTreeSet<String>>;

pub const UNKNOWN_PROCESS: &str = "Unknown";
