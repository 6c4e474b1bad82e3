use crate::client::GeoLocator;
use anyhow::{Context, Result};
use liveroute_model::{EnrichedHop, GeoPoint, Hop};
use log::debug;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Geolocates the hops of one trace in parallel on a bounded pool.
#[derive(Clone)]
pub struct HopEnricher {
    locator: Arc<dyn GeoLocator>,
    pool: Arc<rayon::ThreadPool>,
}

impl HopEnricher {
    pub fn new(locator: Arc<dyn GeoLocator>, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("geo-lookup-{index}"))
            .build()
            .context("failed to build geolocation pool")?;
        Ok(Self {
            locator,
            pool: Arc::new(pool),
        })
    }

    /// Returns the located hops in input order. Hops whose lookup came back
    /// empty are dropped. Each distinct address is queried once per call.
    pub fn enrich(&self, hops: &[Hop]) -> Vec<EnrichedHop> {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = hops
            .iter()
            .map(|hop| hop.ip.as_str())
            .filter(|ip| seen.insert(*ip))
            .collect();

        let located: Vec<Option<GeoPoint>> = self.pool.install(|| {
            distinct
                .par_iter()
                .map(|ip| self.locator.locate(ip))
                .collect()
        });

        let by_address: HashMap<&str, GeoPoint> = distinct
            .into_iter()
            .zip(located)
            .filter_map(|(ip, point)| point.map(|point| (ip, point)))
            .collect();

        let enriched: Vec<EnrichedHop> = hops
            .iter()
            .filter_map(|hop| {
                by_address.get(hop.ip.as_str()).map(|location| EnrichedHop {
                    hop: hop.clone(),
                    location: location.clone(),
                })
            })
            .collect();

        debug!("located {}/{} hops", enriched.len(), hops.len());
        enriched
    }
}
