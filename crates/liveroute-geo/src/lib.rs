//! Hop geolocation.

pub mod client;
pub mod enrich;

pub use client::{
    is_routable, parse_address, GeoLocator, GeoSettings, IpApiLocator, DEFAULT_URL_TEMPLATE,
};
pub use enrich::HopEnricher;
