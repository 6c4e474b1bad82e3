use anyhow::{Context, Result};
use liveroute_model::GeoPoint;
use log::debug;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// `{ip}` is replaced by the queried address. Only coordinates and place
/// components are requested.
pub const DEFAULT_URL_TEMPLATE: &str =
    "http://ip-api.com/json/{ip}?fields=lat,lon,city,countryCode";

const SENTINELS: &[&str] = &["*", "request timed out", "request timed out."];

pub trait GeoLocator: Send + Sync {
    /// Location of `address`, or `None` for any failure.
    fn locate(&self, address: &str) -> Option<GeoPoint>;
}

#[derive(Debug, Clone)]
pub struct GeoSettings {
    pub url_template: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            timeout: Duration::from_secs(5),
            user_agent: concat!("liveroute/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP client for ip-api.com compatible services. No retries, no caching.
pub struct IpApiLocator {
    agent: ureq::Agent,
    url_template: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

impl LookupResponse {
    fn into_point(self) -> Option<GeoPoint> {
        let latitude = self.lat.filter(|v| v.is_finite())?;
        let longitude = self.lon.filter(|v| v.is_finite())?;
        Some(GeoPoint {
            latitude,
            longitude,
            place: place_name(self.city.as_deref(), self.country_code.as_deref()),
        })
    }
}

impl IpApiLocator {
    pub fn new(settings: &GeoSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(&settings.user_agent)
            .build();
        Self {
            agent,
            url_template: settings.url_template.clone(),
        }
    }

    pub fn url_for(&self, ip: &IpAddr) -> String {
        self.url_template.replace("{ip}", &ip.to_string())
    }

    fn fetch(&self, ip: &IpAddr) -> Result<Option<GeoPoint>> {
        let url = self.url_for(ip);
        let response: LookupResponse = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("request to {url} failed"))?
            .into_json()
            .with_context(|| format!("malformed response from {url}"))?;
        Ok(response.into_point())
    }
}

impl GeoLocator for IpApiLocator {
    fn locate(&self, address: &str) -> Option<GeoPoint> {
        let ip = parse_address(address)?;
        if !is_routable(&ip) {
            debug!("skipping lookup for non-routable {ip}");
            return None;
        }

        match self.fetch(&ip) {
            Ok(Some(point)) => Some(point),
            Ok(None) => {
                debug!("no coordinates for {ip}");
                None
            }
            Err(err) => {
                debug!("lookup for {ip} failed: {err:#}");
                None
            }
        }
    }
}

/// Rejects tracer placeholders and anything that is not an IP literal.
pub fn parse_address(address: &str) -> Option<IpAddr> {
    let trimmed = address.trim();
    if trimmed.is_empty() || SENTINELS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }
    trimmed.parse().ok()
}

pub fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_routable_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_routable_v4(&v4),
            None => is_routable_v6(v6),
        },
    }
}

fn is_routable_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (b & 0xc0) == 64;
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || shared)
}

fn is_routable_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

fn place_name(city: Option<&str>, country: Option<&str>) -> String {
    let parts: Vec<&str> = [city, country]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        "Unknown".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_not_addresses() {
        assert!(parse_address("*").is_none());
        assert!(parse_address("Request timed out").is_none());
        assert!(parse_address("").is_none());
        assert!(parse_address("gw.example.net").is_none());
        assert!(parse_address(" 93.184.216.34 ").is_some());
    }

    #[test]
    fn private_ranges_are_not_routable() {
        for addr in ["10.0.0.1", "192.168.1.1", "172.16.4.4", "127.0.0.1", "100.64.0.1", "169.254.1.1", "fe80::1", "fd00::5", "::1"] {
            let ip: IpAddr = addr.parse().unwrap();
            assert!(!is_routable(&ip), "{addr} should not be routable");
        }
        for addr in ["93.184.216.34", "1.1.1.1", "2606:4700:4700::1111"] {
            let ip: IpAddr = addr.parse().unwrap();
            assert!(is_routable(&ip), "{addr} should be routable");
        }
    }

    #[test]
    fn place_name_degrades() {
        assert_eq!(place_name(Some("Norwell"), Some("US")), "Norwell, US");
        assert_eq!(place_name(None, Some("US")), "US");
        assert_eq!(place_name(Some(" "), None), "Unknown");
    }

    #[test]
    fn response_without_coordinates_is_absent() {
        let response: LookupResponse =
            serde_json::from_str(r#"{"lat":40.1,"city":"Norwell"}"#).unwrap();
        assert!(response.into_point().is_none());

        let response: LookupResponse =
            serde_json::from_str(r#"{"lat":40.1,"lon":-75.3,"city":"Norwell","countryCode":"US"}"#)
                .unwrap();
        let point = response.into_point().unwrap();
        assert_eq!(point.place, "Norwell, US");
    }

    #[test]
    fn url_template_substitutes_address() {
        let locator = IpApiLocator::new(&GeoSettings::default());
        let ip: IpAddr = "93.184.216.34".parse().unwrap();
        assert_eq!(
            locator.url_for(&ip),
            "http://ip-api.com/json/93.184.216.34?fields=lat,lon,city,countryCode"
        );
    }
}
