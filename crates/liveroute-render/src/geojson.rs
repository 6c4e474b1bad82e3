use liveroute_model::{EnrichedHop, ProcessAttribution, Route};
use serde_json::{json, Value};

/// One LineString per multi-hop route plus one Point per located hop.
pub fn routes_geojson(routes: &[Route], attribution: &ProcessAttribution) -> Value {
    let mut features = Vec::new();

    for (index, route) in routes.iter().enumerate() {
        if route.hops.len() >= 2 {
            let coordinates: Vec<Value> = route.hops.iter().map(position).collect();
            features.push(json!({
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": coordinates },
                "properties": {
                    "kind": "route",
                    "route": index,
                    "destination": route.destination,
                    "discovered_at_utc": route.discovered_at_utc,
                },
            }));
        }

        for hop in &route.hops {
            let processes: Vec<&str> = attribution
                .get(hop.ip())
                .map(|names| names.iter().map(String::as_str).collect())
                .unwrap_or_default();
            features.push(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": position(hop) },
                "properties": {
                    "kind": "hop",
                    "route": index,
                    "destination": route.destination,
                    "ip": hop.ip(),
                    "ttl": hop.hop.ttl,
                    "place": hop.location.place,
                    "rtt_ms": hop.hop.rtt_ms,
                    "processes": processes,
                },
            }));
        }
    }

    json!({ "type": "FeatureCollection", "features": features })
}

// GeoJSON positions are [longitude, latitude].
fn position(hop: &EnrichedHop) -> Value {
    json!([hop.location.longitude, hop.location.latitude])
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroute_model::{GeoPoint, Hop};
    use std::collections::BTreeSet;

    fn hop(ip: &str, lat: f64, lon: f64) -> EnrichedHop {
        EnrichedHop {
            hop: Hop {
                ttl: Some(1),
                ip: ip.to_string(),
                rtt_ms: vec![3.5],
            },
            location: GeoPoint {
                latitude: lat,
                longitude: lon,
                place: "Somewhere".to_string(),
            },
        }
    }

    #[test]
    fn single_hop_route_has_no_line() {
        let routes = vec![Route {
            destination: "1.1.1.1".to_string(),
            discovered_at_utc: String::new(),
            hops: vec![hop("1.1.1.1", -33.4, 143.2)],
        }];
        let doc = routes_geojson(&routes, &ProcessAttribution::new());
        let features = doc["features"].as_array().unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geometry"]["coordinates"], json!([143.2, -33.4]));
    }

    #[test]
    fn hops_carry_attributed_processes() {
        let routes = vec![Route {
            destination: "9.9.9.9".to_string(),
            discovered_at_utc: String::new(),
            hops: vec![hop("4.4.4.4", 1.0, 2.0), hop("9.9.9.9", 3.0, 4.0)],
        }];
        let mut attribution = ProcessAttribution::new();
        attribution.insert(
            "9.9.9.9".to_string(),
            BTreeSet::from(["curl".to_string(), "git".to_string()]),
        );

        let doc = routes_geojson(&routes, &attribution);
        let features = doc["features"].as_array().unwrap();

        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        assert_eq!(features[1]["properties"]["processes"], json!([]));
        assert_eq!(features[2]["properties"]["processes"], json!(["curl", "git"]));
        assert_eq!(features[2]["properties"]["rtt_ms"], json!([3.5]));
    }
}
