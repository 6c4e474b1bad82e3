use crate::geojson::routes_geojson;
use liveroute_model::{ProcessAttribution, Route};

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Self-contained Leaflet page with the route history inlined as GeoJSON.
pub fn render_html(routes: &[Route], attribution: &ProcessAttribution) -> String {
    let data = routes_geojson(routes, attribution).to_string();
    // Keep the inline document from closing its own <script> element.
    let data = data.replace("</", "<\\/");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>LiveRoute ({count} routes)</title>
<link rel="stylesheet" href="{css}">
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script src="{js}"></script>
<script>
const routes = {data};
const map = L.map("map", {{ worldCopyJump: true }}).setView([0, 0], 2);
L.tileLayer("https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
  maxZoom: 18,
  attribution: "&copy; OpenStreetMap contributors"
}}).addTo(map);

function popup(props) {{
  const root = document.createElement("div");
  const rows = [
    ["Hop", props.ip],
    ["Place", props.place],
    ["RTT", props.rtt_ms.length ? props.rtt_ms.join(" / ") + " ms" : "unknown"],
    ["Destination", props.destination],
    ["Processes", props.processes.length ? props.processes.join(", ") : "Unknown"]
  ];
  for (const [label, value] of rows) {{
    const row = document.createElement("div");
    const name = document.createElement("b");
    name.textContent = label + ": ";
    row.appendChild(name);
    row.appendChild(document.createTextNode(String(value)));
    root.appendChild(row);
  }}
  return root;
}}

L.geoJSON(routes, {{
  style: () => ({{ color: "blue", weight: 2.5, opacity: 1 }}),
  pointToLayer: (feature, latlng) => L.circleMarker(latlng, {{ radius: 4, color: "crimson" }}),
  onEachFeature: (feature, layer) => {{
    if (feature.properties.kind === "hop") {{
      layer.bindPopup(() => popup(feature.properties));
    }} else {{
      layer.bindTooltip(feature.properties.destination);
    }}
  }}
}}).addTo(map);
</script>
</body>
</html>
"#,
        count = routes.len(),
        css = LEAFLET_CSS,
        js = LEAFLET_JS,
        data = data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroute_model::{EnrichedHop, GeoPoint, Hop};

    #[test]
    fn page_embeds_routes() {
        let routes = vec![Route {
            destination: "93.184.216.34".to_string(),
            discovered_at_utc: String::new(),
            hops: vec![EnrichedHop {
                hop: Hop {
                    ttl: Some(2),
                    ip: "93.184.216.34".to_string(),
                    rtt_ms: vec![15.4],
                },
                location: GeoPoint {
                    latitude: 40.1,
                    longitude: -75.3,
                    place: "</script><b>".to_string(),
                },
            }],
        }];

        let page = render_html(&routes, &ProcessAttribution::new());

        assert!(page.contains("LiveRoute (1 routes)"));
        assert!(page.contains("93.184.216.34"));
        assert!(page.contains(LEAFLET_JS));
        assert_eq!(page.matches("</script>").count(), 2);
    }
}
