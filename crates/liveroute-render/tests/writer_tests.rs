use liveroute_model::{EnrichedHop, GeoPoint, Hop, ProcessAttribution, Route};
use liveroute_render::{write_atomic, MapSettings, MapWriter};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn scratch_dir(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("liveroute-{name}-{}-{stamp}", std::process::id()))
}

fn route(destination: &str, points: &[(&str, f64, f64)]) -> Route {
    Route {
        destination: destination.to_string(),
        discovered_at_utc: "2026-02-01T12:00:00Z".to_string(),
        hops: points
            .iter()
            .enumerate()
            .map(|(i, (ip, lat, lon))| EnrichedHop {
                hop: Hop {
                    ttl: Some(i as u32 + 1),
                    ip: ip.to_string(),
                    rtt_ms: vec![1.0 + i as f64],
                },
                location: GeoPoint {
                    latitude: *lat,
                    longitude: *lon,
                    place: "Somewhere".to_string(),
                },
            })
            .collect(),
    }
}

#[test]
fn writer_produces_all_artifacts() {
    let dir = scratch_dir("writer");
    let writer = MapWriter::new(
        &dir,
        MapSettings {
            width: 64,
            height: 32,
            grid_degrees: 30,
        },
    );
    let routes = vec![
        route("93.184.216.34", &[("4.4.4.4", 51.5, -0.1), ("93.184.216.34", 40.1, -75.3)]),
        route("1.1.1.1", &[("1.1.1.1", -33.4, 143.2)]),
    ];

    writer.write(&routes, &ProcessAttribution::new()).unwrap();

    let outputs = writer.outputs();
    let geojson: serde_json::Value =
        serde_json::from_slice(&fs::read(&outputs.geojson).unwrap()).unwrap();
    assert_eq!(geojson["type"], "FeatureCollection");
    assert_eq!(geojson["features"].as_array().unwrap().len(), 4);

    let html = fs::read_to_string(&outputs.html).unwrap();
    assert!(html.contains("LiveRoute (2 routes)"));

    let png = image::open(&outputs.png).unwrap();
    assert_eq!((png.width(), png.height()), (64, 32));

    let leftovers: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn atomic_write_replaces_existing_file() {
    let dir = scratch_dir("atomic");
    let path = dir.join("nested").join("out.txt");

    write_atomic(&path, b"first").unwrap();
    write_atomic(&path, b"second").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    fs::remove_dir_all(&dir).unwrap();
}
