use liveroute_geo::GeoSettings;
use liveroute_trace::TraceSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Routes kept before the oldest is evicted.
    pub history_capacity: usize,
    /// Destinations traced at the same time.
    pub trace_workers: usize,
    /// Geolocation requests in flight at the same time, across all traces.
    pub lookup_workers: usize,
    pub attribute_processes: bool,
    pub trace: TraceSettings,
    pub geo: GeoSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            history_capacity: 100,
            trace_workers: 4,
            lookup_workers: 8,
            attribute_processes: true,
            trace: TraceSettings::default(),
            geo: GeoSettings::default(),
        }
    }
}
