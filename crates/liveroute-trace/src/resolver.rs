use crate::parser::parse_hops;
use crate::runner::{SystemTracerouteRunner, TraceSettings, TracerouteRunner};
use liveroute_model::Hop;
use log::{debug, warn};
use std::sync::Arc;

/// Turns a destination into its hop sequence. Failures of the tracer are
/// logged and reported as an empty trace.
#[derive(Clone)]
pub struct HopResolver {
    runner: Arc<dyn TracerouteRunner>,
    settings: TraceSettings,
}

impl HopResolver {
    pub fn new(runner: Arc<dyn TracerouteRunner>, settings: TraceSettings) -> Self {
        Self { runner, settings }
    }

    pub fn system(settings: TraceSettings) -> Self {
        Self::new(Arc::new(SystemTracerouteRunner::default()), settings)
    }

    pub fn trace(&self, destination: &str) -> Vec<Hop> {
        let raw = match self.runner.run(destination, &self.settings) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("trace to {destination} failed: {err:#}");
                return Vec::new();
            }
        };

        let hops = parse_hops(&raw);
        if hops.is_empty() {
            warn!("trace to {destination} produced no parsable hops");
        } else {
            debug!("trace to {destination}: {} hops", hops.len());
        }
        hops
    }
}
