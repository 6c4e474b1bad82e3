use crate::config::MonitorConfig;
use crate::connections::{ConnectionSource, SystemConnections};
use crate::history::RouteHistory;
use crate::shutdown::ShutdownSignal;
use crate::tracked::{AttributionMap, TrackedSet};
use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use liveroute_geo::{HopEnricher, IpApiLocator};
use liveroute_model::{ProcessAttribution, Route, UNKNOWN_PROCESS};
use liveroute_trace::HopResolver;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Consumer of the route history, called after every successful append.
pub trait RouteRenderer: Send + Sync {
    fn render(&self, routes: &[Route], attribution: &ProcessAttribution) -> Result<()>;
}

impl<F> RouteRenderer for F
where
    F: Fn(&[Route], &ProcessAttribution) -> Result<()> + Send + Sync,
{
    fn render(&self, routes: &[Route], attribution: &ProcessAttribution) -> Result<()> {
        self(routes, attribution)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Polling,
    Dispatching,
}

impl MonitorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MonitorState::Polling,
            2 => MonitorState::Dispatching,
            _ => MonitorState::Idle,
        }
    }
}

/// A newly seen remote endpoint awaiting its trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub address: String,
    pub process: Option<String>,
}

pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn ConnectionSource>,
    resolver: HopResolver,
    enricher: HopEnricher,
    renderer: Option<Arc<dyn RouteRenderer>>,
    render_lock: Mutex<()>,
    tracked: TrackedSet,
    history: RouteHistory,
    attribution: AttributionMap,
    state: AtomicU8,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn ConnectionSource>,
        resolver: HopResolver,
        enricher: HopEnricher,
    ) -> Self {
        let history = RouteHistory::new(config.history_capacity);
        Self {
            config,
            source,
            resolver,
            enricher,
            renderer: None,
            render_lock: Mutex::new(()),
            tracked: TrackedSet::default(),
            history,
            attribution: AttributionMap::default(),
            state: AtomicU8::new(MonitorState::Idle as u8),
        }
    }

    /// Monitor backed by the OS connection table, the host tracer and the
    /// configured geolocation service.
    pub fn system(config: MonitorConfig) -> Result<Self> {
        let resolver = HopResolver::system(config.trace.clone());
        let locator = Arc::new(IpApiLocator::new(&config.geo));
        let enricher = HopEnricher::new(locator, config.lookup_workers)?;
        Ok(Self::new(
            config,
            Arc::new(SystemConnections::new()),
            resolver,
            enricher,
        ))
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RouteRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn history(&self) -> &RouteHistory {
        &self.history
    }

    pub fn tracked(&self) -> &TrackedSet {
        &self.tracked
    }

    pub fn attribution(&self) -> ProcessAttribution {
        self.attribution.snapshot()
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: MonitorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Reads the connection table once and returns endpoints never seen
    /// before. They are marked tracked before this returns.
    pub fn poll_once(&self) -> Result<Vec<Destination>> {
        self.set_state(MonitorState::Polling);
        let connections = self.source.established();
        self.set_state(MonitorState::Idle);

        let mut fresh = Vec::new();
        for conn in connections? {
            let address = conn.remote.to_canonical().to_string();
            if !self.tracked.mark(&address) {
                continue;
            }

            let process = if self.config.attribute_processes {
                conn.pid.and_then(|pid| self.source.process_name(pid))
            } else {
                None
            };
            debug!("new destination {address} ({})", process.as_deref().unwrap_or(UNKNOWN_PROCESS));
            fresh.push(Destination { address, process });
        }

        Ok(fresh)
    }

    /// Trace, geolocate and record one destination. Returns the appended
    /// route, or `None` when nothing along the path could be located.
    pub fn process(&self, destination: &Destination) -> Option<Route> {
        let address = destination.address.as_str();
        info!("tracing route to {address}");

        let hops = self.resolver.trace(address);
        if hops.is_empty() {
            return None;
        }

        let located = self.enricher.enrich(&hops);
        if located.is_empty() {
            info!("no locatable hops towards {address}; route discarded");
            return None;
        }

        let route = Route {
            destination: address.to_string(),
            discovered_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            hops: located,
        };

        if self.config.attribute_processes {
            let process = destination.process.as_deref().unwrap_or(UNKNOWN_PROCESS);
            self.attribution.merge(&route, process);
        }

        self.history.append(route.clone());
        info!(
            "route to {address}: {}/{} hops located",
            route.hops.len(),
            hops.len()
        );
        self.notify();
        Some(route)
    }

    fn notify(&self) {
        let Some(renderer) = &self.renderer else {
            return;
        };

        let _guard = self.render_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let routes = self.history.snapshot();
        let attribution = self.attribution.snapshot();
        if let Err(err) = renderer.render(&routes, &attribution) {
            warn!("failed to render routes: {err:#}");
        }
    }

    /// Runs the poll loop on a background thread.
    pub fn spawn(self: Arc<Self>, shutdown: Arc<ShutdownSignal>) -> Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("connection-monitor".to_string())
            .spawn(move || self.run(shutdown))
            .context("failed to spawn monitor thread")
    }

    /// Polls until `shutdown` fires, handing new destinations to a fixed
    /// pool of trace workers. Returns once every worker has finished.
    pub fn run(self: Arc<Self>, shutdown: Arc<ShutdownSignal>) -> Result<()> {
        let (tx, rx) = mpsc::channel::<Destination>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..self.config.trace_workers.max(1))
            .map(|index| {
                let monitor = Arc::clone(&self);
                let rx = Arc::clone(&rx);
                let shutdown = Arc::clone(&shutdown);
                thread::Builder::new()
                    .name(format!("trace-worker-{index}"))
                    .spawn(move || monitor.work(&rx, &shutdown))
                    .context("failed to spawn trace worker")
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "monitoring connections every {:?} with {} trace workers",
            self.config.poll_interval,
            workers.len()
        );

        while !shutdown.is_triggered() {
            match self.poll_once() {
                Ok(fresh) => {
                    self.set_state(MonitorState::Dispatching);
                    for destination in fresh {
                        if tx.send(destination).is_err() {
                            warn!("trace workers are gone; stopping");
                            shutdown.trigger();
                            break;
                        }
                    }
                }
                Err(err) => warn!("connection poll failed: {err:#}"),
            }
            self.set_state(MonitorState::Idle);

            if shutdown.wait(self.config.poll_interval) {
                break;
            }
        }

        drop(tx);
        let mut panicked = 0;
        for worker in workers {
            if worker.join().is_err() {
                panicked += 1;
            }
        }
        info!("stopped monitoring ({} routes kept)", self.history.len());

        if panicked > 0 {
            return Err(anyhow!("{panicked} trace workers panicked"));
        }
        Ok(())
    }

    fn work(&self, rx: &Mutex<Receiver<Destination>>, shutdown: &ShutdownSignal) {
        loop {
            let next = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
            let Ok(destination) = next else {
                return;
            };
            if shutdown.is_triggered() {
                debug!("shutting down; skipping {}", destination.address);
                continue;
            }
            self.process(&destination);
        }
    }
}
