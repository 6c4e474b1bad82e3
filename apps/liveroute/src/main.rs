use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use liveroute_geo::{GeoLocator, GeoSettings, HopEnricher, IpApiLocator, DEFAULT_URL_TEMPLATE};
use liveroute_model::{ProcessAttribution, Route};
use liveroute_monitor::{Monitor, MonitorConfig, ShutdownSignal};
use liveroute_render::{MapSettings, MapWriter};
use liveroute_trace::{HopResolver, TraceSettings};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "liveroute", version, about = "Trace and map the routes of live connections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Monitor(MonitorArgs),
    Trace(TraceArgs),
    Locate(LocateArgs),
}

#[derive(Args)]
struct TraceOpts {
    #[arg(long, default_value_t = 30)]
    max_hops: u32,

    #[arg(long, default_value_t = 3)]
    probes: u32,

    #[arg(long, default_value_t = 2000)]
    wait_ms: u64,

    /// Kill a tracer run after this many seconds (0 waits forever)
    #[arg(long, default_value_t = 90)]
    trace_timeout_secs: u64,
}

impl TraceOpts {
    fn settings(&self) -> TraceSettings {
        TraceSettings {
            max_hops: self.max_hops,
            probes: self.probes,
            wait_ms: self.wait_ms,
            run_timeout: (self.trace_timeout_secs > 0)
                .then(|| Duration::from_secs(self.trace_timeout_secs)),
        }
    }
}

#[derive(Args)]
struct GeoOpts {
    /// Lookup URL; `{ip}` is replaced by the hop address
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    geo_url: String,

    #[arg(long, default_value_t = 5000)]
    geo_timeout_ms: u64,

    #[arg(long, default_value_t = 8)]
    lookup_workers: usize,
}

impl GeoOpts {
    fn settings(&self) -> GeoSettings {
        GeoSettings {
            url_template: self.geo_url.clone(),
            timeout: Duration::from_millis(self.geo_timeout_ms),
            ..GeoSettings::default()
        }
    }
}

#[derive(Args)]
#[command(
    about = "Watch established connections and map the route to every new destination. Only trace networks you are permitted to probe."
)]
struct MonitorArgs {
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    #[arg(long, default_value_t = 100)]
    capacity: usize,

    #[arg(long, default_value_t = 4)]
    trace_workers: usize,

    #[arg(long)]
    no_attribution: bool,

    #[arg(long, default_value_t = 1440)]
    map_width: u32,

    #[arg(long, default_value_t = 720)]
    map_height: u32,

    #[command(flatten)]
    trace: TraceOpts,

    #[command(flatten)]
    geo: GeoOpts,
}

#[derive(Args)]
#[command(about = "Trace one destination and print its located route as JSON")]
struct TraceArgs {
    target: String,

    #[command(flatten)]
    trace: TraceOpts,

    #[command(flatten)]
    geo: GeoOpts,
}

#[derive(Args)]
#[command(about = "Geolocate one address and print the result as JSON")]
struct LocateArgs {
    address: String,

    #[command(flatten)]
    geo: GeoOpts,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor(args) => run_monitor(args),
        Commands::Trace(args) => run_trace(args),
        Commands::Locate(args) => run_locate(args),
    }
}

fn run_monitor(args: MonitorArgs) -> Result<()> {
    let config = MonitorConfig {
        poll_interval: Duration::from_secs(args.interval_secs.max(1)),
        history_capacity: args.capacity,
        trace_workers: args.trace_workers,
        lookup_workers: args.geo.lookup_workers,
        attribute_processes: !args.no_attribution,
        trace: args.trace.settings(),
        geo: args.geo.settings(),
    };

    let writer = MapWriter::new(
        &args.out_dir,
        MapSettings {
            width: args.map_width,
            height: args.map_height,
            ..MapSettings::default()
        },
    );
    info!("map will be written to {:?}", writer.outputs().html);

    let render = move |routes: &[Route], attribution: &ProcessAttribution| -> Result<()> {
        writer.write(routes, attribution)
    };
    let monitor = Arc::new(Monitor::system(config)?.with_renderer(Arc::new(render)));

    let shutdown = Arc::new(ShutdownSignal::default());
    let on_interrupt = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("interrupt received; finishing in-flight traces");
        on_interrupt.trigger();
    })
    .context("failed to install interrupt handler")?;

    info!("monitoring network connections; press Ctrl+C to stop");
    let handle = Arc::clone(&monitor).spawn(shutdown)?;
    handle
        .join()
        .map_err(|_| anyhow!("monitor thread panicked"))?
}

fn run_trace(args: TraceArgs) -> Result<()> {
    let resolver = HopResolver::system(args.trace.settings());
    let locator = Arc::new(IpApiLocator::new(&args.geo.settings()));
    let enricher = HopEnricher::new(locator, args.geo.lookup_workers)?;

    let hops = resolver.trace(&args.target);
    if hops.is_empty() {
        return Err(anyhow!("no hops traced to {}", args.target));
    }

    let located = enricher.enrich(&hops);
    if located.is_empty() {
        return Err(anyhow!(
            "none of the {} hops to {} could be located",
            hops.len(),
            args.target
        ));
    }

    let route = Route {
        destination: args.target,
        discovered_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        hops: located,
    };
    println!("{}", serde_json::to_string_pretty(&route)?);
    Ok(())
}

fn run_locate(args: LocateArgs) -> Result<()> {
    let locator = IpApiLocator::new(&args.geo.settings());
    let point = locator
        .locate(&args.address)
        .ok_or_else(|| anyhow!("no location for {}", args.address))?;
    println!("{}", serde_json::to_string_pretty(&point)?);
    Ok(())
}
