//! Connection monitoring and route history.

pub mod config;
pub mod connections;
pub mod history;
pub mod monitor;
pub mod shutdown;
pub mod tracked;

pub use config::MonitorConfig;
pub use connections::{traceable_remote, Connection, ConnectionSource, SystemConnections};
pub use history::RouteHistory;
pub use monitor::{Destination, Monitor, MonitorState, RouteRenderer};
pub use shutdown::ShutdownSignal;
pub use tracked::{AttributionMap, TrackedSet};
