//! Path tracing and hop parsing.

pub mod parser;
pub mod resolver;
pub mod runner;

pub use parser::{parse_hop_line, parse_hops};
pub use resolver::HopResolver;
pub use runner::{
    run_program, SystemTracerouteRunner, TraceFlavor, TraceProgram, TraceSettings,
    TracerouteRunner,
};
