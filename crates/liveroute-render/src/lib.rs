//! Map output for the route history.

pub mod geojson;
pub mod html;
pub mod image_out;
pub mod output;
pub mod writer;

pub use geojson::routes_geojson;
pub use html::render_html;
pub use image_out::{encode_png, render_png_map, MapSettings};
pub use output::write_atomic;
pub use writer::{MapOutputs, MapWriter};
