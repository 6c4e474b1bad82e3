use crate::geojson::routes_geojson;
use crate::html::render_html;
use crate::image_out::{encode_png, render_png_map, MapSettings};
use crate::output::write_atomic;
use anyhow::Result;
use liveroute_model::{ProcessAttribution, Route};
use log::debug;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct MapOutputs {
    pub html: PathBuf,
    pub geojson: PathBuf,
    pub png: PathBuf,
}

/// Rewrites the map artifacts in one directory from a history snapshot.
#[derive(Debug, Clone)]
pub struct MapWriter {
    outputs: MapOutputs,
    settings: MapSettings,
}

impl MapWriter {
    pub fn new(out_dir: &Path, settings: MapSettings) -> Self {
        Self {
            outputs: MapOutputs {
                html: out_dir.join("live_routes.html"),
                geojson: out_dir.join("live_routes.geojson"),
                png: out_dir.join("live_routes.png"),
            },
            settings,
        }
    }

    pub fn outputs(&self) -> &MapOutputs {
        &self.outputs
    }

    pub fn write(&self, routes: &[Route], attribution: &ProcessAttribution) -> Result<()> {
        let geojson = serde_json::to_vec_pretty(&routes_geojson(routes, attribution))?;
        write_atomic(&self.outputs.geojson, &geojson)?;

        write_atomic(&self.outputs.html, render_html(routes, attribution).as_bytes())?;

        let png = encode_png(&render_png_map(routes, &self.settings))?;
        write_atomic(&self.outputs.png, &png)?;

        debug!("map updated with {} routes", routes.len());
        Ok(())
    }
}
