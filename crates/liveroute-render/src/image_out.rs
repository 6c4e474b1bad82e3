use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use liveroute_model::Route;
use std::io::Cursor;

const OCEAN: Rgb<u8> = Rgb([18, 32, 54]);
const GRID: Rgb<u8> = Rgb([40, 60, 92]);
const HOP: Rgb<u8> = Rgb([235, 64, 52]);
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([86, 180, 233]),
    Rgb([240, 228, 66]),
    Rgb([0, 158, 115]),
    Rgb([230, 159, 0]),
    Rgb([204, 121, 167]),
    Rgb([213, 94, 0]),
];

#[derive(Debug, Clone)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
    /// Graticule spacing in degrees; zero disables it.
    pub grid_degrees: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 720,
            grid_degrees: 30,
        }
    }
}

/// Equirectangular preview: one polyline per route, a dot per hop.
pub fn render_png_map(routes: &[Route], settings: &MapSettings) -> RgbImage {
    let width = settings.width.max(2);
    let height = settings.height.max(2);
    let mut image = RgbImage::from_pixel(width, height, OCEAN);

    if settings.grid_degrees > 0 {
        draw_graticule(&mut image, settings.grid_degrees);
    }

    for (index, route) in routes.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let points: Vec<(i64, i64)> = route
            .hops
            .iter()
            .map(|hop| project(hop.location.latitude, hop.location.longitude, width, height))
            .collect();

        for pair in points.windows(2) {
            draw_line(&mut image, pair[0], pair[1], color);
        }
        for point in &points {
            draw_dot(&mut image, *point, HOP);
        }
    }

    image
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("failed to encode png")?;
    Ok(buf)
}

fn project(latitude: f64, longitude: f64, width: u32, height: u32) -> (i64, i64) {
    let lat = latitude.clamp(-90.0, 90.0);
    let lon = longitude.clamp(-180.0, 180.0);
    let x = (lon + 180.0) / 360.0 * f64::from(width - 1);
    let y = (90.0 - lat) / 180.0 * f64::from(height - 1);
    (x.round() as i64, y.round() as i64)
}

fn draw_graticule(image: &mut RgbImage, step: u32) {
    let (width, height) = image.dimensions();
    let step = step as usize;

    for lon in (-180..=180).step_by(step) {
        let (x, _) = project(0.0, f64::from(lon), width, height);
        draw_line(image, (x, 0), (x, i64::from(height) - 1), GRID);
    }
    for lat in (-90..=90).step_by(step) {
        let (_, y) = project(f64::from(lat), 0.0, width, height);
        draw_line(image, (0, y), (i64::from(width) - 1, y), GRID);
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(image.width()) && y < i64::from(image.height()) {
        image.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham
fn draw_line(image: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x, y, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_dot(image: &mut RgbImage, center: (i64, i64), color: Rgb<u8>) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            put(image, center.0 + dx, center.1 + dy, color);
        }
    }
}
