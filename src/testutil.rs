//! Shared synthetic fixtures for tests: map backgrounds and hexagon markers.

use image::{Rgba, RgbaImage};

/// Deep orange used by the heatmap's high-demand hexagons. Hue lands at ~12
/// on the OpenCV scale, inside the dark-orange range only.
pub(crate) const DEEP_ORANGE: Rgba<u8> = Rgba([255, 100, 0, 255]);

/// Grayscale map texture with enough contrast for alignment, zero
/// saturation so it never leaks into a color mask.
pub(crate) fn textured_map(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = 150 + ((x * 11 + y * 17) % 80) as u8;
        Rgba([v, v, v, 255])
    })
}

/// Paints a filled regular hexagon (pointy-top) centered at (cx, cy).
pub(crate) fn draw_hexagon(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let vertices: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let angle = std::f64::consts::PI / 3.0 * i as f64 + std::f64::consts::PI / 6.0;
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect();

    let min_x = (cx - radius).floor().max(0.0) as u32;
    let max_x = (cx + radius).ceil().min(img.width() as f64 - 1.0) as u32;
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_y = (cy + radius).ceil().min(img.height() as f64 - 1.0) as u32;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if point_in_convex_polygon(x as f64 + 0.5, y as f64 + 0.5, &vertices) {
                img.put_pixel(x, y, color);
            }
        }
    }
}

fn point_in_convex_polygon(px: f64, py: f64, vertices: &[(f64, f64)]) -> bool {
    let n = vertices.len();
    let mut sign = 0.0f64;
    for i in 0..n {
        let (x1, y1) = vertices[i];
        let (x2, y2) = vertices[(i + 1) % n];
        let cross = (x2 - x1) * (py - y1) - (y2 - y1) * (px - x1);
        if cross.abs() < 1e-12 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}
