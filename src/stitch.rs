//! Composite map reconstruction from overlapping sweep tiles.
//!
//! Tiles are placed at their nominal sweep offsets, then refined by a bounded
//! normalized cross-correlation search over the overlap strip. When the best
//! correlation stays below the configured threshold the tile falls back to
//! nominal placement and the seam is counted as degraded: logged, never
//! fatal. Tiles are pasted in capture order, so in overlaps the most recently
//! captured tile wins.

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::capture::{NormalizedTile, SweepPlan};
use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// Minimum number of already-painted pixels required for a meaningful
/// correlation score.
const MIN_OVERLAP_SAMPLES: u32 = 64;

/// One reconstructed raster covering the bounding box.
///
/// Owned by a single stitcher run and dropped after hand-off to the detector.
#[derive(Debug)]
pub struct CompositeMap {
    pub image: RgbaImage,
    /// Seams where alignment fell back to nominal placement
    pub degraded_seams: u32,
}

impl CompositeMap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Stitches an ordered tile sequence into one composite raster.
#[derive(Clone, Debug)]
pub struct MapStitcher {
    plan: SweepPlan,
    search_window: i32,
    confidence_threshold: f64,
}

impl MapStitcher {
    pub fn new(config: &MonitorConfig, plan: SweepPlan) -> Self {
        Self {
            plan,
            search_window: config.stitch_search_window as i32,
            confidence_threshold: config.stitch_confidence_threshold,
        }
    }

    /// Composes tiles in capture order. Deterministic for a fixed order.
    pub fn stitch(&self, tiles: &[NormalizedTile]) -> Result<CompositeMap, MonitorError> {
        if tiles.is_empty() {
            return Err(MonitorError::InvalidTile("no tiles to stitch".to_string()));
        }
        for tile in tiles {
            let (w, h) = tile.image.dimensions();
            if w != self.plan.tile_width || h != self.plan.tile_height {
                return Err(MonitorError::InvalidTile(format!(
                    "tile at r{}c{} is {}x{}, sweep plan expects {}x{}",
                    tile.offset.row, tile.offset.col, w, h, self.plan.tile_width, self.plan.tile_height
                )));
            }
        }

        let (canvas_w, canvas_h) = self.plan.composite_size();
        let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, Rgba([0, 0, 0, 0]));
        let mut degraded = 0u32;

        for tile in tiles {
            let (nominal_x, nominal_y) = self.plan.nominal_position(tile.offset);
            let has_overlap = tile.offset.row > 0 || tile.offset.col > 0;

            let (dx, dy) = if has_overlap {
                match self.align_tile(&canvas, tile, nominal_x, nominal_y) {
                    Some(delta) => delta,
                    None => {
                        warn!(
                            row = tile.offset.row,
                            col = tile.offset.col,
                            "stitch degraded: alignment below threshold, using nominal offset"
                        );
                        degraded += 1;
                        (0, 0)
                    }
                }
            } else {
                (0, 0)
            };

            paste(&mut canvas, &tile.image, nominal_x as i64 + dx as i64, nominal_y as i64 + dy as i64);
        }

        debug!(
            tiles = tiles.len(),
            degraded, "composite assembled: {}x{}", canvas_w, canvas_h
        );
        Ok(CompositeMap {
            image: canvas,
            degraded_seams: degraded,
        })
    }

    /// Searches a bounded window around the nominal offset for the placement
    /// that best correlates the tile's overlap strip with the canvas content
    /// painted so far. Returns None when no placement reaches the threshold.
    fn align_tile(
        &self,
        canvas: &RgbaImage,
        tile: &NormalizedTile,
        nominal_x: u32,
        nominal_y: u32,
    ) -> Option<(i32, i32)> {
        // Compare against the strip that overlaps the previously pasted
        // neighbor: left strip when continuing a row, top strip otherwise.
        let overlap_x = self.plan.tile_width.saturating_sub(self.plan.step_x).max(4);
        let overlap_y = self.plan.tile_height.saturating_sub(self.plan.step_y).max(4);
        let (strip_w, strip_h) = if tile.offset.col > 0 {
            (overlap_x, self.plan.tile_height)
        } else {
            (self.plan.tile_width, overlap_y)
        };

        let mut best_score = f64::NEG_INFINITY;
        let mut best_delta = (0, 0);
        for dy in -self.search_window..=self.search_window {
            for dx in -self.search_window..=self.search_window {
                let cx = nominal_x as i64 + dx as i64;
                let cy = nominal_y as i64 + dy as i64;
                if let Some(score) = strip_correlation(canvas, &tile.image, strip_w, strip_h, cx, cy)
                {
                    // Strict > keeps the search deterministic: the first of
                    // equal scores (smallest dy, then dx) wins.
                    if score > best_score {
                        best_score = score;
                        best_delta = (dx, dy);
                    }
                }
            }
        }

        if best_score >= self.confidence_threshold {
            debug!(
                row = tile.offset.row,
                col = tile.offset.col,
                dx = best_delta.0,
                dy = best_delta.1,
                score = best_score,
                "tile aligned"
            );
            Some(best_delta)
        } else {
            None
        }
    }
}

/// ITU-R BT.601 luminance of one pixel.
fn luminance(p: &Rgba<u8>) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

/// Normalized cross-correlation between the tile's top-left strip of
/// `strip_w` x `strip_h` and the canvas at (`cx`, `cy`). Only pixels the
/// canvas has already painted (alpha > 0) participate. Returns None when the
/// overlap is too small or either side has no contrast.
fn strip_correlation(
    canvas: &RgbaImage,
    tile: &RgbaImage,
    strip_w: u32,
    strip_h: u32,
    cx: i64,
    cy: i64,
) -> Option<f64> {
    let mut tile_vals = Vec::new();
    let mut canvas_vals = Vec::new();

    for ty in 0..strip_h {
        for tx in 0..strip_w {
            let px = cx + tx as i64;
            let py = cy + ty as i64;
            if px < 0 || py < 0 || px >= canvas.width() as i64 || py >= canvas.height() as i64 {
                continue;
            }
            let canvas_pixel = canvas.get_pixel(px as u32, py as u32);
            if canvas_pixel[3] == 0 {
                continue;
            }
            tile_vals.push(luminance(tile.get_pixel(tx, ty)));
            canvas_vals.push(luminance(canvas_pixel));
        }
    }

    let n = tile_vals.len();
    if (n as u32) < MIN_OVERLAP_SAMPLES {
        return None;
    }

    let mean_t: f64 = tile_vals.iter().sum::<f64>() / n as f64;
    let mean_c: f64 = canvas_vals.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_t = 0.0;
    let mut var_c = 0.0;
    for i in 0..n {
        let dt = tile_vals[i] - mean_t;
        let dc = canvas_vals[i] - mean_c;
        cov += dt * dc;
        var_t += dt * dt;
        var_c += dc * dc;
    }

    // Featureless overlap (uniform background) carries no alignment signal.
    if var_t < f64::EPSILON || var_c < f64::EPSILON {
        return None;
    }
    Some(cov / (var_t.sqrt() * var_c.sqrt()))
}

/// Copies `tile` onto `canvas` with its top-left at (`x`, `y`), clipping at
/// the canvas edges.
fn paste(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    for (tx, ty, pixel) in tile.enumerate_pixels() {
        let px = x + tx as i64;
        let py = y + ty as i64;
        if px >= 0 && py >= 0 && px < canvas.width() as i64 && py < canvas.height() as i64 {
            canvas.put_pixel(px as u32, py as u32, *pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TileOffset;
    use chrono::Utc;
    use image::RgbaImage;

    fn textured_scene(width: u32, height: u32) -> RgbaImage {
        // Deterministic high-contrast texture so correlation has signal
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 251) as u8;
            Rgba([v, v.wrapping_mul(3), v.wrapping_add(40), 255])
        })
    }

    fn tile_from_scene(scene: &RgbaImage, x: u32, y: u32, w: u32, h: u32, offset: TileOffset) -> NormalizedTile {
        NormalizedTile {
            image: image::imageops::crop_imm(scene, x, y, w, h).to_image(),
            offset,
            captured_at: Utc::now(),
        }
    }

    fn small_plan() -> SweepPlan {
        SweepPlan {
            rows: 1,
            cols: 2,
            step_x: 80,
            step_y: 80,
            tile_width: 100,
            tile_height: 100,
        }
    }

    #[test]
    fn test_stitch_rejects_empty_input() {
        let config = MonitorConfig::default();
        let stitcher = MapStitcher::new(&config, small_plan());
        assert!(matches!(
            stitcher.stitch(&[]),
            Err(MonitorError::InvalidTile(_))
        ));
    }

    #[test]
    fn test_stitch_recovers_pan_error() {
        let config = MonitorConfig::default();
        let plan = small_plan();
        let stitcher = MapStitcher::new(&config, plan);

        let scene = textured_scene(200, 100);
        let left = tile_from_scene(&scene, 0, 0, 100, 100, TileOffset { row: 0, col: 0 });
        // Second tile captured 3px short of its nominal 80px pan
        let right = tile_from_scene(&scene, 77, 0, 100, 100, TileOffset { row: 0, col: 1 });

        let composite = stitcher.stitch(&[left, right]).unwrap();
        assert_eq!(composite.degraded_seams, 0);

        // Aligned placement reproduces the scene where both tiles landed
        for x in 10..170u32 {
            for y in 10..90u32 {
                assert_eq!(
                    composite.image.get_pixel(x, y),
                    scene.get_pixel(x, y),
                    "mismatch at ({}, {})",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_featureless_overlap_degrades_to_nominal() {
        let config = MonitorConfig::default();
        let plan = small_plan();
        let stitcher = MapStitcher::new(&config, plan);

        let flat = RgbaImage::from_pixel(100, 100, Rgba([90, 90, 90, 255]));
        let tiles = vec![
            NormalizedTile {
                image: flat.clone(),
                offset: TileOffset { row: 0, col: 0 },
                captured_at: Utc::now(),
            },
            NormalizedTile {
                image: flat,
                offset: TileOffset { row: 0, col: 1 },
                captured_at: Utc::now(),
            },
        ];

        let composite = stitcher.stitch(&tiles).unwrap();
        // No contrast means no alignment signal: nominal placement, one degraded seam
        assert_eq!(composite.degraded_seams, 1);
        assert_eq!(composite.image.dimensions(), (180, 100));
    }

    #[test]
    fn test_later_tile_wins_in_overlap() {
        let config = MonitorConfig::default();
        let plan = small_plan();
        let stitcher = MapStitcher::new(&config, plan);

        // Distinct flat colors: featureless, so both land at nominal offsets
        let first = RgbaImage::from_pixel(100, 100, Rgba([10, 10, 10, 255]));
        let second = RgbaImage::from_pixel(100, 100, Rgba([200, 200, 200, 255]));
        let tiles = vec![
            NormalizedTile {
                image: first,
                offset: TileOffset { row: 0, col: 0 },
                captured_at: Utc::now(),
            },
            NormalizedTile {
                image: second,
                offset: TileOffset { row: 0, col: 1 },
                captured_at: Utc::now(),
            },
        ];

        let composite = stitcher.stitch(&tiles).unwrap();
        // Overlap columns 80..100 hold the most recently captured tile
        assert_eq!(composite.image.get_pixel(90, 50)[0], 200);
        assert_eq!(composite.image.get_pixel(50, 50)[0], 10);
    }

    #[test]
    fn test_mismatched_tile_dimensions_rejected() {
        let config = MonitorConfig::default();
        let stitcher = MapStitcher::new(&config, small_plan());
        let tiles = vec![NormalizedTile {
            image: RgbaImage::new(64, 64),
            offset: TileOffset { row: 0, col: 0 },
            captured_at: Utc::now(),
        }];
        assert!(matches!(
            stitcher.stitch(&tiles),
            Err(MonitorError::InvalidTile(_))
        ));
    }
}
