//! Sweep planning: how many tiles cover the bounding box, and where.
//!
//! The device controller pans the map in row-major order from the north-west
//! corner, stepping by the display size minus the configured overlap. The
//! stitcher trusts these nominal offsets and only refines them locally.

use crate::capture::TileOffset;
use crate::config::MonitorConfig;

/// Grid of capture positions covering the configured bounding box.
#[derive(Clone, Copy, Debug)]
pub struct SweepPlan {
    pub rows: u32,
    pub cols: u32,
    /// Pan step between adjacent columns, in content pixels
    pub step_x: u32,
    /// Pan step between adjacent rows, in content pixels
    pub step_y: u32,
    /// Content dimensions of one normalized tile
    pub tile_width: u32,
    pub tile_height: u32,
}

impl SweepPlan {
    /// Computes the grid needed to cover the bounding box at the configured
    /// zoom level, overlap included.
    pub fn for_config(config: &MonitorConfig) -> Self {
        let (lat_per_px, lon_per_px) = config.degrees_per_pixel();
        let (step_x, step_y) = config.sweep_step();

        // Degrees advanced by one pan step
        let step_lon = step_x as f64 * lon_per_px;
        let step_lat = step_y as f64 * lat_per_px;

        let cols = (config.bounds.lon_span() / step_lon).ceil().max(1.0) as u32;
        let rows = (config.bounds.lat_span() / step_lat).ceil().max(1.0) as u32;

        Self {
            rows,
            cols,
            step_x,
            step_y,
            tile_width: config.display_width(),
            tile_height: config.display_height(),
        }
    }

    /// Capture order: row-major from the north-west corner.
    pub fn offsets(&self) -> Vec<TileOffset> {
        let mut offsets = Vec::with_capacity((self.rows * self.cols) as usize);
        for row in 0..self.rows {
            for col in 0..self.cols {
                offsets.push(TileOffset { row, col });
            }
        }
        offsets
    }

    /// Pixel dimensions of the composite the sweep produces.
    pub fn composite_size(&self) -> (u32, u32) {
        (
            self.step_x * (self.cols - 1) + self.tile_width,
            self.step_y * (self.rows - 1) + self.tile_height,
        )
    }

    /// Nominal top-left pixel position of a tile within the composite.
    pub fn nominal_position(&self, offset: TileOffset) -> (u32, u32) {
        (offset.col * self.step_x, offset.row * self.step_y)
    }
}
