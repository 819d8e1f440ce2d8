//! Tile types and UI-chrome stripping.

use chrono::{DateTime, Utc};
use image::{imageops, RgbaImage};

use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// Position of a tile within the pan sweep grid (row 0 / col 0 is the
/// north-west corner of the bounding box).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileOffset {
    pub row: u32,
    pub col: u32,
}

/// One raw screen capture, UI chrome included.
#[derive(Clone, Debug)]
pub struct Tile {
    pub image: RgbaImage,
    pub offset: TileOffset,
    pub captured_at: DateTime<Utc>,
}

/// A tile with the UI bands removed; content pixels only.
#[derive(Clone, Debug)]
pub struct NormalizedTile {
    pub image: RgbaImage,
    pub offset: TileOffset,
    pub captured_at: DateTime<Utc>,
}

/// Strips the fixed UI bands from raw captures.
#[derive(Clone, Debug)]
pub struct TileNormalizer {
    config: MonitorConfig,
}

impl TileNormalizer {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Crops the configured UI margins off a raw capture.
    ///
    /// Fails with `InvalidTile` when the capture is smaller than the margins
    /// or the remaining content falls below the configured minimum, which
    /// indicates a resolution mismatch with the configured screen geometry.
    pub fn normalize(&self, tile: Tile) -> Result<NormalizedTile, MonitorError> {
        let (width, height) = tile.image.dimensions();
        let margins = &self.config.ui_margins;

        let horizontal = margins.left + margins.right;
        let vertical = margins.top + margins.bottom;
        if width <= horizontal || height <= vertical {
            return Err(MonitorError::InvalidTile(format!(
                "capture {}x{} smaller than UI margins",
                width, height
            )));
        }

        let content_w = width - horizontal;
        let content_h = height - vertical;
        if content_w < self.config.min_tile_dim || content_h < self.config.min_tile_dim {
            return Err(MonitorError::InvalidTile(format!(
                "content {}x{} below minimum {} (resolution mismatch?)",
                content_w, content_h, self.config.min_tile_dim
            )));
        }

        let cropped =
            imageops::crop_imm(&tile.image, margins.left, margins.top, content_w, content_h)
                .to_image();

        Ok(NormalizedTile {
            image: cropped,
            offset: tile.offset,
            captured_at: tile.captured_at,
        })
    }
}
