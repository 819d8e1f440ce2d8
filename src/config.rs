//! Monitor configuration.
//!
//! One immutable `MonitorConfig` is loaded at startup and passed to every
//! component at construction; there is no ambient global state. Loads from
//! JSON with per-field defaults so a partial config file stays valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::geo::{BoundingBox, METERS_PER_DEGREE_LAT};

/// Earth circumference at the equator in meters (Web Mercator).
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

/// Fixed UI bands around the map view, in device pixels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UiMargins {
    /// Status bar and navigation chrome at the top
    pub top: u32,
    /// Button bar at the bottom
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Default for UiMargins {
    fn default() -> Self {
        Self {
            top: 200,
            bottom: 150,
            left: 50,
            right: 50,
        }
    }
}

/// Inclusive HSV range for one color mask.
///
/// Channels follow the OpenCV convention the ranges were tuned against:
/// hue in 0–180 (degrees / 2), saturation and value in 0–255.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        h >= self.lower[0]
            && h <= self.upper[0]
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }
}

/// Color ranges for the two hexagon fill shades on the heatmap.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ColorRanges {
    /// Saturated dark-orange fill (high demand)
    pub dark_orange: HsvRange,
    /// Lighter orange fill (elevated demand)
    pub orange: HsvRange,
}

impl Default for ColorRanges {
    fn default() -> Self {
        Self {
            dark_orange: HsvRange {
                lower: [10, 100, 100],
                upper: [25, 255, 255],
            },
            orange: HsvRange {
                lower: [15, 50, 150],
                upper: [35, 255, 255],
            },
        }
    }
}

/// Prediction engine parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Minimum training rows before forecasts stop being flagged low-confidence
    #[serde(default = "default_min_training_size")]
    pub min_training_size: usize,
    /// Retrain after this many newly recorded observations
    #[serde(default = "default_retrain_every")]
    pub retrain_every: usize,
    /// Observation window length for lag and moving-average features
    #[serde(default = "default_feature_window")]
    pub feature_window: usize,
    /// Coarse spatial grid for occupancy features and zone placement
    #[serde(default = "default_grid_rows")]
    pub grid_rows: usize,
    #[serde(default = "default_grid_cols")]
    pub grid_cols: usize,
    /// Number of bagged regressors in the ensemble
    #[serde(default = "default_ensemble_size")]
    pub ensemble_size: usize,
    /// Ridge regularization strength
    #[serde(default = "default_ridge_lambda")]
    pub ridge_lambda: f64,
    /// Seed for bootstrap resampling, kept fixed so retraining on an
    /// identical history is idempotent
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
    /// Default forecast horizon
    #[serde(default = "default_forecast_horizon_minutes")]
    pub forecast_horizon_minutes: i64,
}

fn default_min_training_size() -> usize {
    100
}

fn default_retrain_every() -> usize {
    12
}

fn default_feature_window() -> usize {
    6
}

fn default_grid_rows() -> usize {
    4
}

fn default_grid_cols() -> usize {
    4
}

fn default_ensemble_size() -> usize {
    8
}

fn default_ridge_lambda() -> f64 {
    1.0
}

fn default_rng_seed() -> u64 {
    42
}

fn default_forecast_horizon_minutes() -> i64 {
    30
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_training_size: default_min_training_size(),
            retrain_every: default_retrain_every(),
            feature_window: default_feature_window(),
            grid_rows: default_grid_rows(),
            grid_cols: default_grid_cols(),
            ensemble_size: default_ensemble_size(),
            ridge_lambda: default_ridge_lambda(),
            rng_seed: default_rng_seed(),
            forecast_horizon_minutes: default_forecast_horizon_minutes(),
        }
    }
}

/// Complete monitor configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Geographic rectangle constraining valid detections
    pub bounds: BoundingBox,
    /// Device screen width in pixels
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
    /// Device screen height in pixels
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
    /// UI chrome stripped from every capture
    #[serde(default)]
    pub ui_margins: UiMargins,
    /// Map zoom level the scale calibration assumes
    #[serde(default = "default_zoom_level")]
    pub zoom_level: u32,
    /// Overlap fraction between adjacent tiles in the pan sweep
    #[serde(default = "default_sweep_overlap")]
    pub sweep_overlap: f64,
    /// Minimum content dimensions after margin stripping; below this the
    /// tile is rejected as a resolution mismatch
    #[serde(default = "default_min_tile_dim")]
    pub min_tile_dim: u32,
    #[serde(default)]
    pub color_ranges: ColorRanges,
    /// Accepted hexagon area range in pixels
    #[serde(default = "default_hexagon_min_area")]
    pub hexagon_min_area: u32,
    #[serde(default = "default_hexagon_max_area")]
    pub hexagon_max_area: u32,
    /// Accepted bounding-box aspect ratio range; hexagons are near-square
    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f64,
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f64,
    /// Minimum fill ratio of the component within its bounding box
    #[serde(default = "default_min_solidity")]
    pub min_solidity: f64,
    /// Accepted contour compactness (4πA/P²) window, with P counted as
    /// exposed pixel edges. A regular hexagon scores ~0.59 on that
    /// estimate; the band rejects elongated and ragged artifacts.
    #[serde(default = "default_min_compactness")]
    pub min_compactness: f64,
    #[serde(default = "default_max_compactness")]
    pub max_compactness: f64,
    /// Minimum coefficient of variation of the boundary radius about the
    /// centroid. A disk scores near zero, a regular hexagon ~0.045; the
    /// floor rejects near-circular artifacts the compactness band cannot.
    #[serde(default = "default_min_radial_variation")]
    pub min_radial_variation: f64,
    /// Confidence multiplier for components touching the raster border
    #[serde(default = "default_border_penalty")]
    pub border_penalty: f64,
    /// Minimum centroid separation between distinct hot zones, in pixels
    #[serde(default = "default_min_separation_px")]
    pub min_separation_px: f64,
    /// Alignment search radius around the nominal tile offset, in pixels
    #[serde(default = "default_stitch_search_window")]
    pub stitch_search_window: u32,
    /// Correlation below this falls back to nominal placement (degraded)
    #[serde(default = "default_stitch_confidence_threshold")]
    pub stitch_confidence_threshold: f64,
    /// Per-cycle deadline; a cycle past it is abandoned with nothing persisted
    #[serde(default = "default_cycle_timeout_ms")]
    pub cycle_timeout_ms: u64,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

fn default_screen_width() -> u32 {
    1080
}

fn default_screen_height() -> u32 {
    2340
}

fn default_zoom_level() -> u32 {
    14
}

fn default_sweep_overlap() -> f64 {
    0.2
}

fn default_min_tile_dim() -> u32 {
    64
}

fn default_hexagon_min_area() -> u32 {
    50
}

fn default_hexagon_max_area() -> u32 {
    50_000
}

fn default_min_aspect_ratio() -> f64 {
    0.5
}

fn default_max_aspect_ratio() -> f64 {
    2.0
}

fn default_min_solidity() -> f64 {
    0.55
}

fn default_min_compactness() -> f64 {
    0.3
}

fn default_max_compactness() -> f64 {
    1.0
}

fn default_min_radial_variation() -> f64 {
    0.025
}

fn default_border_penalty() -> f64 {
    0.7
}

fn default_min_separation_px() -> f64 {
    50.0
}

fn default_stitch_search_window() -> u32 {
    8
}

fn default_stitch_confidence_threshold() -> f64 {
    0.6
}

fn default_cycle_timeout_ms() -> u64 {
    120_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            // Lhasa main urban area
            bounds: BoundingBox {
                north: 29.7000,
                south: 29.6000,
                east: 91.2000,
                west: 91.0500,
            },
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            ui_margins: UiMargins::default(),
            zoom_level: default_zoom_level(),
            sweep_overlap: default_sweep_overlap(),
            min_tile_dim: default_min_tile_dim(),
            color_ranges: ColorRanges::default(),
            hexagon_min_area: default_hexagon_min_area(),
            hexagon_max_area: default_hexagon_max_area(),
            min_aspect_ratio: default_min_aspect_ratio(),
            max_aspect_ratio: default_max_aspect_ratio(),
            min_solidity: default_min_solidity(),
            min_compactness: default_min_compactness(),
            max_compactness: default_max_compactness(),
            min_radial_variation: default_min_radial_variation(),
            border_penalty: default_border_penalty(),
            min_separation_px: default_min_separation_px(),
            stitch_search_window: default_stitch_search_window(),
            stitch_confidence_threshold: default_stitch_confidence_threshold(),
            cycle_timeout_ms: default_cycle_timeout_ms(),
            prediction: PredictionConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Loads configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: MonitorConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Map content width after UI margins are stripped.
    pub fn display_width(&self) -> u32 {
        self.screen_width
            .saturating_sub(self.ui_margins.left + self.ui_margins.right)
    }

    /// Map content height after UI margins are stripped.
    pub fn display_height(&self) -> u32 {
        self.screen_height
            .saturating_sub(self.ui_margins.top + self.ui_margins.bottom)
    }

    /// Ground meters covered by one screen pixel at the configured zoom,
    /// using the Web Mercator scale at the bounding-box center latitude.
    pub fn meters_per_pixel(&self) -> f64 {
        let lat = self.bounds.center().lat.to_radians();
        EARTH_CIRCUMFERENCE_M * lat.cos() / (256.0 * f64::powi(2.0, self.zoom_level as i32))
    }

    /// Degrees of latitude and longitude covered by one screen pixel.
    pub fn degrees_per_pixel(&self) -> (f64, f64) {
        let mpp = self.meters_per_pixel();
        let lat = self.bounds.center().lat.to_radians();
        let lat_per_px = mpp / METERS_PER_DEGREE_LAT;
        let lon_per_px = mpp / (METERS_PER_DEGREE_LAT * lat.cos());
        (lat_per_px, lon_per_px)
    }

    /// Pan step between adjacent tiles, in content pixels, leaving the
    /// configured overlap so nothing at the seam is missed.
    pub fn sweep_step(&self) -> (u32, u32) {
        let step_x = (self.display_width() as f64 * (1.0 - self.sweep_overlap)) as u32;
        let step_y = (self.display_height() as f64 * (1.0 - self.sweep_overlap)) as u32;
        (step_x.max(1), step_y.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_display_dimensions() {
        let config = MonitorConfig::default();
        assert_eq!(config.display_width(), 1080 - 50 - 50);
        assert_eq!(config.display_height(), 2340 - 200 - 150);
    }

    #[test]
    fn test_meters_per_pixel_zoom_14() {
        let config = MonitorConfig::default();
        // ~9.55 m/px at the equator for zoom 14, scaled by cos(29.65°) ≈ 0.869
        let mpp = config.meters_per_pixel();
        assert!(mpp > 8.0 && mpp < 9.0, "unexpected m/px: {}", mpp);
    }

    #[test]
    fn test_sweep_step_respects_overlap() {
        let config = MonitorConfig::default();
        let (step_x, step_y) = config.sweep_step();
        assert_eq!(step_x, (980.0 * 0.8) as u32);
        assert_eq!(step_y, (1990.0 * 0.8) as u32);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bounds": {{"north": 30.0, "south": 29.0, "east": 92.0, "west": 91.0}}, "zoom_level": 15}}"#
        )
        .unwrap();

        let config = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.zoom_level, 15);
        assert!((config.bounds.north - 30.0).abs() < 1e-9);
        // Unspecified fields fall back to defaults
        assert_eq!(config.screen_width, 1080);
        assert_eq!(config.hexagon_min_area, 50);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = MonitorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.screen_width, config.screen_width);
        assert_eq!(parsed.prediction.ensemble_size, config.prediction.ensemble_size);
        assert!((parsed.min_separation_px - config.min_separation_px).abs() < 1e-9);
    }

    #[test]
    fn test_hsv_range_contains() {
        let range = HsvRange {
            lower: [10, 100, 100],
            upper: [25, 255, 255],
        };
        assert!(range.contains(15, 200, 200));
        assert!(!range.contains(30, 200, 200));
        assert!(!range.contains(15, 50, 200));
    }
}
