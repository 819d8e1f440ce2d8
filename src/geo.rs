//! WGS84 geographic primitives.
//!
//! All coordinates are WGS84 decimal degrees. The bounding box is the single
//! configured rectangle that constrains valid detections; everything outside
//! it is discarded by the detector.

use serde::{Deserialize, Serialize};

/// Meters per degree of latitude (WGS84 approximation).
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// A point in WGS84 decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geographic rectangle constraining valid detections.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Whether a point lies inside the box (edges inclusive).
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat <= self.north && p.lat >= self.south && p.lon <= self.east && p.lon >= self.west
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    /// Index of the coarse grid cell containing `p`, row-major from the
    /// north-west corner, or None if the point is outside the box.
    ///
    /// Used for spatial occupancy features and frequency-based zone placement.
    pub fn grid_cell(&self, p: GeoPoint, rows: usize, cols: usize) -> Option<usize> {
        if !self.contains(p) || rows == 0 || cols == 0 {
            return None;
        }
        let row_f = (self.north - p.lat) / self.lat_span() * rows as f64;
        let col_f = (p.lon - self.west) / self.lon_span() * cols as f64;
        let row = (row_f as usize).min(rows - 1);
        let col = (col_f as usize).min(cols - 1);
        Some(row * cols + col)
    }

    /// Center point of a grid cell index produced by [`grid_cell`].
    ///
    /// [`grid_cell`]: BoundingBox::grid_cell
    pub fn grid_cell_center(&self, index: usize, rows: usize, cols: usize) -> GeoPoint {
        let row = index / cols;
        let col = index % cols;
        GeoPoint::new(
            self.north - (row as f64 + 0.5) / rows as f64 * self.lat_span(),
            self.west + (col as f64 + 0.5) / cols as f64 * self.lon_span(),
        )
    }
}
