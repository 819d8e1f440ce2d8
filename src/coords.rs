//! Calibrated pixel ↔ geographic coordinate conversion.
//!
//! The transform is a pure axis-aligned affine: one reference pixel with a
//! known WGS84 fix plus a degrees-per-pixel scale. Device orientation is
//! fixed, so there is no rotation term, and forward/inverse are exact
//! algebraic inverses of each other.

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::geo::{BoundingBox, GeoPoint};

/// Affine pixel↔geo transform for one composite raster.
///
/// Pixel y grows southward, so latitude decreases as y increases.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CoordinateMapper {
    reference_px: (f64, f64),
    reference_geo: GeoPoint,
    lat_per_px: f64,
    lon_per_px: f64,
}

impl CoordinateMapper {
    /// Calibrates from one reference pixel with a known fix and a
    /// degrees-per-pixel scale (typically the device GPS marker mapped to
    /// its on-screen position).
    ///
    /// Fails with `Calibration` when either scale is zero or not finite;
    /// a broken calibration must never silently degrade geo accuracy.
    pub fn from_reference(
        reference_px: (f64, f64),
        reference_geo: GeoPoint,
        lat_per_px: f64,
        lon_per_px: f64,
    ) -> Result<Self, MonitorError> {
        if lat_per_px == 0.0 || lon_per_px == 0.0 {
            return Err(MonitorError::Calibration(
                "degrees-per-pixel scale is zero".to_string(),
            ));
        }
        if !lat_per_px.is_finite()
            || !lon_per_px.is_finite()
            || !reference_geo.lat.is_finite()
            || !reference_geo.lon.is_finite()
        {
            return Err(MonitorError::Calibration(
                "non-finite calibration input".to_string(),
            ));
        }
        Ok(Self {
            reference_px,
            reference_geo,
            lat_per_px,
            lon_per_px,
        })
    }

    /// Maps a composite raster of the given dimensions onto the bounding
    /// box: pixel (0, 0) is the north-west corner.
    pub fn for_composite(
        bounds: &BoundingBox,
        width: u32,
        height: u32,
    ) -> Result<Self, MonitorError> {
        if width == 0 || height == 0 {
            return Err(MonitorError::Calibration(format!(
                "degenerate raster {}x{}",
                width, height
            )));
        }
        Self::from_reference(
            (0.0, 0.0),
            GeoPoint::new(bounds.north, bounds.west),
            bounds.lat_span() / height as f64,
            bounds.lon_span() / width as f64,
        )
    }

    /// Forward transform: pixel position to WGS84.
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> GeoPoint {
        GeoPoint::new(
            self.reference_geo.lat - (y - self.reference_px.1) * self.lat_per_px,
            self.reference_geo.lon + (x - self.reference_px.0) * self.lon_per_px,
        )
    }

    /// Inverse transform: WGS84 to pixel position.
    pub fn geo_to_pixel(&self, p: GeoPoint) -> (f64, f64) {
        (
            self.reference_px.0 + (p.lon - self.reference_geo.lon) / self.lon_per_px,
            self.reference_px.1 + (self.reference_geo.lat - p.lat) / self.lat_per_px,
        )
    }

    pub fn lat_per_px(&self) -> f64 {
        self.lat_per_px
    }

    pub fn lon_per_px(&self) -> f64 {
        self.lon_per_px
    }
}
