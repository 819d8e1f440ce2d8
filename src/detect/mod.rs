//! Hexagonal hot-zone detection on the composite map.
//!
//! Segments the raster by the two configured orange HSV ranges, extracts
//! connected components, filters them by hexagon-like shape, scores a
//! confidence from contour regularity and color saturation, and maps every
//! surviving centroid into WGS84. Zones outside the bounding box are
//! discarded; near-duplicates from stitching seams are merged per mask.

mod contour;
mod mask;

pub use contour::{find_components, Component};
pub use mask::{build_mask, clean_mask, rgb_to_hsv};

use image::RgbaImage;
use tracing::debug;

use crate::config::{HsvRange, MonitorConfig};
use crate::coords::CoordinateMapper;
use crate::geo::METERS_PER_DEGREE_LAT;
use crate::observe::{merge_by_separation, ColorClass, HotZone};
use crate::stitch::CompositeMap;

/// Compactness of a regular hexagon under the exposed-edge perimeter
/// estimate (which for a convex region equals twice the bounding-box
/// width plus height); regularity scoring measures distance from this
/// ideal.
const HEXAGON_COMPACTNESS: f64 = 0.586;

/// Confidence weights: shape regularity, bounding-box fill, saturation.
const WEIGHT_REGULARITY: f64 = 0.45;
const WEIGHT_SOLIDITY: f64 = 0.25;
const WEIGHT_SATURATION: f64 = 0.30;

/// Detects hexagonal hot zones in a composite map.
#[derive(Clone, Debug)]
pub struct HexagonDetector {
    config: MonitorConfig,
}

impl HexagonDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Runs detection over both color ranges. A map with no orange pixels
    /// yields an empty vec, never an error.
    pub fn detect(&self, map: &CompositeMap, mapper: &CoordinateMapper) -> Vec<HotZone> {
        let passes = [
            (self.config.color_ranges.dark_orange, ColorClass::DarkOrange),
            (self.config.color_ranges.orange, ColorClass::Orange),
        ];

        let mut zones = Vec::new();
        for (range, color_class) in passes {
            let class_zones = self.detect_color(&map.image, &range, color_class, mapper);
            debug!(?color_class, count = class_zones.len(), "color pass complete");
            // Stitching seams can split one marker into nearby fragments
            zones.extend(merge_by_separation(
                class_zones,
                self.config.min_separation_px,
            ));
        }
        zones
    }

    fn detect_color(
        &self,
        image: &RgbaImage,
        range: &HsvRange,
        color_class: ColorClass,
        mapper: &CoordinateMapper,
    ) -> Vec<HotZone> {
        let mask = clean_mask(&build_mask(image, range));
        let mut zones = Vec::new();

        for component in find_components(&mask) {
            let Some(mut confidence) = self.shape_confidence(&component, image, range) else {
                continue;
            };
            if component.touches_border {
                confidence *= self.config.border_penalty;
            }

            let geo = mapper.pixel_to_geo(component.centroid.0, component.centroid.1);
            if !self.config.bounds.contains(geo) {
                debug!(
                    lat = geo.lat,
                    lon = geo.lon,
                    "zone centroid outside bounding box, discarded"
                );
                continue;
            }

            zones.push(HotZone {
                pixel_centroid: component.centroid,
                geo_centroid: geo,
                area_px: component.area,
                area_m2: component.area as f64 * square_meters_per_pixel(mapper, geo.lat),
                confidence: confidence.clamp(0.0, 1.0),
                color_class,
                compactness: component.compactness(),
                solidity: component.solidity(),
            });
        }
        zones
    }

    /// Applies the shape filter and returns the pre-penalty confidence, or
    /// None when the component is not hexagon-like.
    fn shape_confidence(
        &self,
        component: &Component,
        image: &RgbaImage,
        range: &HsvRange,
    ) -> Option<f64> {
        let c = &self.config;
        if component.area < c.hexagon_min_area || component.area > c.hexagon_max_area {
            return None;
        }
        let aspect = component.aspect_ratio();
        if aspect < c.min_aspect_ratio || aspect > c.max_aspect_ratio {
            return None;
        }
        let solidity = component.solidity();
        if solidity < c.min_solidity {
            return None;
        }
        let compactness = component.compactness();
        if compactness < c.min_compactness || compactness > c.max_compactness {
            return None;
        }
        // Disks share the hexagon's compactness band; the boundary-radius
        // spread is what tells them apart
        if component.radial_variation() < c.min_radial_variation {
            return None;
        }

        let regularity =
            (1.0 - (compactness - HEXAGON_COMPACTNESS).abs() / 0.35).clamp(0.0, 1.0);
        let solidity_score = ((solidity - c.min_solidity) / (1.0 - c.min_solidity)).clamp(0.0, 1.0);
        let saturation_strength = saturation_strength(component, image, range);

        Some(
            WEIGHT_REGULARITY * regularity
                + WEIGHT_SOLIDITY * solidity_score
                + WEIGHT_SATURATION * saturation_strength,
        )
    }
}

/// Mean saturation of the component's pixels, normalized against the range's
/// saturation floor: 0 at the floor, 1 at full saturation.
fn saturation_strength(component: &Component, image: &RgbaImage, range: &HsvRange) -> f64 {
    if component.pixels.is_empty() {
        return 0.0;
    }
    let total: u64 = component
        .pixels
        .iter()
        .map(|&(x, y)| {
            let p = image.get_pixel(x, y);
            rgb_to_hsv(p[0], p[1], p[2]).1 as u64
        })
        .sum();
    let mean = total as f64 / component.pixels.len() as f64;
    let floor = range.lower[1] as f64;
    ((mean - floor) / (255.0 - floor)).clamp(0.0, 1.0)
}

/// Ground area of one raster pixel at the given latitude.
fn square_meters_per_pixel(mapper: &CoordinateMapper, lat: f64) -> f64 {
    let meters_y = mapper.lat_per_px() * METERS_PER_DEGREE_LAT;
    let meters_x = mapper.lon_per_px() * METERS_PER_DEGREE_LAT * lat.to_radians().cos();
    meters_x * meters_y
}
