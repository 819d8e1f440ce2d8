//! Observation records and final assembly.
//!
//! An `Observation` is the unit of persistence: one timestamped snapshot of
//! every hot zone found in a capture cycle. It is created once and never
//! mutated; the repository stores it as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MonitorConfig;
use crate::geo::GeoPoint;

/// Which configured color range a zone was segmented from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorClass {
    Orange,
    DarkOrange,
}

/// One detected hexagonal hot zone. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HotZone {
    /// Centroid in composite raster pixels
    pub pixel_centroid: (f64, f64),
    /// Centroid in WGS84 decimal degrees
    pub geo_centroid: GeoPoint,
    /// Component area in pixels
    pub area_px: u32,
    /// Estimated ground area in square meters
    pub area_m2: f64,
    /// Detection confidence in [0, 1]
    pub confidence: f64,
    pub color_class: ColorClass,
    /// Shape metrics that fed the confidence score
    pub compactness: f64,
    pub solidity: f64,
}

/// One timestamped snapshot of all hot zones from a capture cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    /// Device GPS fix at capture time
    pub device_geo_origin: GeoPoint,
    pub hot_zones: Vec<HotZone>,
}

impl Observation {
    pub fn zone_count(&self) -> usize {
        self.hot_zones.len()
    }
}

/// Drops zones whose centroid lies within `min_separation` pixels of a
/// higher-confidence zone. Used per color mask by the detector (stitching
/// seams duplicate zones) and once more globally by the assembler.
///
/// Ties break on pixel position so the result is deterministic.
pub(crate) fn merge_by_separation(mut zones: Vec<HotZone>, min_separation: f64) -> Vec<HotZone> {
    zones.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.pixel_centroid
                    .partial_cmp(&b.pixel_centroid)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut kept: Vec<HotZone> = Vec::with_capacity(zones.len());
    for zone in zones {
        let duplicate = kept.iter().any(|existing| {
            let dx = existing.pixel_centroid.0 - zone.pixel_centroid.0;
            let dy = existing.pixel_centroid.1 - zone.pixel_centroid.1;
            (dx * dx + dy * dy).sqrt() < min_separation
        });
        if !duplicate {
            kept.push(zone);
        }
    }
    kept
}

/// Combines detector output with the capture timestamp and device origin
/// into one immutable `Observation`.
#[derive(Clone, Debug)]
pub struct ObservationAssembler {
    min_separation_px: f64,
}

impl ObservationAssembler {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            min_separation_px: config.min_separation_px,
        }
    }

    /// Assembles the final observation, enforcing the minimum-separation
    /// invariant across both color masks (the detector only deduplicates
    /// within each mask).
    pub fn assemble(
        &self,
        timestamp: DateTime<Utc>,
        device_geo_origin: GeoPoint,
        zones: Vec<HotZone>,
    ) -> Observation {
        let before = zones.len();
        let hot_zones = merge_by_separation(zones, self.min_separation_px);
        if hot_zones.len() < before {
            debug!(
                merged = before - hot_zones.len(),
                "cross-mask dedup removed near-duplicate zones"
            );
        }
        Observation {
            timestamp,
            device_geo_origin,
            hot_zones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(x: f64, y: f64, confidence: f64) -> HotZone {
        HotZone {
            pixel_centroid: (x, y),
            geo_centroid: GeoPoint::new(29.65, 91.10),
            area_px: 500,
            area_m2: 35_000.0,
            confidence,
            color_class: ColorClass::Orange,
            compactness: 0.5,
            solidity: 0.75,
        }
    }

    #[test]
    fn test_close_pair_keeps_higher_confidence() {
        let zones = vec![zone(100.0, 100.0, 0.6), zone(110.0, 100.0, 0.9)];
        let merged = merge_by_separation(zones, 50.0);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_distant_zones_both_kept() {
        let zones = vec![zone(100.0, 100.0, 0.6), zone(200.0, 100.0, 0.9)];
        let merged = merge_by_separation(zones, 50.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_chain_collapses_onto_strongest() {
        // Three zones in a line, each within separation of its neighbor;
        // the strongest survives, both neighbors fold into it
        let zones = vec![
            zone(100.0, 100.0, 0.5),
            zone(140.0, 100.0, 0.95),
            zone(180.0, 100.0, 0.6),
        ];
        let merged = merge_by_separation(zones, 50.0);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].pixel_centroid.0 - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_assembler_enforces_separation_across_masks() {
        let config = MonitorConfig::default();
        let assembler = ObservationAssembler::new(&config);

        let mut a = zone(300.0, 300.0, 0.8);
        a.color_class = ColorClass::DarkOrange;
        let b = zone(310.0, 305.0, 0.7); // Orange, within 50px of a

        let obs = assembler.assemble(Utc::now(), GeoPoint::new(29.65, 91.1), vec![b, a]);
        assert_eq!(obs.zone_count(), 1);
        assert_eq!(obs.hot_zones[0].color_class, ColorClass::DarkOrange);
    }

    #[test]
    fn test_observation_serde_round_trip() {
        let obs = Observation {
            timestamp: Utc::now(),
            device_geo_origin: GeoPoint::new(29.65, 91.10),
            hot_zones: vec![zone(10.0, 20.0, 0.9)],
        };
        let json = serde_json::to_string(&obs).unwrap();
        let parsed: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.zone_count(), 1);
        assert_eq!(parsed.hot_zones[0].color_class, ColorClass::Orange);
        assert!((parsed.hot_zones[0].confidence - 0.9).abs() < 1e-12);
    }
}
