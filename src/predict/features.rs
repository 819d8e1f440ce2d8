//! Feature engineering over the observation history.
//!
//! Each training row describes the state of the city just before one
//! observation: lagged zone counts, their moving average, cyclic encodings
//! of capture time, and coarse grid occupancy. The target is the zone count
//! the observation actually recorded.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::config::MonitorConfig;
use crate::geo::BoundingBox;
use crate::observe::Observation;

/// One supervised training example.
#[derive(Clone, Debug)]
pub struct TrainingRow {
    pub features: Vec<f64>,
    pub target: f64,
}

/// Builds feature vectors from a chronological observation history.
#[derive(Clone, Debug)]
pub struct FeatureBuilder {
    window: usize,
    grid_rows: usize,
    grid_cols: usize,
    bounds: BoundingBox,
}

impl FeatureBuilder {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            window: config.prediction.feature_window.max(1),
            grid_rows: config.prediction.grid_rows.max(1),
            grid_cols: config.prediction.grid_cols.max(1),
            bounds: config.bounds,
        }
    }

    /// Length of every produced feature vector: `window` lags, three window
    /// aggregates (mean count, mean confidence, mean area), five time
    /// encodings, and one occupancy slot per grid cell.
    pub fn feature_dim(&self) -> usize {
        self.window + 3 + 5 + self.grid_rows * self.grid_cols
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Feature vector describing the state after `history`, for a forecast
    /// at `at`. Returns None until the history covers one full window.
    pub fn features(&self, history: &[Observation], at: DateTime<Utc>) -> Option<Vec<f64>> {
        if history.len() < self.window {
            return None;
        }
        let recent = &history[history.len() - self.window..];

        let mut features = Vec::with_capacity(self.feature_dim());
        // Lags, most recent first
        for obs in recent.iter().rev() {
            features.push(obs.zone_count() as f64);
        }
        let n = self.window as f64;
        features.push(recent.iter().map(|o| o.zone_count() as f64).sum::<f64>() / n);
        features.push(recent.iter().map(mean_confidence).sum::<f64>() / n);
        features.push(recent.iter().map(mean_area_m2).sum::<f64>() / n);
        features.extend_from_slice(&time_features(at));
        features.extend(self.grid_occupancy(recent.last()?));
        Some(features)
    }

    /// Expands the history into supervised rows: for each observation past
    /// the first full window, the window before it predicts its zone count.
    pub fn training_set(&self, history: &[Observation]) -> Vec<TrainingRow> {
        (self.window..history.len())
            .filter_map(|i| {
                let features = self.features(&history[..i], history[i].timestamp)?;
                Some(TrainingRow {
                    features,
                    target: history[i].zone_count() as f64,
                })
            })
            .collect()
    }

    /// Zone count per grid cell of one observation, row-major from the
    /// north-west corner. Zones outside the bounds are ignored.
    pub fn grid_occupancy(&self, observation: &Observation) -> Vec<f64> {
        let mut cells = vec![0.0; self.grid_rows * self.grid_cols];
        for zone in &observation.hot_zones {
            if let Some(cell) =
                self.bounds
                    .grid_cell(zone.geo_centroid, self.grid_rows, self.grid_cols)
            {
                cells[cell] += 1.0;
            }
        }
        cells
    }
}

/// Mean detection confidence of one observation, 0 when it saw no zones.
fn mean_confidence(obs: &Observation) -> f64 {
    if obs.hot_zones.is_empty() {
        return 0.0;
    }
    obs.hot_zones.iter().map(|z| z.confidence).sum::<f64>() / obs.hot_zones.len() as f64
}

/// Mean zone ground area of one observation, 0 when it saw no zones.
fn mean_area_m2(obs: &Observation) -> f64 {
    if obs.hot_zones.is_empty() {
        return 0.0;
    }
    obs.hot_zones.iter().map(|z| z.area_m2).sum::<f64>() / obs.hot_zones.len() as f64
}

/// Cyclic encodings of capture time: hour-of-day and day-of-week as
/// sin/cos pairs, plus a weekend flag. Cyclic pairs keep 23:00 adjacent
/// to 00:00 instead of a full period apart.
fn time_features(at: DateTime<Utc>) -> [f64; 5] {
    let hour = at.hour() as f64 + at.minute() as f64 / 60.0;
    let hour_angle = hour / 24.0 * std::f64::consts::TAU;
    let weekday = at.weekday().num_days_from_monday() as f64;
    let day_angle = weekday / 7.0 * std::f64::consts::TAU;
    let weekend = if weekday >= 5.0 { 1.0 } else { 0.0 };
    [
        hour_angle.sin(),
        hour_angle.cos(),
        day_angle.sin(),
        day_angle.cos(),
        weekend,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::geo::GeoPoint;
    use crate::observe::{ColorClass, HotZone};

    fn zone_at(lat: f64, lon: f64) -> HotZone {
        HotZone {
            pixel_centroid: (0.0, 0.0),
            geo_centroid: GeoPoint::new(lat, lon),
            area_px: 400,
            area_m2: 28_000.0,
            confidence: 0.8,
            color_class: ColorClass::DarkOrange,
            compactness: 0.5,
            solidity: 0.75,
        }
    }

    fn observation(hour: u32, zones: usize) -> Observation {
        Observation {
            timestamp: Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap(),
            device_geo_origin: GeoPoint::new(29.65, 91.1),
            hot_zones: (0..zones).map(|_| zone_at(29.65, 91.10)).collect(),
        }
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(&MonitorConfig::default())
    }

    #[test]
    fn test_short_history_yields_no_features() {
        let b = builder();
        let history: Vec<Observation> = (0..b.window() - 1).map(|h| observation(h as u32, 1)).collect();
        assert!(b.features(&history, Utc::now()).is_none());
    }

    #[test]
    fn test_feature_vector_dimension_and_lag_order() {
        let b = builder();
        let history: Vec<Observation> =
            (0..b.window()).map(|i| observation(i as u32, i + 1)).collect();

        let features = b.features(&history, Utc::now()).unwrap();
        assert_eq!(features.len(), b.feature_dim());
        // Most recent observation (6 zones) leads the lag block
        assert!((features[0] - b.window() as f64).abs() < 1e-9);
        assert!((features[b.window() - 1] - 1.0).abs() < 1e-9);
        // Moving average of 1..=window
        let expected_mean = (1 + b.window()) as f64 / 2.0;
        assert!((features[b.window()] - expected_mean).abs() < 1e-9);
        // Window aggregates: every fixture zone has confidence 0.8 and
        // area 28,000 m²
        assert!((features[b.window() + 1] - 0.8).abs() < 1e-9);
        assert!((features[b.window() + 2] - 28_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_observation_zeroes_aggregates() {
        let obs = observation(10, 0);
        assert_eq!(mean_confidence(&obs), 0.0);
        assert_eq!(mean_area_m2(&obs), 0.0);
    }

    #[test]
    fn test_weekend_flag() {
        // 2024-07-06 was a Saturday
        let saturday = Utc.with_ymd_and_hms(2024, 7, 6, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(time_features(saturday)[4], 1.0);
        assert_eq!(time_features(monday)[4], 0.0);
    }

    #[test]
    fn test_midnight_wraps_continuously() {
        let late = Utc.with_ymd_and_hms(2024, 7, 1, 23, 50, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 7, 2, 0, 10, 0).unwrap();
        let a = time_features(late);
        let b = time_features(early);
        let gap = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
        assert!(gap < 0.1, "cyclic encoding jumped at midnight: {}", gap);
    }

    #[test]
    fn test_grid_occupancy_counts_cells() {
        let b = builder();
        let mut obs = observation(10, 0);
        // North-west corner cell and the cell just east of it
        obs.hot_zones.push(zone_at(29.695, 91.055));
        obs.hot_zones.push(zone_at(29.695, 91.095));
        obs.hot_zones.push(zone_at(29.695, 91.095));
        // Outside the bounding box: ignored
        obs.hot_zones.push(zone_at(29.50, 91.10));

        let cells = b.grid_occupancy(&obs);
        assert_eq!(cells.len(), 16);
        assert_eq!(cells[0], 1.0);
        assert_eq!(cells[1], 2.0);
        assert_eq!(cells.iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn test_training_set_targets_follow_windows() {
        let b = builder();
        let history: Vec<Observation> =
            (0..b.window() + 3).map(|i| observation(i as u32, i)).collect();

        let rows = b.training_set(&history);
        assert_eq!(rows.len(), 3);
        for (j, row) in rows.iter().enumerate() {
            assert_eq!(row.features.len(), b.feature_dim());
            assert!((row.target - (b.window() + j) as f64).abs() < 1e-9);
        }
    }
}
