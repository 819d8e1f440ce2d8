//! Demand forecasting over the observation history.
//!
//! The engine keeps its trained model behind an `ArcSwap`, so a forecast
//! never blocks on a retrain happening in the capture thread: readers grab
//! the current snapshot, the trainer swaps in the next one when it's done.
//! Forecasting never fails: before any model exists it falls back to a
//! zero-confidence persistence forecast.

mod features;
mod model;

pub use features::{FeatureBuilder, TrainingRow};
pub use model::BaggedEnsemble;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{MonitorConfig, PredictionConfig};
use crate::geo::{BoundingBox, GeoPoint};
use crate::observe::Observation;

/// Grid cells below this historical occupancy rate are not worth surfacing.
const MIN_ZONE_FREQUENCY: f64 = 0.2;

/// One grid cell likely to hold a hot zone, with its historical rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictedZone {
    /// Row-major cell index from the north-west corner
    pub grid_cell: usize,
    pub center: GeoPoint,
    /// Fraction of past observations with at least one zone in this cell
    pub frequency: f64,
}

/// A demand forecast for `horizon_minutes` past `generated_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Forecast {
    pub generated_at: DateTime<Utc>,
    pub horizon_minutes: i64,
    pub expected_zone_count: f64,
    /// Ensemble agreement scaled by training volume, in [0, 1]; zero for
    /// the pre-training fallback
    pub confidence: f64,
    /// Set while the model has fewer training rows than the configured
    /// minimum (or does not exist yet); the forecast is advisory until
    /// this clears
    pub low_confidence: bool,
    /// Model version that produced this forecast, None for the fallback
    pub model_version: Option<u64>,
    /// Cells most likely to hold zones, strongest first
    pub likely_zones: Vec<PredictedZone>,
}

/// One immutable trained model. Replaced wholesale on retrain, so a reader
/// holding this snapshot is never affected by concurrent training.
struct ModelSnapshot {
    ensemble: BaggedEnsemble,
    version: u64,
    trained_at: DateTime<Utc>,
}

/// Trains on the recorded history and produces forecasts from the latest
/// model snapshot.
pub struct PredictionEngine {
    config: PredictionConfig,
    bounds: BoundingBox,
    builder: FeatureBuilder,
    model: ArcSwapOption<ModelSnapshot>,
    since_retrain: AtomicUsize,
}

impl PredictionEngine {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            config: config.prediction.clone(),
            bounds: config.bounds,
            builder: FeatureBuilder::new(config),
            model: ArcSwapOption::const_empty(),
            since_retrain: AtomicUsize::new(0),
        }
    }

    /// Notes one newly persisted observation and retrains when due: at the
    /// first history that yields any training rows, then after every
    /// `retrain_every` further observations. A history too short to train
    /// on is a no-op, not an error.
    pub fn record(&self, history: &[Observation]) -> Result<()> {
        let pending = self.since_retrain.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.model.load_full();
        if previous.is_some() && pending < self.config.retrain_every {
            return Ok(());
        }

        let rows = self.builder.training_set(history);
        if rows.is_empty() {
            return Ok(());
        }
        let ensemble = BaggedEnsemble::train(&rows, &self.config)?;
        let version = previous.as_ref().map(|s| s.version + 1).unwrap_or(1);
        info!(
            version,
            rows = rows.len(),
            observations = history.len(),
            "prediction model retrained"
        );
        self.model.store(Some(Arc::new(ModelSnapshot {
            ensemble,
            version,
            trained_at: Utc::now(),
        })));
        self.since_retrain.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Forecast for `horizon` past `at`, from the current model snapshot.
    ///
    /// Never fails: with no trained model, or a history shorter than one
    /// feature window, it degrades to a zero-confidence persistence
    /// forecast (the latest zone count carried forward).
    pub fn forecast(
        &self,
        history: &[Observation],
        at: DateTime<Utc>,
        horizon: Duration,
    ) -> Forecast {
        let snapshot = self.model.load_full();
        let target_time = at + horizon;

        if let Some(snap) = &snapshot {
            if let Some(features) = self.builder.features(history, target_time) {
                let (expected, spread) = snap.ensemble.predict(&features);

                let agreement = 1.0 / (1.0 + spread / expected.max(1.0));
                let volume = (snap.ensemble.trained_rows() as f64
                    / self.config.min_training_size.max(1) as f64)
                    .min(1.0);
                let low_confidence =
                    snap.ensemble.trained_rows() < self.config.min_training_size;

                let mut likely_zones = self.likely_zones(history);
                likely_zones.truncate((expected.round() as usize).max(1));

                debug!(expected, spread, low_confidence, "forecast generated");
                return Forecast {
                    generated_at: at,
                    horizon_minutes: horizon.num_minutes(),
                    expected_zone_count: expected,
                    confidence: (agreement * volume).clamp(0.0, 1.0),
                    low_confidence,
                    model_version: Some(snap.version),
                    likely_zones,
                };
            }
        }

        // Persistence fallback: carry the latest count forward
        let expected = history.last().map(|o| o.zone_count() as f64).unwrap_or(0.0);
        let mut likely_zones = self.likely_zones(history);
        likely_zones.truncate((expected.round() as usize).max(1));
        debug!(expected, "fallback forecast, no usable model");
        Forecast {
            generated_at: at,
            horizon_minutes: horizon.num_minutes(),
            expected_zone_count: expected,
            confidence: 0.0,
            low_confidence: true,
            model_version: snapshot.map(|s| s.version),
            likely_zones,
        }
    }

    /// One forecast per horizon, e.g. 15, 30, and 60 minutes out.
    pub fn forecast_series(
        &self,
        history: &[Observation],
        at: DateTime<Utc>,
        horizons: &[Duration],
    ) -> Vec<Forecast> {
        horizons
            .iter()
            .map(|&horizon| self.forecast(history, at, horizon))
            .collect()
    }

    /// When the current model was trained, if one exists.
    pub fn last_trained(&self) -> Option<DateTime<Utc>> {
        self.model.load().as_ref().map(|s| s.trained_at)
    }

    /// Ranks grid cells by how often past observations put a zone there.
    fn likely_zones(&self, history: &[Observation]) -> Vec<PredictedZone> {
        if history.is_empty() {
            return Vec::new();
        }
        let (rows, cols) = (self.config.grid_rows.max(1), self.config.grid_cols.max(1));
        let mut occupied = vec![0usize; rows * cols];
        for obs in history {
            let cells = self.builder.grid_occupancy(obs);
            for (cell, count) in cells.iter().enumerate() {
                if *count > 0.0 {
                    occupied[cell] += 1;
                }
            }
        }

        let mut zones: Vec<PredictedZone> = occupied
            .iter()
            .enumerate()
            .filter_map(|(cell, &hits)| {
                let frequency = hits as f64 / history.len() as f64;
                if frequency < MIN_ZONE_FREQUENCY {
                    return None;
                }
                Some(PredictedZone {
                    grid_cell: cell,
                    center: self.bounds.grid_cell_center(cell, rows, cols),
                    frequency,
                })
            })
            .collect();
        zones.sort_by(|a, b| {
            b.frequency
                .total_cmp(&a.frequency)
                .then(a.grid_cell.cmp(&b.grid_cell))
        });
        zones
    }
}
