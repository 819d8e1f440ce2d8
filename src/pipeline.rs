//! Cycle orchestration: capture, normalize, stitch, detect, persist,
//! forecast.
//!
//! One `HeatmapMonitor` owns every stage and runs them sequentially; the
//! device controller is the only external seam. A cycle that blows its
//! deadline is abandoned whole, with nothing persisted, so the stored
//! history only ever contains complete observations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::capture::{DeviceController, NormalizedTile, SweepPlan, TileNormalizer};
use crate::config::MonitorConfig;
use crate::coords::CoordinateMapper;
use crate::detect::HexagonDetector;
use crate::error::MonitorError;
use crate::geo::GeoPoint;
use crate::observe::{Observation, ObservationAssembler};
use crate::predict::{Forecast, PredictionEngine};
use crate::stitch::MapStitcher;

/// Durable store for the observation history.
pub trait ObservationRepository {
    fn append(&mut self, observation: &Observation) -> Result<(), MonitorError>;
    fn load_all(&self) -> Result<Vec<Observation>, MonitorError>;

    /// Observations with timestamps in `[from, to]`.
    fn query_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, MonitorError> {
        let mut all = self.load_all()?;
        all.retain(|o| o.timestamp >= from && o.timestamp <= to);
        Ok(all)
    }
}

/// Append-only JSON Lines store, one observation per line.
///
/// A malformed line (say, from a crash mid-write) is skipped with a warning
/// rather than poisoning the whole history.
pub struct JsonlRepository {
    path: PathBuf,
}

impl JsonlRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ObservationRepository for JsonlRepository {
    fn append(&mut self, observation: &Observation) -> Result<(), MonitorError> {
        let line = serde_json::to_string(observation)
            .map_err(|e| MonitorError::Storage(format!("serialize observation: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MonitorError::Storage(format!("open {}: {e}", self.path.display()))
            })?;
        writeln!(file, "{line}")
            .map_err(|e| MonitorError::Storage(format!("write {}: {e}", self.path.display())))
    }

    fn load_all(&self) -> Result<Vec<Observation>, MonitorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| MonitorError::Storage(format!("read {}: {e}", self.path.display())))?;

        let mut observations = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Observation>(line) {
                Ok(obs) => observations.push(obs),
                Err(e) => warn!(
                    line = number + 1,
                    path = %self.path.display(),
                    "skipping malformed observation: {e}"
                ),
            }
        }
        Ok(observations)
    }
}

/// What one completed cycle produced, for the caller to present.
#[derive(Debug)]
pub struct CycleReport {
    pub observation: Observation,
    pub forecast: Forecast,
    pub degraded_seams: u32,
    pub elapsed: Duration,
}

/// Owns the full pipeline and the in-memory observation history.
pub struct HeatmapMonitor<R: ObservationRepository> {
    config: MonitorConfig,
    plan: SweepPlan,
    normalizer: TileNormalizer,
    stitcher: MapStitcher,
    mapper: CoordinateMapper,
    detector: HexagonDetector,
    assembler: ObservationAssembler,
    engine: PredictionEngine,
    repository: R,
    history: Vec<Observation>,
}

impl<R: ObservationRepository> HeatmapMonitor<R> {
    /// Builds the pipeline and reloads any persisted history, training the
    /// prediction model from it when there is enough.
    pub fn new(config: MonitorConfig, repository: R) -> Result<Self, MonitorError> {
        let plan = SweepPlan::for_config(&config);
        let (lat_per_px, lon_per_px) = config.degrees_per_pixel();
        let mapper = CoordinateMapper::from_reference(
            (0.0, 0.0),
            GeoPoint::new(config.bounds.north, config.bounds.west),
            lat_per_px,
            lon_per_px,
        )?;

        let engine = PredictionEngine::new(&config);
        let history = repository.load_all()?;
        if !history.is_empty() {
            info!(observations = history.len(), "loaded persisted history");
            if let Err(e) = engine.record(&history) {
                warn!("initial model training failed: {e:#}");
            }
        }

        Ok(Self {
            normalizer: TileNormalizer::new(&config),
            stitcher: MapStitcher::new(&config, plan),
            detector: HexagonDetector::new(&config),
            assembler: ObservationAssembler::new(&config),
            plan,
            mapper,
            engine,
            repository,
            history,
            config,
        })
    }

    /// Runs one full capture cycle against the device.
    ///
    /// A device or stitch error, or a blown deadline, abandons the cycle
    /// with nothing persisted. Model training failure only costs the
    /// forecast, never the observation.
    pub fn run_cycle(
        &mut self,
        device: &mut dyn DeviceController,
    ) -> Result<CycleReport, MonitorError> {
        let start = Instant::now();
        let origin = device.current_gps_fix()?;

        let mut tiles: Vec<NormalizedTile> = Vec::with_capacity(self.plan.offsets().len());
        for offset in self.plan.offsets() {
            self.check_deadline(start)?;
            let raw = device.capture_tile(offset)?;
            tiles.push(self.normalizer.normalize(raw)?);
        }

        let composite = self.stitcher.stitch(&tiles)?;
        self.check_deadline(start)?;

        let zones = self.detector.detect(&composite, &self.mapper);
        let observation = self.assembler.assemble(Utc::now(), origin, zones);

        self.check_deadline(start)?;
        self.repository.append(&observation)?;
        self.history.push(observation.clone());

        if let Err(e) = self.engine.record(&self.history) {
            warn!("model training failed, forecast unchanged: {e:#}");
        }
        let forecast =
            self.engine
                .forecast(&self.history, observation.timestamp, self.horizon());

        let elapsed = start.elapsed();
        info!(
            zones = observation.zone_count(),
            degraded_seams = composite.degraded_seams,
            elapsed_ms = elapsed.as_millis() as u64,
            "cycle complete"
        );
        Ok(CycleReport {
            observation,
            forecast,
            degraded_seams: composite.degraded_seams,
            elapsed,
        })
    }

    /// Forecast from the current model and history, without capturing.
    pub fn forecast_now(&self) -> Forecast {
        self.forecast_at(self.horizon())
    }

    /// Forecast at a caller-chosen horizon.
    pub fn forecast_at(&self, horizon: ChronoDuration) -> Forecast {
        self.engine.forecast(&self.history, Utc::now(), horizon)
    }

    /// One forecast per requested horizon, nearest first by convention.
    pub fn forecast_series(&self, horizons: &[ChronoDuration]) -> Vec<Forecast> {
        self.engine.forecast_series(&self.history, Utc::now(), horizons)
    }

    pub fn latest_observation(&self) -> Option<&Observation> {
        self.history.last()
    }

    pub fn history(&self) -> &[Observation] {
        &self.history
    }

    /// Slice of the in-memory history with timestamps in `[from, to]`.
    pub fn history_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Observation> {
        self.history
            .iter()
            .filter(|o| o.timestamp >= from && o.timestamp <= to)
            .collect()
    }

    fn horizon(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.config.prediction.forecast_horizon_minutes)
    }

    fn check_deadline(&self, start: Instant) -> Result<(), MonitorError> {
        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(self.config.cycle_timeout_ms) {
            return Err(MonitorError::CycleTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }
}
