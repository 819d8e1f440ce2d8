//! Error taxonomy for the capture and prediction pipeline.
//!
//! Stitch degradation and under-trained models are deliberately absent here:
//! the former is logged and counted, the latter is surfaced as a flag on the
//! `Forecast`. Only failures that must abort a cycle (or startup) are errors.

use thiserror::Error;

/// Errors that abort a capture cycle or fail component construction.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Device automation failed to capture or gesture. The device controller
    /// retries with backoff; by the time this reaches the pipeline the cycle
    /// is abandoned.
    #[error("device error: {0}")]
    Device(String),

    /// A capture did not match the expected screen geometry. The cycle is
    /// aborted with nothing persisted.
    #[error("invalid tile: {0}")]
    InvalidTile(String),

    /// Coordinate calibration is unusable. Fatal at construction so geo
    /// accuracy never degrades silently.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// The per-cycle deadline was exceeded. The cycle is abandoned before
    /// the repository write.
    #[error("capture cycle exceeded deadline after {elapsed_ms}ms")]
    CycleTimeout { elapsed_ms: u64 },

    /// Repository append or query failed.
    #[error("storage error: {0}")]
    Storage(String),
}
