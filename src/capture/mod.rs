//! Capture-side types: tiles, normalization, sweep planning, and the
//! device-controller seam.
//!
//! The device controller (ADB or otherwise) lives outside the core; the
//! pipeline only sees the [`DeviceController`] trait, so tests drive the
//! whole pipeline with synthetic tiles.

mod sweep;
mod tile;

pub use sweep::SweepPlan;
pub use tile::{NormalizedTile, Tile, TileNormalizer, TileOffset};

use crate::error::MonitorError;
use crate::geo::GeoPoint;

/// Interface to the device automation layer.
///
/// Implementations are expected to pan the map to the requested sweep offset
/// before capturing, and to retry transient failures with backoff internally;
/// an error returned here abandons the whole cycle.
pub trait DeviceController {
    /// Captures one raw screen image at the given sweep offset.
    fn capture_tile(&mut self, offset: TileOffset) -> Result<Tile, MonitorError>;

    /// Returns the device's current GPS fix.
    fn current_gps_fix(&mut self) -> Result<GeoPoint, MonitorError>;
}
