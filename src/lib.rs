//! Demand heatmap monitor core.
//!
//! Turns periodic screen captures of a ride-hailing app's order heatmap into
//! geo-referenced hot-zone observations and short-horizon demand forecasts.
//! One capture cycle runs capture → normalize → stitch → detect → assemble →
//! persist; accumulated observations feed a regression model that produces
//! confidence-scored forecasts.
//!
//! Device automation and storage live behind the [`capture::DeviceController`]
//! and [`pipeline::ObservationRepository`] traits so the core can be driven
//! entirely with synthetic tiles and in-memory observations.

pub mod capture;
pub mod config;
pub mod coords;
pub mod detect;
pub mod error;
pub mod geo;
pub mod observe;
pub mod pipeline;
pub mod predict;
pub mod stitch;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use geo::{BoundingBox, GeoPoint};
pub use observe::{HotZone, Observation};
pub use pipeline::HeatmapMonitor;
pub use predict::Forecast;
