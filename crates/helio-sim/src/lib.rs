//! # helio-sim
//!
//! Synthetic photovoltaic data for exercising `helio-core` end to end.
//!
//! - [`generator`]: per-panel telemetry with injected faults and ground truth
//! - [`weather`]: hourly history and daily forecast rows for the predictor
//!
//! The crate generates data only. Detection and scoring stay in `helio-core`.

pub mod generator;
pub mod weather;

pub use generator::{FaultEvent, FaultKind, GeneratedBatch, GeneratorConfig, TelemetryGenerator};
pub use weather::{WeatherConfig, WeatherGenerator};
