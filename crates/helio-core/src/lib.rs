//! Analytics core for photovoltaic installations.
//!
//! - [`anomaly`]: per-batch isolation-forest scoring of panel telemetry
//! - [`health`]: per-panel health verdicts from anomaly flags
//! - [`predictor`] / [`forecaster`]: weather-to-energy regression with a
//!   persisted artifact and a single-slot model cache
//! - [`accumulator`]: energy from a live power series
//! - [`scenario`]: annual yield estimates for planned installations
//! - [`performance`]: live-vs-predicted comparison, impact figures and fleet
//!   production summaries
//!
//! All computations are synchronous and in-memory. Fetching telemetry and
//! weather is left to the caller.

pub mod accumulator;
pub mod algo;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod health;
pub mod performance;
pub mod predictor;
pub mod scenario;
pub mod store;
pub mod telemetry;

pub use accumulator::{EnergyAccumulator, PowerSample};
pub use anomaly::{AnalyzedRecord, AnomalyResult, AnomalyScorer, ModelLabel};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use features::{Feature, FeatureExtractor, FeatureMatrix, FeatureSource, StandardScaler};
pub use forecaster::EnergyForecaster;
pub use health::{HealthClassifier, HealthReport, HealthStatus, PanelHealth};
pub use performance::{
    Assessment, DailyEnergy, FleetSummary, LiveReading, LiveSummary, PerformanceConfig,
    PerformanceInputs,
};
pub use predictor::{PanelPhysics, PredictionModel, PredictorConfig};
pub use scenario::{CleaningFrequency, ScenarioEstimate, ScenarioParams, ScenarioSimulator};
pub use store::{FileModelStore, MemoryModelStore, ModelStore};
pub use telemetry::{TelemetryRecord, WeatherFeatureVector, WeatherRecord, derive_panel_power};
