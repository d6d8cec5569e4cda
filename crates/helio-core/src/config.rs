//! Analytics configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides.

use crate::algo::IsolationForestConfig;
use crate::error::{AnalyticsError, Result};
use crate::performance::PerformanceConfig;
use crate::predictor::PredictorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub anomaly: IsolationForestConfig,
    pub predictor: PredictorConfig,
    pub performance: PerformanceConfig,
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "Loaded analytics config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = self.anomaly.contamination;
        if !(c > 0.0 && c <= 0.5) {
            return Err(invalid(format!("anomaly.contamination must be in (0, 0.5], got {}", c)));
        }
        if self.anomaly.n_estimators == 0 || self.anomaly.max_samples == 0 {
            return Err(invalid("anomaly.n_estimators and anomaly.max_samples must be >= 1"));
        }
        if self.predictor.n_estimators == 0 {
            return Err(invalid("predictor.n_estimators must be >= 1"));
        }

        let p = &self.performance;
        if p.day_start_hour > 23 {
            return Err(invalid(format!(
                "performance.day_start_hour must be 0..=23, got {}",
                p.day_start_hour
            )));
        }
        p.site_offset()?;
        for (name, value) in [
            ("phone_charge_watts", p.phone_charge_watts),
            ("reference_capacity", p.reference_capacity),
            ("reference_efficiency", p.reference_efficiency),
        ] {
            if !(value > 0.0) {
                return Err(invalid(format!(
                    "performance.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AnalyticsError {
    AnalyticsError::Config(msg.into())
}
