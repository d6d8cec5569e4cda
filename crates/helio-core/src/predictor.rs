//! Weather-to-energy regression model
//!
//! Training is always batch and from scratch. When the history carries no
//! measured output, the target is derived from a simple panel model:
//!
//! ```text
//! actual_output = G · A · η · (1 + (T − 25) · β)     (0 when G < 50, floored at 0)
//! ```

use crate::algo::{RandomForestConfig, RandomForestRegressor};
use crate::error::{AnalyticsError, Result};
use crate::features::{Feature, FeatureExtractor, WEATHER_FEATURES, cell_value};
use crate::telemetry::{WeatherFeatureVector, WeatherRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the regression target column
pub const TARGET: &str = "actual_output";

/// Physical constants for the synthetic training target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelPhysics {
    pub panel_area_m2: f64,
    pub panel_efficiency: f64,
    /// Power temperature coefficient, per °C
    pub temp_coeff: f64,
    pub reference_temp_c: f64,
    /// Irradiance (W/m²) below which output is taken as zero
    pub min_irradiance: f64,
}

impl Default for PanelPhysics {
    fn default() -> Self {
        Self {
            panel_area_m2: 1.7,
            panel_efficiency: 0.20,
            temp_coeff: -0.004,
            reference_temp_c: 25.0,
            min_irradiance: 50.0,
        }
    }
}

impl PanelPhysics {
    pub fn output(&self, irradiance: f64, temperature: f64) -> f64 {
        if irradiance < self.min_irradiance {
            return 0.0;
        }
        let derate = 1.0 + (temperature - self.reference_temp_c) * self.temp_coeff;
        (irradiance * self.panel_area_m2 * self.panel_efficiency * derate).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictorConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub physics: PanelPhysics,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            physics: PanelPhysics::default(),
        }
    }
}

impl PredictorConfig {
    fn forest_config(&self) -> RandomForestConfig {
        RandomForestConfig {
            n_estimators: self.n_estimators,
            seed: self.seed,
            ..Default::default()
        }
    }
}

/// Trained estimator plus the schema it was trained with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionModel {
    /// Location label the history was collected for
    pub location: String,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub features: Vec<Feature>,
    pub target: String,
    forest: RandomForestRegressor,
}

impl PredictionModel {
    /// Fit a fresh model on historical weather.
    pub fn train(
        location: &str,
        history: &[WeatherRecord],
        config: &PredictorConfig,
    ) -> Result<Self> {
        if history.is_empty() {
            return Err(AnalyticsError::EmptyTrainingData);
        }

        let matrix = FeatureExtractor::exact(&WEATHER_FEATURES)
            .extract(history)
            .map_err(|e| AnalyticsError::TrainingFailed(e.to_string()))?;
        let targets = training_targets(history, &config.physics)?;

        debug!(
            location,
            rows = matrix.n_rows(),
            trees = config.n_estimators,
            "Fitting energy regression forest"
        );

        let forest = RandomForestRegressor::fit(&matrix.rows, &targets, &config.forest_config())
            .map_err(AnalyticsError::TrainingFailed)?;

        info!(location, samples = history.len(), "Energy model trained");

        Ok(Self {
            location: location.to_string(),
            trained_at: Utc::now(),
            n_samples: history.len(),
            features: WEATHER_FEATURES.to_vec(),
            target: TARGET.to_string(),
            forest,
        })
    }

    /// One prediction per row, in input order. Values are not clamped.
    pub fn predict(&self, rows: &[WeatherFeatureVector]) -> Result<Vec<f64>> {
        self.check_schema()?;
        let mut out = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let mut point = [0.0; 4];
            for (slot, (&feature, value)) in point
                .iter_mut()
                .zip(WEATHER_FEATURES.iter().zip(row.as_array()))
            {
                *slot = cell_value(Some(value), feature, idx)?;
            }
            out.push(self.forest.predict_one(&point));
        }
        Ok(out)
    }

    /// Predict from weather rows, zero-filling missing cells
    pub fn predict_records(&self, rows: &[WeatherRecord]) -> Result<Vec<f64>> {
        self.check_schema()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = FeatureExtractor::exact(&WEATHER_FEATURES).extract(rows)?;
        Ok(self.forest.predict(&matrix.rows))
    }

    fn check_schema(&self) -> Result<()> {
        if self.features != WEATHER_FEATURES || self.forest.n_features() != WEATHER_FEATURES.len()
        {
            return Err(AnalyticsError::Persistence(format!(
                "model schema {:?} does not match predictor schema",
                self.features
            )));
        }
        Ok(())
    }
}

/// Measured output when every row has it, otherwise the physics-derived target
fn training_targets(history: &[WeatherRecord], physics: &PanelPhysics) -> Result<Vec<f64>> {
    if history.iter().all(|r| r.actual_output.is_some()) {
        return history
            .iter()
            .enumerate()
            .map(|(row, r)| {
                let value = r.actual_output.unwrap_or_default();
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(AnalyticsError::TrainingFailed(format!(
                        "non-finite {} at row {}",
                        TARGET, row
                    )))
                }
            })
            .collect();
    }

    history
        .iter()
        .enumerate()
        .map(|(row, r)| {
            let irradiance = cell_value(r.irradiance, Feature::Irradiance, row)
                .map_err(|e| AnalyticsError::TrainingFailed(e.to_string()))?;
            let temperature = cell_value(r.temperature, Feature::Temperature, row)
                .map_err(|e| AnalyticsError::TrainingFailed(e.to_string()))?;
            Ok(physics.output(irradiance, temperature))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(scale: f64, n: usize) -> Vec<WeatherRecord> {
        (0..n)
            .map(|i| {
                let hour = (i % 24) as f64;
                let irradiance = (1000.0 * ((hour - 6.0) / 12.0 * std::f64::consts::PI).sin())
                    .max(0.0)
                    * scale;
                WeatherRecord {
                    timestamp: None,
                    temperature: Some(20.0 + hour / 2.0),
                    irradiance: Some(irradiance),
                    humidity: Some(60.0),
                    cloud_cover: Some((i % 10) as f64 * 10.0),
                    actual_output: None,
                }
            })
            .collect()
    }

    fn small_config() -> PredictorConfig {
        PredictorConfig {
            n_estimators: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_physics_target() {
        let physics = PanelPhysics::default();
        // 1000 W/m² at 25 °C: 1000 * 1.7 * 0.2
        assert!((physics.output(1000.0, 25.0) - 340.0).abs() < 1e-9);
        // 35 °C derates by 4%
        assert!((physics.output(1000.0, 35.0) - 326.4).abs() < 1e-9);
        assert_eq!(physics.output(49.9, 25.0), 0.0);
        // Extreme heat cannot push output negative
        assert_eq!(physics.output(500.0, 400.0), 0.0);
    }

    #[test]
    fn test_empty_history_fails() {
        let err = PredictionModel::train("Nowhere", &[], &small_config()).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyTrainingData));
    }

    #[test]
    fn test_missing_weather_column_fails_training() {
        let mut rows = history(1.0, 48);
        for r in &mut rows {
            r.cloud_cover = None;
        }
        let err = PredictionModel::train("Nowhere", &rows, &small_config()).unwrap_err();
        assert!(matches!(err, AnalyticsError::TrainingFailed(_)));
    }

    #[test]
    fn test_model_tracks_irradiance() {
        let model = PredictionModel::train("Nagpur", &history(1.0, 24 * 14), &small_config())
            .unwrap();
        assert_eq!(model.features, WEATHER_FEATURES.to_vec());
        assert_eq!(model.target, TARGET);

        let preds = model
            .predict(&[
                WeatherFeatureVector::new(21.0, 0.0, 60.0, 0.0),
                WeatherFeatureVector::new(26.0, 1000.0, 60.0, 0.0),
            ])
            .unwrap();
        assert!(preds[0] < 50.0, "night prediction {}", preds[0]);
        assert!(preds[1] > 250.0, "noon prediction {}", preds[1]);
    }

    #[test]
    fn test_measured_output_used_when_complete() {
        let mut rows = history(1.0, 48);
        for r in &mut rows {
            r.actual_output = Some(7.0);
        }
        let model = PredictionModel::train("Lab", &rows, &small_config()).unwrap();
        let pred = model
            .predict(&[WeatherFeatureVector::new(30.0, 800.0, 50.0, 20.0)])
            .unwrap();
        assert!((pred[0] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_rejects_infinite_features() {
        let model = PredictionModel::train("Nagpur", &history(1.0, 48), &small_config()).unwrap();
        let err = model
            .predict(&[WeatherFeatureVector::new(f64::INFINITY, 0.0, 0.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MalformedInput { .. }));
    }
}
