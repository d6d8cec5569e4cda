//! Feature selection, validation and standardization.
//!
//! Turns record batches into dense row-major matrices. A feature counts as
//! present when at least one record carries a value for it; inside a present
//! feature, missing values (absent or NaN) become `0.0`. Infinite values are
//! rejected.

use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric columns known to the analytics layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    EnergyOutput,
    PanelVoltage,
    PanelCurrent,
    PanelPower,
    Temperature,
    Irradiance,
    Humidity,
    CloudCover,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnergyOutput => "energy_output",
            Self::PanelVoltage => "panel_voltage",
            Self::PanelCurrent => "panel_current",
            Self::PanelPower => "panel_power",
            Self::Temperature => "temperature",
            Self::Irradiance => "irradiance",
            Self::Humidity => "humidity",
            Self::CloudCover => "cloud_cover",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Candidate columns for multivariate outlier detection
pub const ANOMALY_FEATURES: [Feature; 4] = [
    Feature::EnergyOutput,
    Feature::PanelVoltage,
    Feature::PanelCurrent,
    Feature::PanelPower,
];

/// Predictor input schema. Order matters: models are fit and served in it.
pub const WEATHER_FEATURES: [Feature; 4] = [
    Feature::Temperature,
    Feature::Irradiance,
    Feature::Humidity,
    Feature::CloudCover,
];

/// Anything that can expose named numeric columns
pub trait FeatureSource {
    fn feature(&self, feature: Feature) -> Option<f64>;
}

/// Dense feature matrix, one row per input record
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub features: Vec<Feature>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[idx])
    }
}

/// Selects the requested features that are present in a batch
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    requested: Vec<Feature>,
    min_features: usize,
}

impl FeatureExtractor {
    /// Extractor that needs at least two of `requested`
    pub fn new(requested: &[Feature]) -> Self {
        Self {
            requested: requested.to_vec(),
            min_features: 2,
        }
    }

    /// Extractor that needs every requested feature (fixed schemas)
    pub fn exact(schema: &[Feature]) -> Self {
        Self {
            requested: schema.to_vec(),
            min_features: schema.len(),
        }
    }

    /// Requested features present in `records`, in request order
    pub fn available<R: FeatureSource>(&self, records: &[R]) -> Vec<Feature> {
        self.requested
            .iter()
            .copied()
            .filter(|&f| records.iter().any(|r| r.feature(f).is_some()))
            .collect()
    }

    pub fn extract<R: FeatureSource>(&self, records: &[R]) -> Result<FeatureMatrix> {
        let features = self.available(records);
        if features.len() < self.min_features {
            return Err(AnalyticsError::InsufficientFeatures {
                available: features.iter().map(|f| f.name().to_string()).collect(),
                required: self.min_features,
            });
        }

        let mut rows = Vec::with_capacity(records.len());
        for (row_idx, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(features.len());
            for &feature in &features {
                row.push(cell_value(record.feature(feature), feature, row_idx)?);
            }
            rows.push(row);
        }

        Ok(FeatureMatrix { features, rows })
    }
}

/// Zero-fill a missing cell, reject an infinite one
pub(crate) fn cell_value(value: Option<f64>, feature: Feature, row: usize) -> Result<f64> {
    match value {
        None => Ok(0.0),
        Some(v) if v.is_nan() => Ok(0.0),
        Some(v) if v.is_infinite() => Err(AnalyticsError::MalformedInput {
            column: feature.name().to_string(),
            row,
            value: v,
        }),
        Some(v) => Ok(v),
    }
}

/// Zero-mean / unit-variance scaling fitted on a single batch.
///
/// Uses the population standard deviation; a constant column keeps a scale
/// of 1 so it maps to all zeros instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &FeatureMatrix) -> Self {
        let n = matrix.n_rows().max(1) as f64;
        let mut mean = Vec::with_capacity(matrix.n_features());
        let mut scale = Vec::with_capacity(matrix.n_features());

        for j in 0..matrix.n_features() {
            let mu = matrix.column(j).sum::<f64>() / n;
            let var = matrix.column(j).map(|x| (x - mu).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            mean.push(mu);
            scale.push(if sd > 0.0 { sd } else { 1.0 });
        }

        Self { mean, scale }
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        let rows = matrix
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, x)| (x - self.mean[j]) / self.scale[j])
                    .collect()
            })
            .collect();

        FeatureMatrix {
            features: matrix.features.clone(),
            rows,
        }
    }

    pub fn fit_transform(matrix: &FeatureMatrix) -> FeatureMatrix {
        Self::fit(matrix).transform(matrix)
    }
}
