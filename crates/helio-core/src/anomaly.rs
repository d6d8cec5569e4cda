//! Batch anomaly scoring for panel telemetry
//!
//! Every call standardizes the available features and fits a fresh isolation
//! forest on that batch alone; no scaler or detector state survives between
//! calls, so scores from different batches are not comparable.

use crate::algo::{IsolationForest, IsolationForestConfig};
use crate::error::{AnalyticsError, Result};
use crate::features::{ANOMALY_FEATURES, Feature, FeatureExtractor, StandardScaler};
use crate::telemetry::TelemetryRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Raw detector verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLabel {
    Normal,
    Outlier,
}

/// Per-record anomaly columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    #[serde(rename = "anomaly")]
    pub label: ModelLabel,
    /// Native forest score; higher = more normal
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

impl AnomalyResult {
    pub fn new(label: ModelLabel, anomaly_score: f64) -> Self {
        Self {
            label,
            anomaly_score,
            is_anomaly: label == ModelLabel::Outlier,
        }
    }
}

/// A telemetry record, enriched with anomaly columns when scoring ran
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedRecord {
    #[serde(flatten)]
    pub record: TelemetryRecord,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalyResult>,
}

impl AnalyzedRecord {
    /// Record without anomaly columns
    pub fn unscored(record: TelemetryRecord) -> Self {
        Self {
            record,
            anomaly: None,
        }
    }

    pub fn is_anomaly(&self) -> Option<bool> {
        self.anomaly.map(|a| a.is_anomaly)
    }
}

/// Multivariate outlier scorer over {energy_output, panel_voltage, panel_current, panel_power}
#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer {
    config: IsolationForestConfig,
}

impl AnomalyScorer {
    /// Scorer with default forest settings and the given contamination
    pub fn new(contamination: f64) -> Self {
        Self {
            config: IsolationForestConfig {
                contamination,
                ..Default::default()
            },
        }
    }

    pub fn with_config(config: IsolationForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }

    /// Score every record, failing with `InsufficientFeatures` when fewer than
    /// two candidate features are present.
    pub fn score(&self, records: &[TelemetryRecord]) -> Result<Vec<AnomalyResult>> {
        let contamination = self.config.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(AnalyticsError::Config(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }

        let matrix = FeatureExtractor::new(&ANOMALY_FEATURES).extract(records)?;
        let scaled = StandardScaler::fit_transform(&matrix);

        debug!(
            rows = scaled.n_rows(),
            features = ?scaled.features.iter().map(Feature::name).collect::<Vec<_>>(),
            contamination,
            "Fitting isolation forest on batch"
        );

        let forest = IsolationForest::fit(&scaled.rows, &self.config);
        let results = scaled
            .rows
            .iter()
            .map(|row| {
                let score = forest.score(row);
                let label = if score < forest.offset() {
                    ModelLabel::Outlier
                } else {
                    ModelLabel::Normal
                };
                AnomalyResult::new(label, score)
            })
            .collect();

        Ok(results)
    }

    /// Enrich a batch with anomaly columns.
    ///
    /// With fewer than two candidate features the batch comes back unchanged,
    /// without anomaly columns. Malformed values still fail.
    pub fn detect(&self, records: &[TelemetryRecord]) -> Result<Vec<AnalyzedRecord>> {
        match self.score(records) {
            Ok(results) => Ok(records
                .iter()
                .cloned()
                .zip(results)
                .map(|(record, result)| AnalyzedRecord {
                    record,
                    anomaly: Some(result),
                })
                .collect()),
            Err(AnalyticsError::InsufficientFeatures { available, .. }) => {
                warn!(
                    available = ?available,
                    "Insufficient features for anomaly detection, returning batch unscored"
                );
                Ok(records.iter().cloned().map(AnalyzedRecord::unscored).collect())
            }
            Err(e) => Err(e),
        }
    }
}
