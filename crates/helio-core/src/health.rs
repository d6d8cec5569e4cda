//! Per-panel health classification from anomaly flags

use crate::anomaly::{AnalyzedRecord, AnomalyScorer};
use crate::error::Result;
use crate::telemetry::TelemetryRecord;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use tracing::debug;

/// Health verdict, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Critical,
    Poor,
    Fair,
    Good,
}

impl HealthStatus {
    /// Step function over the anomaly rate (percent). Bounds are exclusive.
    pub fn from_anomaly_rate(rate_percent: f64) -> Self {
        if rate_percent > 15.0 {
            Self::Critical
        } else if rate_percent > 8.0 {
            Self::Poor
        } else if rate_percent > 3.0 {
            Self::Fair
        } else {
            Self::Good
        }
    }

    /// Triage priority: 1 = Critical ... 4 = Good
    pub fn priority(&self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::Poor => 2,
            Self::Fair => 3,
            Self::Good => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelHealth {
    #[serde(skip)]
    pub panel_id: String,
    pub health_status: HealthStatus,
    pub anomaly_rate_percent: f64,
    /// Mean energy output; NaN when the panel reported none
    pub avg_output: f64,
    /// Population std-dev of energy output; NaN below two samples
    pub output_stddev: f64,
    /// Population std-dev of panel voltage; NaN below two samples
    pub voltage_stddev: f64,
    pub priority: u8,
    pub total_readings: usize,
    pub anomaly_count: usize,
}

/// Health verdicts keyed by panel, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    panels: Vec<PanelHealth>,
}

impl HealthReport {
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn get(&self, panel_id: &str) -> Option<&PanelHealth> {
        self.panels.iter().find(|p| p.panel_id == panel_id)
    }

    pub fn panels(&self) -> &[PanelHealth] {
        &self.panels
    }

    /// Most urgent first: priority ascending, then anomaly rate descending
    pub fn by_priority(&self) -> Vec<&PanelHealth> {
        let mut sorted: Vec<&PanelHealth> = self.panels.iter().collect();
        sorted.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.anomaly_rate_percent.total_cmp(&a.anomaly_rate_percent))
        });
        sorted
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.panels.len()))?;
        for panel in &self.panels {
            map.serialize_entry(&panel.panel_id, panel)?;
        }
        map.end()
    }
}

/// Aggregates anomaly flags into one verdict per panel
#[derive(Debug, Clone, Default)]
pub struct HealthClassifier {
    scorer: AnomalyScorer,
}

impl HealthClassifier {
    pub fn new(scorer: AnomalyScorer) -> Self {
        Self { scorer }
    }

    /// Classify an already-scored batch.
    ///
    /// If any record lacks anomaly flags the whole batch is rescored first; if
    /// rescoring cannot produce flags the report is empty.
    pub fn classify(&self, records: &[AnalyzedRecord]) -> Result<HealthReport> {
        if records.iter().all(|r| r.anomaly.is_some()) {
            return Ok(aggregate(records));
        }

        let raw: Vec<TelemetryRecord> = records.iter().map(|r| r.record.clone()).collect();
        self.classify_raw(&raw)
    }

    /// Score a raw batch and classify it
    pub fn classify_raw(&self, records: &[TelemetryRecord]) -> Result<HealthReport> {
        let analyzed = self.scorer.detect(records)?;
        if analyzed.iter().any(|r| r.anomaly.is_none()) {
            debug!("No anomaly flags available, health report is empty");
            return Ok(HealthReport::default());
        }
        Ok(aggregate(&analyzed))
    }
}

#[derive(Default)]
struct PanelAccumulator {
    total: usize,
    anomalies: usize,
    outputs: Vec<f64>,
    voltages: Vec<f64>,
}

fn aggregate(records: &[AnalyzedRecord]) -> HealthReport {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, PanelAccumulator> = HashMap::new();

    for analyzed in records {
        let panel = analyzed.record.panel_id.as_str();
        let group = groups.entry(panel).or_insert_with(|| {
            order.push(panel);
            PanelAccumulator::default()
        });

        group.total += 1;
        if analyzed.is_anomaly() == Some(true) {
            group.anomalies += 1;
        }
        if let Some(v) = analyzed.record.energy_output.filter(|v| !v.is_nan()) {
            group.outputs.push(v);
        }
        if let Some(v) = analyzed.record.panel_voltage.filter(|v| !v.is_nan()) {
            group.voltages.push(v);
        }
    }

    let panels = order
        .into_iter()
        .map(|panel| {
            let group = &groups[panel];
            let anomaly_rate_percent = if group.total > 0 {
                100.0 * group.anomalies as f64 / group.total as f64
            } else {
                0.0
            };
            let health_status = HealthStatus::from_anomaly_rate(anomaly_rate_percent);

            PanelHealth {
                panel_id: panel.to_string(),
                health_status,
                anomaly_rate_percent,
                avg_output: mean(&group.outputs),
                output_stddev: population_stddev(&group.outputs),
                voltage_stddev: population_stddev(&group.voltages),
                priority: health_status.priority(),
                total_readings: group.total,
                anomaly_count: group.anomalies,
            }
        })
        .collect();

    HealthReport { panels }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyResult, ModelLabel};

    fn flagged(panel: &str, output: f64, is_anomaly: bool) -> AnalyzedRecord {
        let label = if is_anomaly {
            ModelLabel::Outlier
        } else {
            ModelLabel::Normal
        };
        AnalyzedRecord {
            record: TelemetryRecord {
                energy_output: Some(output),
                panel_voltage: Some(24.0),
                ..TelemetryRecord::new(panel)
            },
            anomaly: Some(AnomalyResult::new(label, -0.4)),
        }
    }

    fn panel_with_rate(panel: &str, total: usize, anomalies: usize) -> Vec<AnalyzedRecord> {
        (0..total)
            .map(|i| flagged(panel, 100.0, i < anomalies))
            .collect()
    }

    #[test]
    fn test_status_thresholds_are_exclusive() {
        assert_eq!(HealthStatus::from_anomaly_rate(15.0), HealthStatus::Poor);
        assert_eq!(HealthStatus::from_anomaly_rate(15.01), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_anomaly_rate(8.0), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_anomaly_rate(3.0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_anomaly_rate(0.0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_anomaly_rate(100.0), HealthStatus::Critical);
    }

    #[test]
    fn test_status_is_monotone_in_rate() {
        let mut last = HealthStatus::Good;
        for step in 0..=1000 {
            let status = HealthStatus::from_anomaly_rate(step as f64 / 10.0);
            assert!(status <= last, "status improved as rate rose");
            last = status;
        }
    }

    #[test]
    fn test_per_panel_aggregation() {
        let mut records = panel_with_rate("Panel_A", 20, 3); // 15% -> Poor
        records.extend(panel_with_rate("Panel_B", 20, 4)); // 20% -> Critical
        records.extend(panel_with_rate("Panel_C", 100, 1)); // 1% -> Good

        let report = HealthClassifier::default().classify(&records).unwrap();
        assert_eq!(report.len(), 3);

        let a = report.get("Panel_A").unwrap();
        assert_eq!(a.health_status, HealthStatus::Poor);
        assert_eq!(a.priority, 2);
        assert_eq!(a.anomaly_count, 3);
        assert_eq!(a.total_readings, 20);
        assert!((a.anomaly_rate_percent - 15.0).abs() < 1e-12);

        assert_eq!(report.get("Panel_B").unwrap().health_status, HealthStatus::Critical);
        assert_eq!(report.get("Panel_C").unwrap().priority, 4);

        let triage: Vec<&str> = report.by_priority().iter().map(|p| p.panel_id.as_str()).collect();
        assert_eq!(triage, vec!["Panel_B", "Panel_A", "Panel_C"]);
    }

    #[test]
    fn test_output_statistics() {
        let records = vec![
            flagged("P1", 2.0, false),
            flagged("P1", 4.0, false),
            flagged("P2", 7.0, false),
        ];
        let report = HealthClassifier::default().classify(&records).unwrap();

        let p1 = report.get("P1").unwrap();
        assert_eq!(p1.avg_output, 3.0);
        assert_eq!(p1.output_stddev, 1.0);
        assert_eq!(p1.voltage_stddev, 0.0);

        // A single reading has no defined spread
        let p2 = report.get("P2").unwrap();
        assert_eq!(p2.avg_output, 7.0);
        assert!(p2.output_stddev.is_nan());
        assert!(p2.voltage_stddev.is_nan());
    }

    #[test]
    fn test_unscored_batch_without_features_yields_empty_report() {
        let records: Vec<TelemetryRecord> = (0..5)
            .map(|i| TelemetryRecord {
                energy_output: Some(i as f64),
                ..TelemetryRecord::new("P1")
            })
            .collect();
        let unscored: Vec<AnalyzedRecord> =
            records.iter().cloned().map(AnalyzedRecord::unscored).collect();

        let classifier = HealthClassifier::default();
        assert!(classifier.classify(&unscored).unwrap().is_empty());
        assert!(classifier.classify_raw(&records).unwrap().is_empty());
    }

    #[test]
    fn test_unscored_batch_is_scored_first() {
        let records: Vec<AnalyzedRecord> = (0..30)
            .map(|i| {
                AnalyzedRecord::unscored(TelemetryRecord {
                    energy_output: Some(100.0 + i as f64),
                    panel_voltage: Some(24.0),
                    ..TelemetryRecord::new(if i % 2 == 0 { "P1" } else { "P2" })
                })
            })
            .collect();

        let report = HealthClassifier::default().classify(&records).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.panels()[0].panel_id, "P1");
        let total: usize = report.panels().iter().map(|p| p.total_readings).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn test_report_serializes_as_panel_map() {
        let report = HealthClassifier::default()
            .classify(&panel_with_rate("Panel_01", 10, 1))
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["Panel_01"]["health_status"], "Poor");
        assert_eq!(json["Panel_01"]["priority"], 2);
        assert!(json["Panel_01"].get("panel_id").is_none());
    }
}
