//! Telemetry and weather record types consumed by the analytics layer.

use crate::features::{Feature, FeatureSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One panel reading as produced by the upstream collector.
///
/// Every numeric column is optional: a missing value is zero-filled at the
/// point of use, never imputed. Columns the analytics layer does not know
/// about are carried through untouched in `extra`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    #[serde(default, alias = "datetime", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub panel_id: String,
    #[serde(default)]
    pub irradiance: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub energy_output: Option<f64>,
    #[serde(default)]
    pub panel_voltage: Option<f64>,
    #[serde(default)]
    pub panel_current: Option<f64>,
    #[serde(default)]
    pub panel_power: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TelemetryRecord {
    pub fn new(panel_id: impl Into<String>) -> Self {
        Self {
            panel_id: panel_id.into(),
            ..Default::default()
        }
    }
}

impl FeatureSource for TelemetryRecord {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::EnergyOutput => self.energy_output,
            Feature::PanelVoltage => self.panel_voltage,
            Feature::PanelCurrent => self.panel_current,
            Feature::PanelPower => self.panel_power,
            Feature::Irradiance => self.irradiance,
            Feature::Temperature => self.temperature,
            Feature::Humidity => self.humidity,
            Feature::CloudCover => None,
        }
    }
}

/// Fill in `panel_power = panel_voltage * panel_current` for a batch that has
/// no power column at all.
///
/// The derivation is all-or-nothing per batch: if any record already carries a
/// power value the batch is returned as-is. Records missing either voltage or
/// current keep `panel_power = None`.
pub fn derive_panel_power(records: &[TelemetryRecord]) -> Vec<TelemetryRecord> {
    let has_power = records.iter().any(|r| r.panel_power.is_some());
    let has_voltage = records.iter().any(|r| r.panel_voltage.is_some());
    let has_current = records.iter().any(|r| r.panel_current.is_some());

    if has_power || !has_voltage || !has_current {
        return records.to_vec();
    }

    records
        .iter()
        .map(|r| {
            let mut enriched = r.clone();
            enriched.panel_power = match (r.panel_voltage, r.panel_current) {
                (Some(v), Some(i)) => Some(v * i),
                _ => None,
            };
            enriched
        })
        .collect()
}

/// Historical or forecast weather row.
///
/// `actual_output` is the measured ground truth when a collector supplies it;
/// training falls back to a physics-derived target otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WeatherRecord {
    #[serde(default, alias = "date", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub irradiance: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<f64>,
}

impl FeatureSource for WeatherRecord {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Temperature => self.temperature,
            Feature::Irradiance => self.irradiance,
            Feature::Humidity => self.humidity,
            Feature::CloudCover => self.cloud_cover,
            _ => None,
        }
    }
}

/// The fixed four-field predictor input, in schema order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct WeatherFeatureVector {
    pub temperature: f64,
    pub irradiance: f64,
    pub humidity: f64,
    pub cloud_cover: f64,
}

impl WeatherFeatureVector {
    pub fn new(temperature: f64, irradiance: f64, humidity: f64, cloud_cover: f64) -> Self {
        Self {
            temperature,
            irradiance,
            humidity,
            cloud_cover,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.temperature,
            self.irradiance,
            self.humidity,
            self.cloud_cover,
        ]
    }
}

impl FeatureSource for WeatherFeatureVector {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Temperature => Some(self.temperature),
            Feature::Irradiance => Some(self.irradiance),
            Feature::Humidity => Some(self.humidity),
            Feature::CloudCover => Some(self.cloud_cover),
            _ => None,
        }
    }
}
