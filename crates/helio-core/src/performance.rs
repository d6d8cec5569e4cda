//! Live performance comparison and impact metrics
//!
//! Compares the model's predicted power against live telemetry and turns the
//! prediction into a few consumer-facing equivalents. Clamping of predicted
//! values to non-negative happens here, at the point of use.

use crate::accumulator::{EnergyAccumulator, PowerSample};
use crate::error::{AnalyticsError, Result};
use crate::telemetry::TelemetryRecord;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maps model output (W, whole installation) onto the monitored panel (mW)
    pub prediction_scale: f64,
    /// Local hour at which the daylight window opens
    pub day_start_hour: u32,
    /// Site offset from UTC, in minutes
    pub utc_offset_minutes: i32,
    pub phone_charge_watts: f64,
    pub ev_km_per_kw: f64,
    pub co2_grams_per_kwh: f64,
    /// Multiplier applied to daily forecast predictions
    pub forecast_power_scale: f64,
    /// Reference capacity and efficiency the model output is expressed against
    pub reference_capacity: f64,
    pub reference_efficiency: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            prediction_scale: 10.0 / 7047.0,
            day_start_hour: 6,
            utc_offset_minutes: 330,
            phone_charge_watts: 15.0,
            ev_km_per_kw: 6.0,
            co2_grams_per_kwh: 475.0,
            forecast_power_scale: 50.0,
            reference_capacity: 10.0,
            reference_efficiency: 20.0,
        }
    }
}

impl PerformanceConfig {
    pub fn site_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AnalyticsError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}

/// One row from the live metrics feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    #[serde(alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voltage: Option<f64>,
    /// Amperes
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    /// Watts
    #[serde(default)]
    pub power: Option<f64>,
}

/// Latest live values in display units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub voltage: f64,
    pub current_ma: f64,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSummary {
    pub latest: Option<LiveSnapshot>,
    pub latest_power_mw: f64,
    /// Energy in mWh over the whole feed
    pub actual_energy_mwh: f64,
}

fn finite_or_zero(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

/// Summarize a time-ordered live feed. The last row is taken as the latest.
///
/// Rows without a timestamp are skipped by the energy integration.
pub fn summarize_live(readings: &[LiveReading], config: &PerformanceConfig) -> Result<LiveSummary> {
    let Some(last) = readings.last() else {
        return Ok(LiveSummary {
            latest: None,
            latest_power_mw: 0.0,
            actual_energy_mwh: 0.0,
        });
    };

    let offset = config.site_offset()?;
    let mut acc = EnergyAccumulator::new();
    for reading in readings {
        if let Some(timestamp) = reading.timestamp {
            acc.push(&PowerSample {
                timestamp,
                power: reading.power.map(|w| w * 1000.0),
            })?;
        }
    }

    let latest = LiveSnapshot {
        timestamp: last.timestamp.map(|t| t.with_timezone(&offset)),
        voltage: finite_or_zero(last.voltage),
        current_ma: finite_or_zero(last.current) * 1000.0,
        temperature: finite_or_zero(last.temperature),
        humidity: finite_or_zero(last.humidity),
    };

    Ok(LiveSummary {
        latest: Some(latest),
        latest_power_mw: finite_or_zero(last.power) * 1000.0,
        actual_energy_mwh: acc.total(),
    })
}

/// Hours since the local start of the daylight window, never negative.
///
/// Only hour and minute are reset, matching a wall-clock "06:00 today".
pub fn daylight_hours_elapsed(now: DateTime<Utc>, config: &PerformanceConfig) -> Result<f64> {
    let local = now.with_timezone(&config.site_offset()?);
    let start = local
        .with_hour(config.day_start_hour)
        .and_then(|t| t.with_minute(0))
        .ok_or_else(|| {
            let hour = config.day_start_hour;
            AnalyticsError::Config(format!("day_start_hour out of range: {}", hour))
        })?;
    let seconds = (local - start).as_seconds_f64();
    Ok((seconds / 3600.0).max(0.0))
}

/// Inputs for one performance assessment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInputs {
    /// Raw model output, watts
    pub predicted_power_w: f64,
    pub latest_power_mw: f64,
    pub actual_energy_mwh: f64,
    pub daylight_hours: f64,
    /// Price per kWh
    pub energy_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub predicted_power_mw: f64,
    pub power_difference_mw: f64,
    pub percent_difference: f64,
    pub predicted_energy_mwh: f64,
    pub est_revenue_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpactMetrics {
    pub phones_charged_per_hour: f64,
    pub ev_range_added_per_hour_km: f64,
    pub co2_avoided_grams_today: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assessment {
    pub performance: PerformanceReport,
    pub impact: ImpactMetrics,
}

pub fn assess(inputs: &PerformanceInputs, config: &PerformanceConfig) -> Assessment {
    let predicted_w = inputs.predicted_power_w;
    let predicted_power_mw = (predicted_w * 1000.0).max(0.0) * config.prediction_scale;

    let power_difference_mw = (predicted_power_mw - inputs.latest_power_mw).max(0.0);
    let percent_difference = if predicted_power_mw > 0.0 {
        power_difference_mw / predicted_power_mw * 100.0
    } else {
        0.0
    };

    let predicted_energy_mwh = predicted_power_mw * inputs.daylight_hours;
    // mWh -> kWh
    let est_revenue_loss =
        (predicted_energy_mwh - inputs.actual_energy_mwh).max(0.0) / 1e6 * inputs.energy_price;

    debug!(predicted_power_mw, power_difference_mw, "Performance assessed");

    Assessment {
        performance: PerformanceReport {
            predicted_power_mw,
            power_difference_mw,
            percent_difference,
            predicted_energy_mwh,
            est_revenue_loss,
        },
        impact: ImpactMetrics {
            phones_charged_per_hour: predicted_w / config.phone_charge_watts,
            ev_range_added_per_hour_km: predicted_w / 1000.0 * config.ev_km_per_kw,
            co2_avoided_grams_today: predicted_w * inputs.daylight_hours / 1000.0
                * config.co2_grams_per_kwh,
        },
    }
}

/// Scale a raw prediction to an installation of the given capacity and efficiency
pub fn forecast_output_kwh(
    prediction: f64,
    panel_capacity: f64,
    panel_efficiency: f64,
    config: &PerformanceConfig,
) -> f64 {
    prediction * panel_capacity / config.reference_capacity * panel_efficiency
        / config.reference_efficiency
}

/// Daily forecast power, clamped at zero
pub fn forecast_power_mw(prediction: f64, config: &PerformanceConfig) -> f64 {
    (prediction * config.forecast_power_scale).max(0.0)
}

/// Energy produced by the whole fleet on one calendar day, kWh
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyEnergy {
    pub date: NaiveDate,
    pub energy: f64,
}

/// Fleet-wide production figures over a reporting window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub total_energy_kwh: f64,
    pub avg_daily_output_kwh: f64,
    /// Largest single reading, kWh
    pub peak_output_kwh: f64,
    /// One entry per UTC calendar day, oldest first
    pub energy_trend: Vec<DailyEnergy>,
}

/// Summarize `energy_output` (Wh) over a window of `days` days.
///
/// Missing and non-finite outputs are skipped. Records without a timestamp
/// count towards the totals but not the daily trend. Trend values are
/// rounded to two decimals.
pub fn fleet_summary(records: &[TelemetryRecord], days: u32) -> FleetSummary {
    let mut total_wh = 0.0;
    let mut peak_wh: Option<f64> = None;
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in records {
        let Some(wh) = record.energy_output.filter(|v| v.is_finite()) else {
            continue;
        };
        total_wh += wh;
        peak_wh = Some(peak_wh.map_or(wh, |p| p.max(wh)));
        if let Some(timestamp) = record.timestamp {
            *per_day.entry(timestamp.date_naive()).or_insert(0.0) += wh;
        }
    }

    let total_energy_kwh = total_wh / 1000.0;
    let avg_daily_output_kwh = if days > 0 {
        total_energy_kwh / days as f64
    } else {
        0.0
    };
    let energy_trend = per_day
        .into_iter()
        .map(|(date, wh)| DailyEnergy {
            date,
            energy: (wh / 1000.0 * 100.0).round() / 100.0,
        })
        .collect();

    debug!(records = records.len(), total_energy_kwh, "Fleet summarized");

    FleetSummary {
        total_energy_kwh,
        avg_daily_output_kwh,
        peak_output_kwh: peak_wh.unwrap_or(0.0) / 1000.0,
        energy_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inputs(predicted_power_w: f64) -> PerformanceInputs {
        PerformanceInputs {
            predicted_power_w,
            latest_power_mw: 0.0,
            actual_energy_mwh: 0.0,
            daylight_hours: 0.0,
            energy_price: 8.0,
        }
    }

    #[test]
    fn test_prediction_scaled_to_panel() {
        let config = PerformanceConfig::default();
        let out = assess(&inputs(7047.0), &config);
        assert!((out.performance.predicted_power_mw - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_power_loss_against_live() {
        let config = PerformanceConfig::default();
        let out = assess(
            &PerformanceInputs {
                latest_power_mw: 2_500.0,
                ..inputs(7047.0)
            },
            &config,
        );
        assert!((out.performance.power_difference_mw - 7_500.0).abs() < 1e-6);
        assert!((out.performance.percent_difference - 75.0).abs() < 1e-6);

        // Overperformance is not a loss
        let out = assess(
            &PerformanceInputs {
                latest_power_mw: 20_000.0,
                ..inputs(7047.0)
            },
            &config,
        );
        assert_eq!(out.performance.power_difference_mw, 0.0);
    }

    #[test]
    fn test_negative_prediction_clamped() {
        let out = assess(&inputs(-40.0), &PerformanceConfig::default());
        assert_eq!(out.performance.predicted_power_mw, 0.0);
        assert_eq!(out.performance.percent_difference, 0.0);
    }

    #[test]
    fn test_revenue_loss() {
        let config = PerformanceConfig::default();
        let out = assess(
            &PerformanceInputs {
                daylight_hours: 4.0,
                actual_energy_mwh: 10_000.0,
                ..inputs(7047.0)
            },
            &config,
        );
        // 40_000 mWh predicted, 10_000 measured, 30 Wh at 8 per kWh
        assert!((out.performance.predicted_energy_mwh - 40_000.0).abs() < 1e-6);
        assert!((out.performance.est_revenue_loss - 0.24).abs() < 1e-9);
    }

    #[test]
    fn test_impact_equivalents() {
        let out = assess(
            &PerformanceInputs {
                daylight_hours: 2.0,
                ..inputs(300.0)
            },
            &PerformanceConfig::default(),
        );
        assert_eq!(out.impact.phones_charged_per_hour, 20.0);
        assert!((out.impact.ev_range_added_per_hour_km - 1.8).abs() < 1e-12);
        assert!((out.impact.co2_avoided_grams_today - 285.0).abs() < 1e-9);

        let zero = assess(&inputs(0.0), &PerformanceConfig::default());
        assert_eq!(zero.impact.phones_charged_per_hour, 0.0);
    }

    #[test]
    fn test_daylight_window() {
        let config = PerformanceConfig::default();
        // 04:30 UTC is 10:00 local at +05:30
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 4, 30, 0).unwrap();
        assert!((daylight_hours_elapsed(now, &config).unwrap() - 4.0).abs() < 1e-12);

        // 23:00 UTC is 04:30 local, before the window opens
        let early = Utc.with_ymd_and_hms(2026, 6, 1, 23, 0, 0).unwrap();
        assert_eq!(daylight_hours_elapsed(early, &config).unwrap(), 0.0);
    }

    #[test]
    fn test_live_summary() {
        let t0 = Utc.with_ymd_and_hms(2026, 6, 1, 4, 0, 0).unwrap();
        let readings: Vec<LiveReading> = (0..3)
            .map(|i| LiveReading {
                timestamp: Some(t0 + chrono::Duration::minutes(30 * i)),
                voltage: Some(5.0),
                current: Some(0.2),
                temperature: Some(31.0),
                humidity: Some(40.0),
                power: Some(1.0),
            })
            .collect();

        let summary = summarize_live(&readings, &PerformanceConfig::default()).unwrap();
        let latest = summary.latest.unwrap();
        assert!((latest.current_ma - 200.0).abs() < 1e-9);
        assert_eq!(summary.latest_power_mw, 1000.0);
        // Two half-hour intervals at 1000 mW
        assert!((summary.actual_energy_mwh - 1000.0).abs() < 1e-9);
        assert_eq!(latest.timestamp.unwrap().offset().local_minus_utc(), 330 * 60);
    }

    #[test]
    fn test_empty_live_feed() {
        let summary = summarize_live(&[], &PerformanceConfig::default()).unwrap();
        assert!(summary.latest.is_none());
        assert_eq!(summary.actual_energy_mwh, 0.0);
    }

    #[test]
    fn test_forecast_scaling() {
        let config = PerformanceConfig::default();
        assert!((forecast_output_kwh(100.0, 5.0, 18.0, &config) - 45.0).abs() < 1e-9);
        assert_eq!(forecast_power_mw(-2.0, &config), 0.0);
        assert_eq!(forecast_power_mw(3.0, &config), 150.0);
    }

    fn produced(day: u32, hour: u32, wh: Option<f64>) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Some(Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()),
            energy_output: wh,
            ..TelemetryRecord::new("Panel_01")
        }
    }

    #[test]
    fn test_fleet_summary_totals_and_trend() {
        let records = vec![
            produced(2, 9, Some(1500.0)),
            produced(1, 10, Some(1234.0)),
            produced(1, 12, Some(2000.0)),
            produced(2, 23, Some(500.0)),
            produced(3, 12, None),
            produced(3, 13, Some(f64::NAN)),
        ];
        let summary = fleet_summary(&records, 2);

        assert!((summary.total_energy_kwh - 5.234).abs() < 1e-12);
        assert!((summary.avg_daily_output_kwh - 2.617).abs() < 1e-12);
        assert_eq!(summary.peak_output_kwh, 2.0);

        // grouped by calendar date, sorted, rounded to 2 dp
        let trend: Vec<(String, f64)> = summary
            .energy_trend
            .iter()
            .map(|d| (d.date.to_string(), d.energy))
            .collect();
        assert_eq!(
            trend,
            vec![("2026-03-01".to_string(), 3.23), ("2026-03-02".to_string(), 2.0)]
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["energy_trend"][0]["date"], "2026-03-01");
    }

    #[test]
    fn test_fleet_summary_without_timestamps_or_data() {
        let mut undated = produced(1, 12, Some(800.0));
        undated.timestamp = None;
        let summary = fleet_summary(&[undated], 0);
        assert!((summary.total_energy_kwh - 0.8).abs() < 1e-12);
        assert_eq!(summary.avg_daily_output_kwh, 0.0);
        assert!(summary.energy_trend.is_empty());

        let empty = fleet_summary(&[], 30);
        assert_eq!(empty.total_energy_kwh, 0.0);
        assert_eq!(empty.peak_output_kwh, 0.0);
    }
}
