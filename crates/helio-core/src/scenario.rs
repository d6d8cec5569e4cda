//! What-if annual yield estimate for a planned installation
//!
//! Pure and deterministic: a product of geometric and maintenance derates over
//! a latitude-based peak-sun-hours baseline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How often the array is cleaned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CleaningFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Annually,
    /// Any label outside the known schedule
    Other(String),
}

impl CleaningFrequency {
    pub fn efficiency(&self) -> f64 {
        match self {
            Self::Weekly => 0.98,
            Self::Monthly => 0.95,
            Self::Quarterly => 0.90,
            Self::Annually => 0.85,
            Self::Other(_) => 0.95,
        }
    }
}

impl From<String> for CleaningFrequency {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Weekly" => Self::Weekly,
            "Monthly" => Self::Monthly,
            "Quarterly" => Self::Quarterly,
            "Annually" => Self::Annually,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for CleaningFrequency {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<CleaningFrequency> for String {
    fn from(c: CleaningFrequency) -> Self {
        c.to_string()
    }
}

impl fmt::Display for CleaningFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "Weekly"),
            Self::Monthly => write!(f, "Monthly"),
            Self::Quarterly => write!(f, "Quarterly"),
            Self::Annually => write!(f, "Annually"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    #[serde(alias = "num_panels")]
    pub panel_count: u32,
    /// Watts per panel
    pub panel_wattage: f64,
    /// Degrees from horizontal
    pub tilt_angle: f64,
    pub latitude: f64,
    /// Degrees clockwise from north
    pub azimuth: f64,
    #[serde(alias = "shading_factor")]
    pub shading_factor_percent: f64,
    pub cleaning_frequency: CleaningFrequency,
    #[serde(alias = "degradation_rate")]
    pub degradation_rate_percent: f64,
}

/// Component derates behind an estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyBreakdown {
    pub tilt: f64,
    pub azimuth: f64,
    pub shading: f64,
    pub cleaning: f64,
    pub degradation: f64,
}

impl EfficiencyBreakdown {
    pub fn total(&self) -> f64 {
        self.tilt * self.azimuth * self.shading * self.cleaning * self.degradation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioEstimate {
    pub annual_output_kwh: f64,
    pub peak_sun_hours: f64,
    pub efficiency: EfficiencyBreakdown,
}

pub struct ScenarioSimulator;

impl ScenarioSimulator {
    pub fn peak_sun_hours(latitude: f64) -> f64 {
        6.5 - 4.0 * latitude.abs() / 90.0
    }

    /// Panels face the equator
    pub fn optimal_azimuth(latitude: f64) -> f64 {
        if latitude >= 0.0 { 180.0 } else { 0.0 }
    }

    pub fn estimate(params: &ScenarioParams) -> ScenarioEstimate {
        let peak_sun_hours = Self::peak_sun_hours(params.latitude);

        let tilt_off = (params.tilt_angle - params.latitude).abs();
        let azimuth_off = (params.azimuth - Self::optimal_azimuth(params.latitude))
            .abs()
            .min(90.0);

        let efficiency = EfficiencyBreakdown {
            tilt: tilt_off.to_radians().cos(),
            azimuth: azimuth_off.to_radians().cos(),
            shading: 1.0 - params.shading_factor_percent / 100.0,
            cleaning: params.cleaning_frequency.efficiency(),
            degradation: 1.0 - params.degradation_rate_percent / 100.0,
        };

        let annual_output_kwh = params.panel_wattage
            * peak_sun_hours
            * params.panel_count as f64
            * 365.0
            * efficiency.total()
            / 1000.0;

        ScenarioEstimate {
            annual_output_kwh,
            peak_sun_hours,
            efficiency,
        }
    }

    /// Estimated annual yield in kWh
    pub fn annual_output_kwh(params: &ScenarioParams) -> f64 {
        Self::estimate(params).annual_output_kwh
    }
}
