//! Synthetic weather history and forecasts for offline training

use crate::generator::{hour_factor, season_factor};
use chrono::{Duration, NaiveDate};
use helio_core::{AnalyticsError, Result, WeatherRecord};
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub start_date: NaiveDate,
    pub seed: u64,
    /// Irradiance at solar noon under clear sky, W/m²
    pub clear_sky_irradiance: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            seed: 42,
            clear_sky_irradiance: 1000.0,
        }
    }
}

pub struct WeatherGenerator {
    config: WeatherConfig,
    rng: StdRng,
}

struct Sky {
    cloud_cover: f64,
    base_temp: f64,
    season: f64,
}

impl WeatherGenerator {
    pub fn new(config: WeatherConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    fn sky(&mut self, date: NaiveDate) -> Result<Sky> {
        let clear =
            Beta::<f64>::new(5.0, 2.0).map_err(|e| AnalyticsError::Config(e.to_string()))?;
        let season = season_factor(date);
        Ok(Sky {
            // Beta(5,2) is the clear-sky fraction
            cloud_cover: ((1.0 - clear.sample(&mut self.rng)) * 100.0).clamp(0.0, 100.0),
            base_temp: 18.0 + 12.0 * season,
            season,
        })
    }

    fn reading(&mut self, sky: &Sky, sun: f64) -> Result<WeatherRecord> {
        let noise =
            Normal::<f64>::new(0.0, 1.0).map_err(|e| AnalyticsError::Config(e.to_string()))?;
        let clear_fraction = 1.0 - sky.cloud_cover / 100.0;
        let clear_sky = self.config.clear_sky_irradiance * sun * sky.season.min(1.0);
        let irradiance =
            (clear_sky * clear_fraction + 15.0 * noise.sample(&mut self.rng)).max(0.0);
        let temperature =
            sky.base_temp + 12.0 * sun * clear_fraction + 1.5 * noise.sample(&mut self.rng);
        let humidity = (80.0 - (temperature - 20.0) * 2.0 + 5.0 * noise.sample(&mut self.rng))
            .clamp(20.0, 95.0);

        Ok(WeatherRecord {
            temperature: Some(temperature),
            irradiance: Some(irradiance),
            humidity: Some(humidity),
            cloud_cover: Some(sky.cloud_cover),
            ..Default::default()
        })
    }

    /// Hourly rows over `days` days, night hours included
    pub fn hourly(&mut self, days: u32) -> Result<Vec<WeatherRecord>> {
        let mut rows = Vec::with_capacity(days as usize * 24);
        for day in 0..days {
            let date = self.config.start_date + Duration::days(day as i64);
            let sky = self.sky(date)?;
            for hour in 0..24 {
                let jitter: f64 = self.rng.random_range(-5.0..5.0);
                let mut row = self.reading(&sky, hour_factor(hour))?;
                row.cloud_cover = row.cloud_cover.map(|c| (c + jitter).clamp(0.0, 100.0));
                row.timestamp = date.and_hms_opt(hour, 0, 0).map(|t| t.and_utc());
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// One midday row per day, in the shape of a daily forecast
    pub fn daily(&mut self, days: u32) -> Result<Vec<WeatherRecord>> {
        (0..days)
            .map(|day| {
                let date = self.config.start_date + Duration::days(day as i64);
                let sky = self.sky(date)?;
                let mut row = self.reading(&sky, hour_factor(12))?;
                row.timestamp = date.and_hms_opt(12, 0, 0).map(|t| t.and_utc());
                Ok(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_shape_and_night() {
        let rows = WeatherGenerator::new(WeatherConfig::default()).hourly(3).unwrap();
        assert_eq!(rows.len(), 72);
        for r in &rows[..4] {
            // before 05:00 the sun term is zero, only noise remains
            assert!(r.irradiance.unwrap() < 60.0);
        }
        assert!(rows.iter().all(|r| {
            let c = r.cloud_cover.unwrap();
            (0.0..=100.0).contains(&c)
        }));
    }

    #[test]
    fn test_daily_forecast() {
        let config = WeatherConfig {
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ..Default::default()
        };
        let rows = WeatherGenerator::new(config).daily(7).unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.timestamp.is_some()));
        assert!(rows.iter().any(|r| r.irradiance.unwrap() > 100.0));
    }
}
