//! Cumulative energy from a power time series
//!
//! ```text
//! E = Σ power_i · Δt_i      Δt_i = max(0, t_i − t_{i−1}) in hours, Δt_0 = 0
//! ```
//!
//! Each sample's power is charged for the interval that ends at it. Samples
//! are consumed in the order given; the series is never re-sorted, so an
//! out-of-order timestamp only contributes a zero interval.

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// One live power reading. Missing power counts as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub timestamp: DateTime<Utc>,
    pub power: Option<f64>,
}

impl PowerSample {
    pub fn new(timestamp: DateTime<Utc>, power: f64) -> Self {
        Self {
            timestamp,
            power: Some(power),
        }
    }
}

/// Streaming integrator; energy is in power-unit × hours
#[derive(Debug, Clone, Default)]
pub struct EnergyAccumulator {
    previous: Option<DateTime<Utc>>,
    total: f64,
    samples: usize,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample and return the energy it contributed
    pub fn push(&mut self, sample: &PowerSample) -> Result<f64> {
        let power = match sample.power {
            Some(p) if p.is_infinite() => {
                return Err(AnalyticsError::MalformedInput {
                    column: "power".to_string(),
                    row: self.samples,
                    value: p,
                });
            }
            Some(p) if !p.is_nan() => p,
            _ => 0.0,
        };

        let hours = match self.previous {
            Some(prev) => {
                let seconds = (sample.timestamp - prev).as_seconds_f64();
                (seconds / SECONDS_PER_HOUR).max(0.0)
            }
            None => 0.0,
        };

        let energy = power * hours;
        self.total += energy;
        self.previous = Some(sample.timestamp);
        self.samples += 1;
        Ok(energy)
    }

    pub fn extend<'a>(
        &mut self,
        samples: impl IntoIterator<Item = &'a PowerSample>,
    ) -> Result<f64> {
        for sample in samples {
            self.push(sample)?;
        }
        Ok(self.total)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// Total energy over a series
pub fn integrate(samples: &[PowerSample]) -> Result<f64> {
    EnergyAccumulator::new().extend(samples)
}

/// Running total after each sample
pub fn cumulative(samples: &[PowerSample]) -> Result<Vec<f64>> {
    let mut acc = EnergyAccumulator::new();
    samples
        .iter()
        .map(|s| {
            acc.push(s)?;
            Ok(acc.total())
        })
        .collect()
}
