//! Incremental travel-time statistics.
//!
//! Raw measurements are collected in batches; each full batch becomes one
//! period average that is folded into the running `count`/`total`/`avg`.

use serde::{Deserialize, Serialize};

/// Number of raw samples folded into one period average unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Running aggregate for one route, either for a single day or all time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatRecord {
    pub count: u64,
    pub total: f64,
    #[serde(rename = "avg")]
    pub average: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
    #[serde(rename = "samples", skip_serializing_if = "Vec::is_empty")]
    pub pending_samples: Vec<u32>,
}

/// One completed batch of raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub average: u32,
    pub min: u32,
    pub max: u32,
}

impl Period {
    /// Summarises a non-empty batch. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[u32]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let values: Vec<f64> = samples.iter().copied().map(f64::from).collect();

        Some(Period {
            average: round_minutes(mean(&values)),
            min,
            max,
        })
    }

    /// A period whose extrema collapse to its average, as seen by the all-time rollup.
    pub fn averaged(average: u32) -> Self {
        Period {
            average,
            min: average,
            max: average,
        }
    }
}

impl StatRecord {
    /// Appends a raw sample and, once `batch_size` samples are pending,
    /// folds them into this record and returns the completed period.
    pub fn push_sample(&mut self, minutes: u32, batch_size: usize) -> Option<Period> {
        self.pending_samples.push(minutes);
        if self.pending_samples.len() < batch_size.max(1) {
            return None;
        }

        let period = Period::from_samples(&self.pending_samples)?;
        self.pending_samples.clear();
        self.fold(period);
        Some(period)
    }

    /// Folds one completed period into the running totals.
    pub fn fold(&mut self, period: Period) {
        self.min = Some(self.min.map_or(period.min, |m| m.min(period.min)));
        self.max = Some(self.max.map_or(period.max, |m| m.max(period.max)));
        self.count += 1;
        self.total += f64::from(period.average);
        self.average = Some(round_minutes(self.total / self.count as f64));
    }

    /// Records written by older versions carry an `avg` without a `count`.
    pub fn has_history(&self) -> bool {
        self.count > 0 || self.average.is_some()
    }
}

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Rounds to the nearest whole minute, half away from zero. Negative input clamps to 0.
pub fn round_minutes(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(f64::from(u32::MAX)) as u32
}
