//! Monte Carlo sample sets, the one distribution representation.
//!
//! Sample sets support pointwise arithmetic with numbers and with other
//! sample sets of the same length, plus a handful of summary statistics.
//! Samples are drawn from the run's seeded `Rng`.

use serde::{Deserialize, Serialize};

use crate::errors::{runtime_error, EvalError};
use crate::rng::Rng;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleSet {
    samples: Vec<f64>,
}

impl PartialEq for SampleSet {
    /// Bitwise sample equality: identical seeds must give identical sets.
    fn eq(&self, other: &Self) -> bool {
        self.samples.len() == other.samples.len()
            && self
                .samples
                .iter()
                .zip(&other.samples)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl SampleSet {
    pub fn from_samples(samples: Vec<f64>) -> Result<Self, EvalError> {
        if samples.is_empty() {
            return Err(runtime_error("a sample set needs at least one sample"));
        }
        Ok(SampleSet { samples })
    }

    pub fn normal(mean: f64, stdev: f64, count: u32, rng: &mut Rng) -> Result<Self, EvalError> {
        if !mean.is_finite() || !stdev.is_finite() || stdev < 0.0 {
            return Err(runtime_error(format!(
                "normal({mean}, {stdev}): standard deviation must be finite and non-negative"
            )));
        }
        Self::from_samples(
            (0..count)
                .map(|_| mean + stdev * rng.next_normal())
                .collect(),
        )
    }

    pub fn uniform(low: f64, high: f64, count: u32, rng: &mut Rng) -> Result<Self, EvalError> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(runtime_error(format!(
                "uniform({low}, {high}): bounds must be finite with low <= high"
            )));
        }
        Self::from_samples(
            (0..count)
                .map(|_| low + (high - low) * rng.next_f64())
                .collect(),
        )
    }

    pub fn point_mass(x: f64, count: u32) -> Result<Self, EvalError> {
        Self::from_samples(vec![x; count as usize])
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> SampleSet {
        SampleSet {
            samples: self.samples.iter().copied().map(f).collect(),
        }
    }

    /// Pointwise combination; both sets must have the same length.
    pub fn zip_with(
        &self,
        other: &SampleSet,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<SampleSet, EvalError> {
        if self.len() != other.len() {
            return Err(runtime_error(format!(
                "cannot combine sample sets of length {} and {}",
                self.len(),
                other.len()
            )));
        }
        Ok(SampleSet {
            samples: self
                .samples
                .iter()
                .zip(&other.samples)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    #[expect(clippy::cast_precision_loss, reason = "sample counts fit in f64")]
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation.
    #[expect(clippy::cast_precision_loss, reason = "sample counts fit in f64")]
    pub fn stdev(&self) -> f64 {
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Linear-interpolated quantile, `p` in `[0, 1]`.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "index arithmetic on small non-negative values"
    )]
    pub fn quantile(&self, p: f64) -> Result<f64, EvalError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(runtime_error(format!("quantile {p} is outside [0, 1]")));
        }
        let sorted = self.sorted();
        let position = p * (sorted.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        let weight = position - lower as f64;
        Ok(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
    }

    /// Sample counts in `buckets` equal-width bins between min and max.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "bucket arithmetic on small non-negative values"
    )]
    pub fn histogram(&self, buckets: u32) -> Vec<(f64, usize)> {
        let buckets = buckets.max(1) as usize;
        let sorted = self.sorted();
        let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
        let width = (max - min) / buckets as f64;
        let mut counts = vec![0usize; buckets];
        for x in sorted {
            let idx = if width > 0.0 {
                (((x - min) / width) as usize).min(buckets - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, c)| (min + width * i as f64, c))
            .collect()
    }

    /// One sample picked by the RNG.
    #[expect(clippy::cast_possible_truncation, reason = "modulo a usize length")]
    pub fn draw(&self, rng: &mut Rng) -> f64 {
        let idx = (rng.next_u64() % self.samples.len() as u64) as usize;
        self.samples[idx]
    }
}
