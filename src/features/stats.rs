//! Streaming aggregation of per-frame measurements.

use serde::{Deserialize, Serialize};

/// Welford accumulator for mean and population variance.
///
/// Values are folded in the order they are pushed, so the same sequence always
/// yields bit-identical statistics. An empty accumulator reports zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the accumulator.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance; zero for fewer than two observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Spread between the largest and smallest observation.
    pub fn range(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max - self.min
        }
    }

    pub fn summary(&self) -> MeanVar {
        MeanVar {
            mean: self.mean(),
            variance: self.variance(),
        }
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = RunningStats::new();
        stats.extend(iter);
        stats
    }
}

/// Mean and variance of one per-frame measurement across a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanVar {
    pub mean: f64,
    pub variance: f64,
}

impl MeanVar {
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.variance.is_finite()
    }
}

/// Strongest true local maximum of a normalised autocorrelation within
/// `[min_lag, max_lag]`, refined by parabolic interpolation.
///
/// A lag only counts when it rises above its left neighbour and is not
/// exceeded by its right neighbour, so the falling edge near lag 0 and a curve
/// still climbing at `max_lag` are never mistaken for a period. Returns the
/// refined lag and the peak height.
pub fn strongest_peak(acf: &[f64], min_lag: usize, max_lag: usize) -> Option<(f64, f64)> {
    let max_lag = max_lag.min(acf.len().saturating_sub(2));
    if min_lag < 1 || min_lag > max_lag {
        return None;
    }
    let lag = (min_lag..=max_lag)
        .filter(|&lag| acf[lag - 1] < acf[lag] && acf[lag] >= acf[lag + 1])
        .max_by(|&a, &b| acf[a].total_cmp(&acf[b]).then(b.cmp(&a)))?;

    let (a, b, c) = (acf[lag - 1], acf[lag], acf[lag + 1]);
    let denom = a - 2.0 * b + c;
    let refined = if denom.abs() > f64::EPSILON {
        lag as f64 + 0.5 * (a - c) / denom
    } else {
        lag as f64
    };
    Some((refined, b))
}
