//! Recording quality: signal-to-noise ratio, dynamic range and clipping.
//!
//! The noise floor is the [`NOISE_PERCENTILE`] frame level and the signal
//! level the [`SIGNAL_PERCENTILE`] frame level, so pauses between words act as
//! the noise reference.

use serde::{Deserialize, Serialize};

use super::pitch::frame_rms;
use super::stft::FrameLayout;
use crate::constants::analysis::{
    CLIPPING_LEVEL, MAX_SNR_DB, NOISE_PERCENTILE, SIGNAL_PERCENTILE, VOICING_RMS_FLOOR,
};

const SNR_WEIGHT: f64 = 0.4;
const DYNAMIC_RANGE_WEIGHT: f64 = 0.4;
const CLIPPING_WEIGHT: f64 = 0.2;

/// Quality measurements of a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioQuality {
    /// Loud-frame to quiet-frame level ratio in dB, in `[0, MAX_SNR_DB]`.
    pub snr_db: f64,
    /// Peak minus trough of the absolute sample amplitude.
    pub dynamic_range: f64,
    /// Fraction of samples at or beyond [`CLIPPING_LEVEL`].
    pub clipping_ratio: f64,
}

impl AudioQuality {
    /// Overall quality in `[0, 100]`.
    ///
    /// Weighted blend of SNR, dynamic range and the absence of clipping.
    pub fn score(&self) -> f64 {
        let score = SNR_WEIGHT * (self.snr_db / MAX_SNR_DB) * 100.0
            + DYNAMIC_RANGE_WEIGHT * self.dynamic_range * 100.0
            + CLIPPING_WEIGHT * (1.0 - self.clipping_ratio) * 100.0;
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        }
    }
}

/// Value at fraction `q` of an ascending slice (nearest rank).
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() - 1) as f64 * q.clamp(0.0, 1.0)).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Measure the recording quality of a clip.
pub fn analyze(samples: &[f32], layout: FrameLayout) -> AudioQuality {
    if samples.is_empty() {
        return AudioQuality::default();
    }

    let mut levels: Vec<f64> = layout.frames(samples).map(frame_rms).collect();
    levels.sort_by(f64::total_cmp);
    let signal = percentile(&levels, SIGNAL_PERCENTILE);
    let noise = percentile(&levels, NOISE_PERCENTILE);
    let snr_db = if signal < VOICING_RMS_FLOOR {
        0.0
    } else {
        // Digital silence in the pauses is floored rather than infinite.
        let floor = noise.max(signal * 10f64.powf(-MAX_SNR_DB / 20.0));
        (20.0 * (signal / floor).log10()).clamp(0.0, MAX_SNR_DB)
    };

    let (peak, trough) = samples
        .iter()
        .map(|s| s.abs())
        .fold((0.0f32, f32::INFINITY), |(hi, lo), a| (hi.max(a), lo.min(a)));
    let clipped = samples.iter().filter(|s| s.abs() >= CLIPPING_LEVEL).count();

    AudioQuality {
        snr_db,
        dynamic_range: (peak - trough) as f64,
        clipping_ratio: clipped as f64 / samples.len() as f64,
    }
}
