//! Mel-frequency cepstral coefficients.

use serde::{Deserialize, Serialize};

use super::stats::RunningStats;
use super::stft::{FrameLayout, PowerSpectrum};
use crate::constants::analysis::{
    CEPSTRAL_COEFFICIENTS, LOG_FLOOR, MEL_BANDS, MEL_HIGH_HZ, MEL_LOW_HZ,
};

/// Per-coefficient mean and variance across all frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CepstralSummary {
    pub mean: [f64; CEPSTRAL_COEFFICIENTS],
    pub variance: [f64; CEPSTRAL_COEFFICIENTS],
    /// Frames contributing to the statistics.
    pub frames: usize,
}

impl Default for CepstralSummary {
    fn default() -> Self {
        Self {
            mean: [0.0; CEPSTRAL_COEFFICIENTS],
            variance: [0.0; CEPSTRAL_COEFFICIENTS],
            frames: 0,
        }
    }
}

/// Triangular mel filter bank followed by a DCT-II.
pub struct MelBank {
    filters: Vec<Vec<(usize, f64)>>,
    coefficients: usize,
}

impl MelBank {
    pub fn new(
        sample_rate: f64,
        fft_size: usize,
        bands: usize,
        coefficients: usize,
        low_hz: f64,
        high_hz: f64,
    ) -> Self {
        let nyquist = sample_rate * 0.5;
        let high_hz = high_hz.min(nyquist).max(low_hz);
        let mel_low = hz_to_mel(low_hz);
        let mel_high = hz_to_mel(high_hz);

        let bins: Vec<usize> = (0..bands + 2)
            .map(|i| {
                let t = i as f64 / (bands + 1) as f64;
                let hz = mel_to_hz(mel_low + (mel_high - mel_low) * t);
                ((hz * fft_size as f64 / sample_rate).floor() as usize).min(fft_size / 2)
            })
            .collect();

        let filters = (0..bands)
            .map(|m| {
                let left = bins[m];
                let center = bins[m + 1];
                let right = bins[m + 2].max(center + 1);
                triangle(left, center, right)
            })
            .collect();

        Self {
            filters,
            coefficients,
        }
    }

    /// Cepstral coefficients of one power spectrum.
    pub fn cepstrum(&self, power: &[f64]) -> Vec<f64> {
        let log_energies: Vec<f64> = self
            .filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .map(|&(bin, w)| power.get(bin).copied().unwrap_or(0.0) * w)
                    .sum();
                energy.max(LOG_FLOOR).ln()
            })
            .collect();
        dct_ii(&log_energies, self.coefficients)
    }
}

fn triangle(left: usize, center: usize, right: usize) -> Vec<(usize, f64)> {
    (left..=right)
        .filter_map(|bin| {
            let w = if bin < center {
                if center == left {
                    0.0
                } else {
                    (bin - left) as f64 / (center - left) as f64
                }
            } else if right == center {
                0.0
            } else {
                (right - bin) as f64 / (right - center) as f64
            };
            (w > 0.0).then_some((bin, w))
        })
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Orthonormal DCT-II, first `count` coefficients.
fn dct_ii(values: &[f64], count: usize) -> Vec<f64> {
    let n = values.len().max(1) as f64;
    (0..count)
        .map(|k| {
            let sum: f64 = values
                .iter()
                .enumerate()
                .map(|(m, &v)| v * (std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// Compute cepstral statistics for a whole clip.
pub fn analyze(samples: &[f32], layout: FrameLayout) -> CepstralSummary {
    let mut spectrum = PowerSpectrum::new(layout);
    let bank = MelBank::new(
        layout.sample_rate.as_f64(),
        spectrum.fft_size(),
        MEL_BANDS,
        CEPSTRAL_COEFFICIENTS,
        MEL_LOW_HZ,
        MEL_HIGH_HZ,
    );

    let mut stats = [RunningStats::new(); CEPSTRAL_COEFFICIENTS];
    spectrum.for_each_frame(samples, |power| {
        for (acc, c) in stats.iter_mut().zip(bank.cepstrum(power)) {
            acc.push(c);
        }
    });

    let mut summary = CepstralSummary {
        frames: stats[0].count() as usize,
        ..CepstralSummary::default()
    };
    for (i, acc) in stats.iter().enumerate() {
        summary.mean[i] = acc.mean();
        summary.variance[i] = acc.variance();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleRate;

    #[test]
    fn test_mel_scale_roundtrip_point() {
        assert!((hz_to_mel(1000.0) - 1000.0).abs() < 1.0);
        assert!((mel_to_hz(hz_to_mel(440.0)) - 440.0).abs() < 1e-9);
    }

    #[test]
    fn test_bank_shape() {
        let bank = MelBank::new(16000.0, 512, MEL_BANDS, CEPSTRAL_COEFFICIENTS, 20.0, 8000.0);
        assert_eq!(bank.filters.len(), MEL_BANDS);
        assert!(bank.filters.iter().all(|f| !f.is_empty()));
        assert_eq!(bank.cepstrum(&vec![1.0; 257]).len(), CEPSTRAL_COEFFICIENTS);
    }

    #[test]
    fn test_flat_spectrum_concentrates_in_c0() {
        let bank = MelBank::new(16000.0, 512, MEL_BANDS, CEPSTRAL_COEFFICIENTS, 20.0, 8000.0);
        let silent = bank.cepstrum(&vec![0.0; 257]);
        // All bands hit the log floor, so the cepstrum is a pure DC term.
        assert!(silent[0] < 0.0);
        assert!(silent[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_analyze_is_fixed_size_and_deterministic() {
        let layout = FrameLayout::from_ms(SampleRate::HZ_16000, 25.0, 10.0);
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16000.0).sin() * 0.3)
            .collect();
        let a = analyze(&samples, layout);
        let b = analyze(&samples, layout);
        assert_eq!(a, b);
        assert_eq!(a.frames, layout.frame_count(samples.len()));
        assert!(a.mean.iter().chain(a.variance.iter()).all(|v| v.is_finite()));
    }
}
