//! Spectral shape statistics: centroid, rolloff and bandwidth, plus a
//! twelve-class chroma profile folded from the same power spectra.

use serde::{Deserialize, Serialize};

use super::stats::{MeanVar, RunningStats};
use super::stft::{FrameLayout, PowerSpectrum};
use crate::constants::analysis::{CHROMA_LOW_HZ, ROLLOFF_FRACTION};

/// Pitch classes per octave.
pub const CHROMA_CLASSES: usize = 12;

/// Spectral shape of a single frame, in Hz.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralFrame {
    pub centroid_hz: f64,
    pub rolloff_hz: f64,
    pub bandwidth_hz: f64,
}

/// Spectral shape aggregated over a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralSummary {
    pub centroid: MeanVar,
    pub rolloff: MeanVar,
    pub bandwidth: MeanVar,
    /// Mean of the per-frame, peak-normalised chroma energies.
    pub chroma_mean: f64,
    /// Standard deviation of the same values.
    pub chroma_std: f64,
}

/// Pitch class of `freq_hz` with C = 0, or `None` below [`CHROMA_LOW_HZ`].
pub fn pitch_class(freq_hz: f64) -> Option<usize> {
    if !(freq_hz >= CHROMA_LOW_HZ) {
        return None;
    }
    let semitones_from_a = (12.0 * (freq_hz / 440.0).log2()).round() as i64;
    Some((semitones_from_a + 9).rem_euclid(CHROMA_CLASSES as i64) as usize)
}

/// Fold one power spectrum into pitch classes, scaled so the loudest class
/// is 1. A frame with no energy in range reports zeros.
fn frame_chroma(power: &[f64], classes: &[Option<usize>]) -> [f64; CHROMA_CLASSES] {
    let mut chroma = [0.0; CHROMA_CLASSES];
    for (&p, class) in power.iter().zip(classes) {
        if let Some(class) = *class {
            chroma[class] += p;
        }
    }
    let peak = chroma.iter().copied().fold(0.0, f64::max);
    if peak > 0.0 {
        chroma.iter_mut().for_each(|c| *c /= peak);
    }
    chroma
}

/// Shape of one power spectrum. A frame with no energy reports zeros.
pub fn frame_shape(power: &[f64], bin_hz: f64) -> SpectralFrame {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return SpectralFrame::default();
    }

    let centroid_hz = power
        .iter()
        .enumerate()
        .map(|(bin, &p)| p * bin as f64 * bin_hz)
        .sum::<f64>()
        / total;

    let spread = power
        .iter()
        .enumerate()
        .map(|(bin, &p)| {
            let d = bin as f64 * bin_hz - centroid_hz;
            p * d * d
        })
        .sum::<f64>()
        / total;

    let threshold = total * ROLLOFF_FRACTION;
    let mut cumulative = 0.0;
    let mut rolloff_bin = power.len().saturating_sub(1);
    for (bin, &p) in power.iter().enumerate() {
        cumulative += p;
        if cumulative >= threshold {
            rolloff_bin = bin;
            break;
        }
    }

    SpectralFrame {
        centroid_hz,
        rolloff_hz: rolloff_bin as f64 * bin_hz,
        bandwidth_hz: spread.max(0.0).sqrt(),
    }
}

/// Compute spectral shape statistics for a whole clip.
pub fn analyze(samples: &[f32], layout: FrameLayout) -> SpectralSummary {
    let mut spectrum = PowerSpectrum::new(layout);
    let bin_hz = spectrum.bin_hz(1);

    let classes: Vec<Option<usize>> = (0..spectrum.bins())
        .map(|bin| pitch_class(spectrum.bin_hz(bin)))
        .collect();

    let mut centroid = RunningStats::new();
    let mut rolloff = RunningStats::new();
    let mut bandwidth = RunningStats::new();
    let mut chroma = RunningStats::new();
    spectrum.for_each_frame(samples, |power| {
        let shape = frame_shape(power, bin_hz);
        centroid.push(shape.centroid_hz);
        rolloff.push(shape.rolloff_hz);
        bandwidth.push(shape.bandwidth_hz);
        chroma.extend(frame_chroma(power, &classes));
    });

    SpectralSummary {
        centroid: centroid.summary(),
        rolloff: rolloff.summary(),
        bandwidth: bandwidth.summary(),
        chroma_mean: chroma.mean(),
        chroma_std: chroma.std_dev(),
    }
}
