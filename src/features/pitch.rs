//! Fundamental frequency contour via autocorrelation.
//!
//! Each frame is gated on energy first; frames that pass are searched for the
//! strongest autocorrelation peak inside the human voice band. The peak must
//! be a true local maximum, so energy below the band (hum, rumble) whose
//! autocorrelation is still falling at the band edge stays unvoiced. Only
//! frames that are both loud enough and periodic enough count as voiced. Every frame,
//! voiced or not, counts toward the voiced ratio denominator.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::stats::{strongest_peak, RunningStats};
use super::stft::FrameLayout;
use crate::constants::analysis::{
    PERIODICITY_THRESHOLD, PITCH_MAX_HZ, PITCH_MIN_HZ, VOICING_RELATIVE_ENERGY, VOICING_RMS_FLOOR,
};

/// Pitch contour statistics. All zero for a clip with no voiced frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchSummary {
    pub mean_hz: f64,
    pub variance: f64,
    pub std_hz: f64,
    pub range_hz: f64,
    pub voiced_ratio: f64,
    pub voiced_frames: usize,
    pub total_frames: usize,
}

/// Root mean square of a frame.
pub fn frame_rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / frame.len() as f64).sqrt()
}

/// FFT-based autocorrelation over one frame.
struct Autocorrelator {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl Autocorrelator {
    fn new(window: usize) -> Self {
        // Twice the window avoids circular wrap-around.
        let size = (2 * window).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Autocorrelation normalised so lag 0 equals 1. `None` for a silent frame.
    fn normalized(&mut self, frame: &[f32], max_lag: usize) -> Option<Vec<f64>> {
        let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len().max(1) as f64;
        for (i, cell) in self.buffer.iter_mut().enumerate() {
            let value = frame.get(i).map_or(0.0, |&s| s as f64 - mean);
            *cell = Complex::new(value, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        for cell in self.buffer.iter_mut() {
            *cell = Complex::new(cell.norm_sqr(), 0.0);
        }
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let zero_lag = self.buffer[0].re;
        if zero_lag <= f64::EPSILON {
            return None;
        }
        let last = max_lag.min(self.buffer.len() - 1);
        Some(self.buffer[..=last].iter().map(|c| c.re / zero_lag).collect())
    }
}

/// Estimate the pitch contour of a clip and summarise it.
///
/// `layout` should use a window long enough to hold two periods of
/// [`PITCH_MIN_HZ`].
pub fn analyze(samples: &[f32], layout: FrameLayout) -> PitchSummary {
    let rate = layout.sample_rate.as_f64();
    let min_lag = (rate / PITCH_MAX_HZ).floor() as usize;
    let max_lag = (rate / PITCH_MIN_HZ).ceil() as usize;

    let energies: Vec<f64> = layout.frames(samples).map(frame_rms).collect();
    let total_frames = energies.len();
    if total_frames == 0 {
        return PitchSummary::default();
    }
    let mean_energy = energies.iter().sum::<f64>() / total_frames as f64;
    let gate = VOICING_RMS_FLOOR.max(VOICING_RELATIVE_ENERGY * mean_energy);

    let mut correlator = Autocorrelator::new(layout.window);
    let mut f0 = RunningStats::new();
    for (frame, &rms) in layout.frames(samples).zip(energies.iter()) {
        if rms < gate {
            continue;
        }
        // One lag past the band so a peak at `max_lag` can be confirmed.
        let Some(acf) = correlator.normalized(frame, max_lag + 1) else {
            continue;
        };
        if let Some((lag, height)) = strongest_peak(&acf, min_lag, max_lag) {
            if height >= PERIODICITY_THRESHOLD && lag > 0.0 {
                f0.push(rate / lag);
            }
        }
    }

    if f0.is_empty() {
        return PitchSummary {
            total_frames,
            ..PitchSummary::default()
        };
    }

    let voiced_frames = f0.count() as usize;
    PitchSummary {
        mean_hz: f0.mean(),
        variance: f0.variance(),
        std_hz: f0.std_dev(),
        range_hz: f0.range(),
        voiced_ratio: voiced_frames as f64 / total_frames as f64,
        voiced_frames,
        total_frames,
    }
}
