//! Framing and short-time power spectra.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::types::SampleRate;

/// Frame geometry for one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Samples per analysis window.
    pub window: usize,
    /// Samples between consecutive window starts.
    pub hop: usize,
    /// Sample rate the layout was derived for.
    pub sample_rate: SampleRate,
}

impl FrameLayout {
    /// Derive a layout from millisecond window and hop lengths.
    pub fn from_ms(sample_rate: SampleRate, window_ms: f64, hop_ms: f64) -> Self {
        Self {
            window: sample_rate.samples_for_ms(window_ms).max(1),
            hop: sample_rate.samples_for_ms(hop_ms).max(1),
            sample_rate,
        }
    }

    /// Number of frames covering `len` samples.
    ///
    /// A buffer shorter than one window yields a single zero-padded frame;
    /// trailing samples that do not fill a full window are dropped otherwise.
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.window {
            1
        } else {
            1 + (len - self.window) / self.hop
        }
    }

    /// Slice of `samples` for frame `index` (may be shorter than a window).
    pub fn frame<'a>(&self, samples: &'a [f32], index: usize) -> &'a [f32] {
        let start = (index * self.hop).min(samples.len());
        let end = (start + self.window).min(samples.len());
        &samples[start..end]
    }

    /// Iterate over all frames in order.
    pub fn frames<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = &'a [f32]> + 'a {
        let layout = *self;
        (0..layout.frame_count(samples.len())).map(move |i| layout.frame(samples, i))
    }

    /// Seconds covered by one hop.
    pub fn hop_secs(&self) -> f64 {
        self.hop as f64 / self.sample_rate.as_f64()
    }
}

/// Symmetric Hann window of `length` samples.
pub fn hann_window(length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length.max(1)];
    }
    let denom = (length - 1) as f64;
    (0..length)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f64 / denom).cos()))
        .collect()
}

/// Reusable short-time power spectrum calculator.
///
/// Each frame is Hann-windowed, zero-padded to the next power of two and
/// transformed; the one-sided power spectrum has `fft_size / 2 + 1` bins.
pub struct PowerSpectrum {
    layout: FrameLayout,
    fft_size: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    power: Vec<f64>,
}

impl PowerSpectrum {
    pub fn new(layout: FrameLayout) -> Self {
        let fft_size = layout.window.next_power_of_two();
        let fft = FftPlanner::<f64>::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            layout,
            fft_size,
            window: hann_window(layout.window),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            power: vec![0.0; fft_size / 2 + 1],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of one-sided spectrum bins.
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Frequency in Hz of bin `index`.
    pub fn bin_hz(&self, index: usize) -> f64 {
        index as f64 * self.layout.sample_rate.as_f64() / self.fft_size as f64
    }

    /// Power spectrum of a single frame.
    pub fn compute(&mut self, frame: &[f32]) -> &[f64] {
        for (i, cell) in self.buffer.iter_mut().enumerate() {
            let sample = match (frame.get(i), self.window.get(i)) {
                (Some(&s), Some(&w)) => s as f64 * w,
                _ => 0.0,
            };
            *cell = Complex::new(sample, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (p, c) in self.power.iter_mut().zip(self.buffer.iter()) {
            *p = c.norm_sqr();
        }
        &self.power
    }

    /// Visit the power spectrum of every frame of `samples` in order.
    pub fn for_each_frame<F>(&mut self, samples: &[f32], mut visit: F)
    where
        F: FnMut(&[f64]),
    {
        let layout = self.layout;
        for frame in layout.frames(samples) {
            visit(self.compute(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_16k() -> FrameLayout {
        FrameLayout::from_ms(SampleRate::HZ_16000, 25.0, 10.0)
    }

    #[test]
    fn test_layout_scales_with_rate() {
        let layout = layout_16k();
        assert_eq!(layout.window, 400);
        assert_eq!(layout.hop, 160);

        let layout = FrameLayout::from_ms(SampleRate::HZ_44100, 25.0, 10.0);
        assert_eq!(layout.window, 1103);
        assert_eq!(layout.hop, 441);
    }

    #[test]
    fn test_frame_count() {
        let layout = layout_16k();
        assert_eq!(layout.frame_count(0), 0);
        assert_eq!(layout.frame_count(100), 1);
        assert_eq!(layout.frame_count(400), 1);
        assert_eq!(layout.frame_count(560), 2);
        assert_eq!(layout.frame_count(16000), 98);
    }

    #[test]
    fn test_frames_cover_expected_ranges() {
        let layout = layout_16k();
        let samples = vec![0.0f32; 1000];
        let frames: Vec<_> = layout.frames(&samples).collect();
        assert_eq!(frames.len(), layout.frame_count(1000));
        assert!(frames.iter().all(|f| f.len() == 400));
    }

    #[test]
    fn test_sine_peak_lands_in_expected_bin() {
        let layout = layout_16k();
        let mut spectrum = PowerSpectrum::new(layout);
        assert_eq!(spectrum.fft_size(), 512);
        let freq = 1000.0f32;
        let frame: Vec<f32> = (0..400)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin())
            .collect();
        let power = spectrum.compute(&frame).to_vec();
        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!((spectrum.bin_hz(peak) - freq as f64).abs() <= spectrum.bin_hz(1));
    }

    #[test]
    fn test_silence_has_zero_power() {
        let mut spectrum = PowerSpectrum::new(layout_16k());
        let power = spectrum.compute(&[0.0; 400]);
        assert!(power.iter().all(|&p| p == 0.0));
    }
}
