//! Speaking rhythm and frame energy.
//!
//! Frames are marked active when their RMS clears an energy gate relative to
//! the clip's mean level. Runs of at least [`MIN_SEGMENT_FRAMES`] active frames
//! are speech segments; everything else is pause.
//!
//! Tempo comes from the same frame levels: rises in level form an onset
//! envelope whose autocorrelation peak, searched between
//! [`TEMPO_MIN_BPM`] and [`TEMPO_MAX_BPM`], gives the beat period.

use serde::{Deserialize, Serialize};

use super::pitch::frame_rms;
use super::stats::{strongest_peak, RunningStats};
use super::stft::FrameLayout;
use crate::constants::analysis::{
    MIN_SEGMENT_FRAMES, TEMPO_MAX_BPM, TEMPO_MIN_BPM, TEMPO_PERIODICITY_THRESHOLD,
    VOICING_RELATIVE_ENERGY, VOICING_RMS_FLOOR,
};

/// Tempo and pause structure of a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmSummary {
    /// Speech segments per second of clip.
    pub speaking_rate: f64,
    /// Fraction of frames outside speech segments.
    pub pause_ratio: f64,
    /// Speech segments per second of speech.
    pub articulation_rate: f64,
    /// Onset tempo in beats per minute, zero when no beat is found.
    pub tempo_bpm: f64,
    pub segments: usize,
}

/// Frame energy statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    pub rms_mean: f64,
    pub rms_variance: f64,
    pub zcr_mean: f64,
}

/// Fraction of adjacent sample pairs whose sign differs.
pub fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / (frame.len() - 1) as f64
}

/// Run lengths of consecutive `true` values.
fn active_runs(active: &[bool]) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0usize;
    for &is_active in active {
        if is_active {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current);
    }
    runs
}

/// Half-wave rectified level differences; frame 0 has no onset.
fn onset_envelope(levels: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(levels.windows(2).map(|pair| (pair[1] - pair[0]).max(0.0)))
        .take(levels.len())
        .collect()
}

/// Beat tempo of a frame-level sequence sampled every `hop_secs`.
fn estimate_tempo(levels: &[f64], hop_secs: f64) -> f64 {
    if hop_secs <= 0.0 {
        return 0.0;
    }
    let onsets = onset_envelope(levels);
    if onsets.iter().all(|&o| o < VOICING_RMS_FLOOR) {
        return 0.0;
    }

    let mean = onsets.iter().sum::<f64>() / onsets.len() as f64;
    let centered: Vec<f64> = onsets.iter().map(|o| o - mean).collect();
    let zero_lag: f64 = centered.iter().map(|o| o * o).sum();
    if zero_lag <= f64::EPSILON {
        return 0.0;
    }

    let min_lag = ((60.0 / (TEMPO_MAX_BPM * hop_secs)).floor() as usize).max(1);
    let max_lag = (60.0 / (TEMPO_MIN_BPM * hop_secs)).ceil() as usize;
    let acf: Vec<f64> = (0..=max_lag + 1)
        .map(|lag| {
            centered
                .iter()
                .zip(centered.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / zero_lag
        })
        .collect();

    match strongest_peak(&acf, min_lag, max_lag) {
        Some((lag, height)) if height >= TEMPO_PERIODICITY_THRESHOLD && lag > 0.0 => {
            60.0 / (lag * hop_secs)
        }
        _ => 0.0,
    }
}

/// Compute rhythm and energy statistics for a whole clip.
pub fn analyze(samples: &[f32], layout: FrameLayout) -> (RhythmSummary, EnergySummary) {
    let mut rms_stats = RunningStats::new();
    let mut zcr_stats = RunningStats::new();
    let mut levels = Vec::with_capacity(layout.frame_count(samples.len()));
    for frame in layout.frames(samples) {
        let rms = frame_rms(frame);
        rms_stats.push(rms);
        zcr_stats.push(zero_crossing_rate(frame));
        levels.push(rms);
    }

    let energy = EnergySummary {
        rms_mean: rms_stats.mean(),
        rms_variance: rms_stats.variance(),
        zcr_mean: zcr_stats.mean(),
    };

    let total_frames = levels.len();
    if total_frames == 0 {
        return (RhythmSummary::default(), energy);
    }

    let gate = VOICING_RMS_FLOOR.max(VOICING_RELATIVE_ENERGY * rms_stats.mean());
    let active: Vec<bool> = levels.iter().map(|&rms| rms >= gate).collect();
    let segments: Vec<usize> = active_runs(&active)
        .into_iter()
        .filter(|&len| len >= MIN_SEGMENT_FRAMES)
        .collect();

    let speech_frames: usize = segments.iter().sum();
    let total_secs = samples.len() as f64 / layout.sample_rate.as_f64();
    let speech_secs = speech_frames as f64 * layout.hop_secs();

    let rhythm = RhythmSummary {
        speaking_rate: if total_secs > 0.0 {
            segments.len() as f64 / total_secs
        } else {
            0.0
        },
        pause_ratio: (total_frames - speech_frames) as f64 / total_frames as f64,
        articulation_rate: if speech_secs > 0.0 {
            segments.len() as f64 / speech_secs
        } else {
            0.0
        },
        tempo_bpm: estimate_tempo(&levels, layout.hop_secs()),
        segments: segments.len(),
    };

    (rhythm, energy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::analysis::{HOP_MS, WINDOW_MS};
    use crate::types::SampleRate;
    use std::f32::consts::PI;

    fn layout() -> FrameLayout {
        FrameLayout::from_ms(SampleRate::HZ_16000, WINDOW_MS, HOP_MS)
    }

    /// Alternating bursts of tone and silence, `bursts` of each.
    fn bursts(bursts: usize, on_secs: f32, off_secs: f32) -> Vec<f32> {
        let mut out = Vec::new();
        for _ in 0..bursts {
            let on = (on_secs * 16000.0) as usize;
            out.extend((0..on).map(|i| 0.5 * (2.0 * PI * 200.0 * i as f32 / 16000.0).sin()));
            out.extend(std::iter::repeat(0.0).take((off_secs * 16000.0) as usize));
        }
        out
    }

    #[test]
    fn test_runs() {
        assert_eq!(active_runs(&[true, true, false, true, false, false, true]), vec![2, 1, 1]);
        assert!(active_runs(&[false, false]).is_empty());
    }

    #[test]
    fn test_zero_crossing_rate() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0, 1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[0.5; 10]), 0.0);
    }

    #[test]
    fn test_bursts_are_counted_as_segments() {
        let samples = bursts(5, 0.3, 0.3);
        let (rhythm, energy) = analyze(&samples, layout());
        assert_eq!(rhythm.segments, 5);
        assert!((rhythm.speaking_rate - 5.0 / 3.0).abs() < 1e-9);
        assert!(rhythm.pause_ratio > 0.35 && rhythm.pause_ratio < 0.6);
        assert!(rhythm.articulation_rate > rhythm.speaking_rate);
        assert!(energy.rms_mean > 0.0);
        assert!(energy.rms_variance > 0.0);
    }

    #[test]
    fn test_silence_is_all_pause() {
        let (rhythm, energy) = analyze(&vec![0.0; 16000 * 5], layout());
        assert_eq!(rhythm.segments, 0);
        assert_eq!(rhythm.pause_ratio, 1.0);
        assert_eq!(rhythm.speaking_rate, 0.0);
        assert_eq!(rhythm.articulation_rate, 0.0);
        assert_eq!(rhythm.tempo_bpm, 0.0);
        assert_eq!(energy.rms_mean, 0.0);
    }

    #[test]
    fn test_onset_envelope_keeps_rises_only() {
        assert_eq!(onset_envelope(&[0.0, 0.25, 0.75, 0.5, 1.0]), vec![0.0, 0.25, 0.5, 0.0, 0.5]);
        assert!(onset_envelope(&[]).is_empty());
    }

    #[test]
    fn test_regular_bursts_give_tempo() {
        // One burst every half second.
        let (rhythm, _) = analyze(&bursts(8, 0.25, 0.25), layout());
        assert!((rhythm.tempo_bpm - 120.0).abs() < 3.0, "got {}", rhythm.tempo_bpm);

        // One burst every 0.4 seconds.
        let (rhythm, _) = analyze(&bursts(10, 0.2, 0.2), layout());
        assert!((rhythm.tempo_bpm - 150.0).abs() < 4.0, "got {}", rhythm.tempo_bpm);
    }

    #[test]
    fn test_steady_tone_has_no_tempo() {
        let tone: Vec<f32> = (0..16000 * 3)
            .map(|i| 0.5 * (2.0 * PI * 200.0 * i as f32 / 16000.0).sin())
            .collect();
        let (rhythm, _) = analyze(&tone, layout());
        assert_eq!(rhythm.tempo_bpm, 0.0);
    }

    #[test]
    fn test_longer_pauses_raise_pause_ratio() {
        let (tight, _) = analyze(&bursts(4, 0.4, 0.1), layout());
        let (loose, _) = analyze(&bursts(4, 0.4, 0.6), layout());
        assert!(loose.pause_ratio > tight.pause_ratio);
    }
}
