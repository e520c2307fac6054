//! Feature extraction engine.
//!
//! Turns an [`AudioClip`] into a [`FeatureVector`]. The feature groups
//! (cepstral, spectral, pitch, rhythm/energy, recording quality) read the same
//! immutable sample buffer and are computed on scoped threads, then merged in
//! a fixed order.

pub mod cepstral;
pub mod pitch;
pub mod quality;
pub mod rhythm;
pub mod spectral;
pub mod stats;
pub mod stft;
pub mod vector;

pub use vector::{FeatureId, FeatureVector};

use tracing::{debug, warn};

use crate::constants::analysis::{HOP_MS, PITCH_WINDOW_MS, WINDOW_MS};
use crate::error::{AnalysisError, Result};
use crate::types::AudioClip;
use stft::FrameLayout;

/// Extract the feature vector of a clip.
///
/// Deterministic: the same samples always produce bit-identical statistics.
/// A silent or unvoiced clip yields zero pitch statistics rather than an
/// error.
///
/// # Errors
/// `FeatureExtraction` when the clip is empty, contains non-finite samples,
/// or aggregation produces a non-finite value.
pub fn extract(clip: &AudioClip) -> Result<FeatureVector> {
    let samples = clip.samples();
    if samples.is_empty() {
        return Err(AnalysisError::FeatureExtraction(
            "clip has no samples".to_string(),
        ));
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(AnalysisError::FeatureExtraction(format!(
            "non-finite sample at index {}",
            index
        )));
    }

    let rate = clip.sample_rate();
    let frame_layout = FrameLayout::from_ms(rate, WINDOW_MS, HOP_MS);
    let pitch_layout = FrameLayout::from_ms(rate, PITCH_WINDOW_MS, HOP_MS);

    let (cepstral, spectral, pitch, (rhythm, energy), quality) = crossbeam::scope(|scope| {
        let cepstral = scope.spawn(|_| cepstral::analyze(samples, frame_layout));
        let spectral = scope.spawn(|_| spectral::analyze(samples, frame_layout));
        let pitch = scope.spawn(|_| pitch::analyze(samples, pitch_layout));
        let rhythm = rhythm::analyze(samples, frame_layout);
        let quality = quality::analyze(samples, frame_layout);
        (cepstral.join(), spectral.join(), pitch.join(), rhythm, quality)
    })
    .map_err(|_| AnalysisError::FeatureExtraction("feature worker panicked".to_string()))
    .and_then(|(c, s, p, r, q)| match (c, s, p) {
        (Ok(c), Ok(s), Ok(p)) => Ok((c, s, p, r, q)),
        _ => Err(AnalysisError::FeatureExtraction(
            "feature worker panicked".to_string(),
        )),
    })?;

    let features = FeatureVector {
        cepstral,
        spectral,
        pitch,
        rhythm,
        energy,
        quality,
        duration_secs: clip.duration_secs(),
    };

    if let Some(id) = features.first_non_finite() {
        return Err(AnalysisError::FeatureExtraction(format!(
            "feature '{}' is not finite",
            id
        )));
    }

    if features.pitch.voiced_frames == 0 {
        warn!(
            "No voiced frames in {:.2}s clip; pitch statistics default to zero",
            features.duration_secs
        );
    }
    debug!(
        "Extracted features: {} frames, voiced_ratio={:.3}, pitch_mean={:.1}Hz, speaking_rate={:.2}/s, tempo={:.0}bpm, snr={:.1}dB",
        features.cepstral.frames,
        features.pitch.voiced_ratio,
        features.pitch.mean_hz,
        features.rhythm.speaking_rate,
        features.rhythm.tempo_bpm,
        features.quality.snr_db
    );

    Ok(features)
}
