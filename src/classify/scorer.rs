//! Confidence and proficiency scoring.
//!
//! Both scores are integers in `[0, 100]`.
//!
//! Confidence grows with the winning score and with its margin over the
//! runner-up. It is then capped by the weakest piece of evidence: too few
//! voiced frames, a clip shorter than [`FULL_EVIDENCE_SECS`], or a poor
//! recording. Each cap only ever lowers confidence.
//!
//! Proficiency ignores the label. It rewards articulation rate, a pause ratio
//! inside the fluent band, pitch variation and a clear signal level.

use serde::{Deserialize, Serialize};

use super::engine::Classification;
use crate::constants::scoring::{
    CLEAR_RMS_LEVEL, CONFIDENCE_BASE_SHARE, EXPRESSIVE_PITCH_STD_HZ, EXTREME_PAUSE_RATIO,
    FLUENT_ARTICULATION_RATE, FLUENT_PAUSE_RATIO, FULL_EVIDENCE_SECS, GOOD_QUALITY_SCORE,
    MARGIN_SATURATION, POOR_QUALITY_CONFIDENCE_CAP, RELIABLE_VOICED_RATIO,
    SHORT_CLIP_CONFIDENCE_CAP, UNVOICED_CONFIDENCE_CAP,
};
use crate::features::FeatureVector;

const ARTICULATION_WEIGHT: f64 = 0.35;
const PAUSE_WEIGHT: f64 = 0.35;
const PITCH_WEIGHT: f64 = 0.2;
const CLARITY_WEIGHT: f64 = 0.1;

/// Calibrated scores for one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub confidence: u8,
    pub proficiency: u8,
}

fn to_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Ceiling on confidence given the voiced-frame ratio.
///
/// Rises linearly from [`UNVOICED_CONFIDENCE_CAP`] at zero voicing to 100 at
/// [`RELIABLE_VOICED_RATIO`].
pub fn voicing_cap(voiced_ratio: f64) -> f64 {
    let reliability = unit(voiced_ratio / RELIABLE_VOICED_RATIO);
    UNVOICED_CONFIDENCE_CAP + (100.0 - UNVOICED_CONFIDENCE_CAP) * reliability
}

/// Ceiling on confidence given the clip length.
///
/// Rises linearly from [`SHORT_CLIP_CONFIDENCE_CAP`] at zero seconds to 100 at
/// [`FULL_EVIDENCE_SECS`].
pub fn duration_cap(duration_secs: f64) -> f64 {
    let coverage = unit(duration_secs / FULL_EVIDENCE_SECS);
    SHORT_CLIP_CONFIDENCE_CAP + (100.0 - SHORT_CLIP_CONFIDENCE_CAP) * coverage
}

/// Ceiling on confidence given the recording quality score (0-100).
pub fn quality_cap(quality_score: f64) -> f64 {
    let clarity = unit(quality_score / GOOD_QUALITY_SCORE);
    POOR_QUALITY_CONFIDENCE_CAP + (100.0 - POOR_QUALITY_CONFIDENCE_CAP) * clarity
}

/// The lowest of the voicing, duration and quality ceilings.
pub fn evidence_cap(features: &FeatureVector) -> f64 {
    voicing_cap(features.pitch.voiced_ratio)
        .min(duration_cap(features.duration_secs))
        .min(quality_cap(features.quality.score()))
}

/// Confidence from the winning score and the runner-up score, limited to
/// `cap`.
pub fn confidence_from_scores(winning: f64, runner_up: f64, cap: f64) -> u8 {
    let winning = unit(winning);
    let margin = unit(winning - unit(runner_up));
    let margin_share = unit(margin / MARGIN_SATURATION);
    let raw = 100.0 * winning * (CONFIDENCE_BASE_SHARE + (1.0 - CONFIDENCE_BASE_SHARE) * margin_share);
    to_percent(raw.min(cap))
}

/// Confidence in the selected label.
pub fn confidence(classification: &Classification, features: &FeatureVector) -> u8 {
    confidence_from_scores(
        classification.winning_score(),
        classification.runner_up_score(),
        evidence_cap(features),
    )
}

/// Credit for pause ratio: full up to the fluent bound, none at the extreme.
fn pause_credit(pause_ratio: f64) -> f64 {
    if pause_ratio <= FLUENT_PAUSE_RATIO {
        1.0
    } else {
        unit(1.0 - (pause_ratio - FLUENT_PAUSE_RATIO) / (EXTREME_PAUSE_RATIO - FLUENT_PAUSE_RATIO))
    }
}

/// Speaking proficiency estimated from fluency features.
pub fn proficiency(features: &FeatureVector) -> u8 {
    let articulation = unit(features.rhythm.articulation_rate / FLUENT_ARTICULATION_RATE);
    let pauses = pause_credit(features.rhythm.pause_ratio);
    let intonation = unit(features.pitch.std_hz / EXPRESSIVE_PITCH_STD_HZ);
    let clarity = unit(features.energy.rms_mean / CLEAR_RMS_LEVEL);

    to_percent(
        100.0
            * (ARTICULATION_WEIGHT * articulation
                + PAUSE_WEIGHT * pauses
                + PITCH_WEIGHT * intonation
                + CLARITY_WEIGHT * clarity),
    )
}

/// Confidence and proficiency together.
pub fn assess(classification: &Classification, features: &FeatureVector) -> Assessment {
    Assessment {
        confidence: confidence(classification, features),
        proficiency: proficiency(features),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ProfileTable};
    use crate::features::FeatureId;
    use crate::types::AccentClass;

    /// A long, clean, well-voiced recording.
    fn reliable() -> FeatureVector {
        FeatureVector::default()
            .with(FeatureId::VoicedRatio, 0.7)
            .with(FeatureId::Duration, 45.0)
            .with(FeatureId::SnrDb, 40.0)
            .with(FeatureId::DynamicRange, 0.6)
    }

    fn fluent() -> FeatureVector {
        FeatureVector::default()
            .with(FeatureId::ArticulationRate, 4.0)
            .with(FeatureId::PauseRatio, 0.2)
            .with(FeatureId::PitchStd, 30.0)
            .with(FeatureId::RmsMean, 0.05)
            .with(FeatureId::VoicedRatio, 0.6)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = ARTICULATION_WEIGHT + PAUSE_WEIGHT + PITCH_WEIGHT + CLARITY_WEIGHT;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence_from_scores(1.0, 0.0, 100.0), 100);
        assert_eq!(confidence_from_scores(0.0, 0.0, 100.0), 0);
        assert_eq!(confidence_from_scores(1.0, 1.0, 100.0), 60);
        for &(w, r, c) in &[(2.0, -1.0, 500.0), (f64::NAN, 0.1, 50.0), (0.5, 0.9, -1.0)] {
            assert!(confidence_from_scores(w, r, c) <= 100);
        }
    }

    #[test]
    fn test_american_center_is_confident() {
        let table = ProfileTable::builtin();
        let features = table
            .get(AccentClass::American)
            .unwrap()
            .center_vector(reliable());
        let classification = classify(&features, &table).unwrap();
        assert_eq!(classification.label, AccentClass::American);
        let assessment = assess(&classification, &features);
        assert!(assessment.confidence >= 80, "got {}", assessment.confidence);
    }

    #[test]
    fn test_confidence_monotonic_in_margin() {
        let mut previous = 0;
        for step in 0..=100 {
            let runner_up = 0.9 - step as f64 * 0.009;
            let current = confidence_from_scores(0.9, runner_up, voicing_cap(0.8));
            assert!(current >= previous, "margin step {} dropped confidence", step);
            previous = current;
        }
    }

    #[test]
    fn test_confidence_monotonic_in_evidence() {
        let sweep = |id: FeatureId, values: Vec<f64>| -> Vec<u8> {
            values
                .into_iter()
                .map(|v| confidence_from_scores(0.95, 0.5, evidence_cap(&reliable().with(id, v))))
                .collect()
        };
        let rising = |scores: Vec<u8>| scores.windows(2).all(|w| w[1] >= w[0]);
        let falling = |scores: Vec<u8>| scores.windows(2).all(|w| w[1] <= w[0]);

        assert!(rising(sweep(FeatureId::VoicedRatio, (0..=50).map(|i| i as f64 / 50.0).collect())));
        assert!(rising(sweep(FeatureId::Duration, (0..=60).map(|i| i as f64).collect())));
        assert!(rising(sweep(FeatureId::SnrDb, (0..=60).map(|i| i as f64).collect())));
        assert!(rising(sweep(FeatureId::DynamicRange, (0..=20).map(|i| i as f64 / 20.0).collect())));
        assert!(falling(sweep(FeatureId::ClippingRatio, (0..=20).map(|i| i as f64 / 20.0).collect())));
    }

    #[test]
    fn test_unvoiced_confidence_is_capped() {
        assert!(confidence_from_scores(1.0, 0.0, voicing_cap(0.0)) <= 20);
        assert_eq!(voicing_cap(0.0), 20.0);
        assert_eq!(voicing_cap(0.3), 100.0);
        assert_eq!(voicing_cap(0.9), 100.0);

        let silent = reliable().with(FeatureId::VoicedRatio, 0.0);
        assert_eq!(evidence_cap(&silent), 20.0);
    }

    #[test]
    fn test_short_clip_confidence_is_capped() {
        assert_eq!(duration_cap(0.0), SHORT_CLIP_CONFIDENCE_CAP);
        assert_eq!(duration_cap(15.0), 60.0);
        assert_eq!(duration_cap(FULL_EVIDENCE_SECS), 100.0);
        assert_eq!(duration_cap(600.0), 100.0);

        let short = reliable().with(FeatureId::Duration, 3.0);
        assert!(confidence_from_scores(1.0, 0.0, evidence_cap(&short)) <= 30);
    }

    #[test]
    fn test_poor_recording_confidence_is_capped() {
        assert_eq!(quality_cap(0.0), POOR_QUALITY_CONFIDENCE_CAP);
        assert_eq!(quality_cap(GOOD_QUALITY_SCORE), 100.0);
        assert_eq!(quality_cap(100.0), 100.0);

        let noisy = reliable()
            .with(FeatureId::SnrDb, 0.0)
            .with(FeatureId::DynamicRange, 0.0)
            .with(FeatureId::ClippingRatio, 1.0);
        assert_eq!(evidence_cap(&noisy), POOR_QUALITY_CONFIDENCE_CAP);
        assert_eq!(evidence_cap(&reliable()), 100.0);
    }

    #[test]
    fn test_proficiency_bounds() {
        assert_eq!(proficiency(&fluent()), 100);
        let degenerate = FeatureVector::default().with(FeatureId::PauseRatio, 1.0);
        assert_eq!(proficiency(&degenerate), 0);
        let extreme = FeatureVector::default()
            .with(FeatureId::ArticulationRate, 1e9)
            .with(FeatureId::PitchStd, 1e9)
            .with(FeatureId::RmsMean, 1e9)
            .with(FeatureId::PauseRatio, -3.0);
        assert_eq!(proficiency(&extreme), 100);
    }

    #[test]
    fn test_proficiency_monotonic_per_feature() {
        let sweep = |id: FeatureId, values: &[f64]| -> Vec<u8> {
            values
                .iter()
                .map(|&v| proficiency(&FeatureVector::default().with(id, v)))
                .collect()
        };
        let rising = |scores: &[u8]| scores.windows(2).all(|w| w[1] >= w[0]);
        let falling = |scores: &[u8]| scores.windows(2).all(|w| w[1] <= w[0]);

        let grid: Vec<f64> = (0..=40).map(|i| i as f64 * 0.25).collect();
        assert!(rising(&sweep(FeatureId::ArticulationRate, &grid)));
        assert!(rising(&sweep(FeatureId::RmsMean, &grid.iter().map(|v| v / 100.0).collect::<Vec<_>>())));
        assert!(rising(&sweep(FeatureId::PitchStd, &grid.iter().map(|v| v * 5.0).collect::<Vec<_>>())));

        let ratios: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
        let pauses = sweep(FeatureId::PauseRatio, &ratios);
        assert!(falling(&pauses));
        assert!(pauses[0] > pauses[20]);
    }

    #[test]
    fn test_pause_credit_band() {
        assert_eq!(pause_credit(0.0), 1.0);
        assert_eq!(pause_credit(FLUENT_PAUSE_RATIO), 1.0);
        assert!((pause_credit(0.6) - 0.5).abs() < 1e-9);
        assert_eq!(pause_credit(EXTREME_PAUSE_RATIO), 0.0);
        assert_eq!(pause_credit(1.0), 0.0);
    }
}
