//! Human-readable summary of a classification.

use crate::features::FeatureVector;
use crate::types::AccentClass;

const SHORT_CLIP_SECS: f64 = 10.0;
const LONG_CLIP_SECS: f64 = 60.0;
const FAST_SPEAKING_RATE: f64 = 6.0;
const SLOW_SPEAKING_RATE: f64 = 3.0;
const LOUD_RMS: f64 = 0.05;
const QUIET_RMS: f64 = 0.01;

fn confidence_sentence(label: AccentClass, confidence: u8) -> String {
    match confidence {
        80..=u8::MAX => format!("Strong indicators of {} English accent detected.", label),
        60..=79 => format!("Moderate indicators of {} English accent detected.", label),
        40..=59 => format!("Some characteristics of {} English accent present.", label),
        _ => format!(
            "Accent classification uncertain. Possible {} influence.",
            label
        ),
    }
}

/// Compose the summary text. Deterministic in its inputs.
pub fn summarize(label: AccentClass, confidence: u8, features: &FeatureVector) -> String {
    let mut parts = vec![confidence_sentence(label, confidence)];

    let duration = features.duration_secs;
    if duration < SHORT_CLIP_SECS {
        parts.push("Short audio sample may limit accuracy.".to_string());
    } else if duration > LONG_CLIP_SECS {
        parts.push("Long audio sample provides good analysis depth.".to_string());
    }

    let rate = features.rhythm.speaking_rate;
    parts.push(
        if rate > FAST_SPEAKING_RATE {
            "Fast speaking pace observed."
        } else if rate < SLOW_SPEAKING_RATE {
            "Slow speaking pace observed."
        } else {
            "Normal speaking pace."
        }
        .to_string(),
    );

    let level = features.energy.rms_mean;
    if level > LOUD_RMS {
        parts.push("Clear audio quality.".to_string());
    } else if level < QUIET_RMS {
        parts.push("Audio quality may affect accuracy.".to_string());
    }

    if features.pitch.voiced_frames == 0 {
        parts.push("No voiced speech detected; features are unreliable.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureId;

    #[test]
    fn test_confidence_bands() {
        let v = FeatureVector::default();
        assert!(summarize(AccentClass::British, 80, &v).starts_with("Strong indicators of British"));
        assert!(summarize(AccentClass::British, 79, &v).starts_with("Moderate"));
        assert!(summarize(AccentClass::British, 40, &v).starts_with("Some characteristics"));
        assert!(summarize(AccentClass::British, 39, &v).starts_with("Accent classification uncertain"));
    }

    #[test]
    fn test_duration_and_pace_remarks() {
        let long_fast = FeatureVector::default()
            .with(FeatureId::Duration, 120.0)
            .with(FeatureId::SpeakingRate, 7.0)
            .with(FeatureId::RmsMean, 0.1);
        let text = summarize(AccentClass::Indian, 90, &long_fast);
        assert!(text.contains("good analysis depth"));
        assert!(text.contains("Fast speaking pace"));
        assert!(text.contains("Clear audio quality"));

        let short_slow = FeatureVector::default().with(FeatureId::Duration, 4.0);
        let text = summarize(AccentClass::Indian, 10, &short_slow);
        assert!(text.contains("Short audio sample"));
        assert!(text.contains("Slow speaking pace"));
        assert!(text.contains("No voiced speech"));
    }

    #[test]
    fn test_normal_pace_mid_length_has_no_duration_remark() {
        let v = FeatureVector::default()
            .with(FeatureId::Duration, 30.0)
            .with(FeatureId::SpeakingRate, 4.5)
            .with(FeatureId::RmsMean, 0.03);
        let text = summarize(AccentClass::Canadian, 65, &v);
        assert!(text.contains("Normal speaking pace."));
        assert!(!text.contains("audio sample"));
        assert!(!text.contains("audio quality"));
    }
}
