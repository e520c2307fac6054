//! The fixed-shape feature vector and its closed set of feature names.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::cepstral::CepstralSummary;
use super::pitch::PitchSummary;
use super::quality::AudioQuality;
use super::rhythm::{EnergySummary, RhythmSummary};
use super::spectral::SpectralSummary;
use crate::constants::analysis::CEPSTRAL_COEFFICIENTS;
use crate::error::{AnalysisError, Result};

/// Identifier of one scalar in a [`FeatureVector`].
///
/// Names are stable snake_case strings such as `mfcc_mean_0`,
/// `spectral_centroid_mean` or `pitch_std`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeatureId {
    MfccMean(usize),
    MfccVar(usize),
    SpectralCentroidMean,
    SpectralCentroidVar,
    SpectralRolloffMean,
    SpectralRolloffVar,
    SpectralBandwidthMean,
    SpectralBandwidthVar,
    ChromaMean,
    ChromaStd,
    PitchMean,
    PitchVariance,
    PitchStd,
    PitchRange,
    VoicedRatio,
    SpeakingRate,
    PauseRatio,
    ArticulationRate,
    Tempo,
    RmsMean,
    RmsVariance,
    ZcrMean,
    SnrDb,
    DynamicRange,
    ClippingRatio,
    Duration,
}

static ALL_FEATURES: Lazy<Vec<FeatureId>> = Lazy::new(|| {
    let mut ids = Vec::with_capacity(2 * CEPSTRAL_COEFFICIENTS + 24);
    ids.extend((0..CEPSTRAL_COEFFICIENTS).map(FeatureId::MfccMean));
    ids.extend((0..CEPSTRAL_COEFFICIENTS).map(FeatureId::MfccVar));
    ids.extend([
        FeatureId::SpectralCentroidMean,
        FeatureId::SpectralCentroidVar,
        FeatureId::SpectralRolloffMean,
        FeatureId::SpectralRolloffVar,
        FeatureId::SpectralBandwidthMean,
        FeatureId::SpectralBandwidthVar,
        FeatureId::ChromaMean,
        FeatureId::ChromaStd,
        FeatureId::PitchMean,
        FeatureId::PitchVariance,
        FeatureId::PitchStd,
        FeatureId::PitchRange,
        FeatureId::VoicedRatio,
        FeatureId::SpeakingRate,
        FeatureId::PauseRatio,
        FeatureId::ArticulationRate,
        FeatureId::Tempo,
        FeatureId::RmsMean,
        FeatureId::RmsVariance,
        FeatureId::ZcrMean,
        FeatureId::SnrDb,
        FeatureId::DynamicRange,
        FeatureId::ClippingRatio,
        FeatureId::Duration,
    ]);
    ids
});

impl FeatureId {
    /// Every feature in dense-vector order.
    pub fn all() -> &'static [FeatureId] {
        &ALL_FEATURES
    }

    /// Stable snake_case name.
    pub fn name(&self) -> String {
        match self {
            FeatureId::MfccMean(i) => format!("mfcc_mean_{}", i),
            FeatureId::MfccVar(i) => format!("mfcc_var_{}", i),
            other => other.fixed_name().to_string(),
        }
    }

    fn fixed_name(&self) -> &'static str {
        match self {
            FeatureId::MfccMean(_) | FeatureId::MfccVar(_) => "mfcc",
            FeatureId::SpectralCentroidMean => "spectral_centroid_mean",
            FeatureId::SpectralCentroidVar => "spectral_centroid_var",
            FeatureId::SpectralRolloffMean => "spectral_rolloff_mean",
            FeatureId::SpectralRolloffVar => "spectral_rolloff_var",
            FeatureId::SpectralBandwidthMean => "spectral_bandwidth_mean",
            FeatureId::SpectralBandwidthVar => "spectral_bandwidth_var",
            FeatureId::ChromaMean => "chroma_mean",
            FeatureId::ChromaStd => "chroma_std",
            FeatureId::PitchMean => "pitch_mean",
            FeatureId::PitchVariance => "pitch_variance",
            FeatureId::PitchStd => "pitch_std",
            FeatureId::PitchRange => "pitch_range",
            FeatureId::VoicedRatio => "voiced_ratio",
            FeatureId::SpeakingRate => "speaking_rate",
            FeatureId::PauseRatio => "pause_ratio",
            FeatureId::ArticulationRate => "articulation_rate",
            FeatureId::Tempo => "tempo",
            FeatureId::RmsMean => "rms_mean",
            FeatureId::RmsVariance => "rms_variance",
            FeatureId::ZcrMean => "zcr_mean",
            FeatureId::SnrDb => "snr_db",
            FeatureId::DynamicRange => "dynamic_range",
            FeatureId::ClippingRatio => "clipping_ratio",
            FeatureId::Duration => "duration",
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for FeatureId {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let coefficient = |digits: &str| -> Result<usize> {
            digits
                .parse::<usize>()
                .ok()
                .filter(|&i| i < CEPSTRAL_COEFFICIENTS)
                .ok_or_else(|| AnalysisError::Configuration(format!("unknown feature '{}'", s)))
        };

        if let Some(digits) = s.strip_prefix("mfcc_mean_") {
            return coefficient(digits).map(FeatureId::MfccMean);
        }
        if let Some(digits) = s.strip_prefix("mfcc_var_") {
            return coefficient(digits).map(FeatureId::MfccVar);
        }
        ALL_FEATURES
            .iter()
            .skip(2 * CEPSTRAL_COEFFICIENTS)
            .find(|id| id.fixed_name() == s)
            .copied()
            .ok_or_else(|| AnalysisError::Configuration(format!("unknown feature '{}'", s)))
    }
}

impl TryFrom<String> for FeatureId {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.name()
    }
}

/// Fixed-shape description of one clip.
///
/// Every clip produces the same set of features in the same order regardless
/// of its length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cepstral: CepstralSummary,
    pub spectral: SpectralSummary,
    pub pitch: PitchSummary,
    pub rhythm: RhythmSummary,
    pub energy: EnergySummary,
    pub quality: AudioQuality,
    pub duration_secs: f64,
}

impl FeatureVector {
    /// Value of a single feature.
    pub fn value(&self, id: FeatureId) -> f64 {
        match id {
            FeatureId::MfccMean(i) => self.cepstral.mean.get(i).copied().unwrap_or(0.0),
            FeatureId::MfccVar(i) => self.cepstral.variance.get(i).copied().unwrap_or(0.0),
            FeatureId::SpectralCentroidMean => self.spectral.centroid.mean,
            FeatureId::SpectralCentroidVar => self.spectral.centroid.variance,
            FeatureId::SpectralRolloffMean => self.spectral.rolloff.mean,
            FeatureId::SpectralRolloffVar => self.spectral.rolloff.variance,
            FeatureId::SpectralBandwidthMean => self.spectral.bandwidth.mean,
            FeatureId::SpectralBandwidthVar => self.spectral.bandwidth.variance,
            FeatureId::ChromaMean => self.spectral.chroma_mean,
            FeatureId::ChromaStd => self.spectral.chroma_std,
            FeatureId::PitchMean => self.pitch.mean_hz,
            FeatureId::PitchVariance => self.pitch.variance,
            FeatureId::PitchStd => self.pitch.std_hz,
            FeatureId::PitchRange => self.pitch.range_hz,
            FeatureId::VoicedRatio => self.pitch.voiced_ratio,
            FeatureId::SpeakingRate => self.rhythm.speaking_rate,
            FeatureId::PauseRatio => self.rhythm.pause_ratio,
            FeatureId::ArticulationRate => self.rhythm.articulation_rate,
            FeatureId::Tempo => self.rhythm.tempo_bpm,
            FeatureId::RmsMean => self.energy.rms_mean,
            FeatureId::RmsVariance => self.energy.rms_variance,
            FeatureId::ZcrMean => self.energy.zcr_mean,
            FeatureId::SnrDb => self.quality.snr_db,
            FeatureId::DynamicRange => self.quality.dynamic_range,
            FeatureId::ClippingRatio => self.quality.clipping_ratio,
            FeatureId::Duration => self.duration_secs,
        }
    }

    /// Return a copy with one feature replaced. Unknown cepstral indices are
    /// ignored.
    pub fn with(mut self, id: FeatureId, value: f64) -> Self {
        match id {
            FeatureId::MfccMean(i) => {
                if let Some(slot) = self.cepstral.mean.get_mut(i) {
                    *slot = value;
                }
            }
            FeatureId::MfccVar(i) => {
                if let Some(slot) = self.cepstral.variance.get_mut(i) {
                    *slot = value;
                }
            }
            FeatureId::SpectralCentroidMean => self.spectral.centroid.mean = value,
            FeatureId::SpectralCentroidVar => self.spectral.centroid.variance = value,
            FeatureId::SpectralRolloffMean => self.spectral.rolloff.mean = value,
            FeatureId::SpectralRolloffVar => self.spectral.rolloff.variance = value,
            FeatureId::SpectralBandwidthMean => self.spectral.bandwidth.mean = value,
            FeatureId::SpectralBandwidthVar => self.spectral.bandwidth.variance = value,
            FeatureId::ChromaMean => self.spectral.chroma_mean = value,
            FeatureId::ChromaStd => self.spectral.chroma_std = value,
            FeatureId::PitchMean => self.pitch.mean_hz = value,
            FeatureId::PitchVariance => self.pitch.variance = value,
            FeatureId::PitchStd => self.pitch.std_hz = value,
            FeatureId::PitchRange => self.pitch.range_hz = value,
            FeatureId::VoicedRatio => self.pitch.voiced_ratio = value,
            FeatureId::SpeakingRate => self.rhythm.speaking_rate = value,
            FeatureId::PauseRatio => self.rhythm.pause_ratio = value,
            FeatureId::ArticulationRate => self.rhythm.articulation_rate = value,
            FeatureId::Tempo => self.rhythm.tempo_bpm = value,
            FeatureId::RmsMean => self.energy.rms_mean = value,
            FeatureId::RmsVariance => self.energy.rms_variance = value,
            FeatureId::ZcrMean => self.energy.zcr_mean = value,
            FeatureId::SnrDb => self.quality.snr_db = value,
            FeatureId::DynamicRange => self.quality.dynamic_range = value,
            FeatureId::ClippingRatio => self.quality.clipping_ratio = value,
            FeatureId::Duration => self.duration_secs = value,
        }
        self
    }

    /// All features in [`FeatureId::all`] order.
    pub fn to_dense(&self) -> Vec<f64> {
        FeatureId::all().iter().map(|&id| self.value(id)).collect()
    }

    /// First feature holding a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<FeatureId> {
        FeatureId::all()
            .iter()
            .copied()
            .find(|&id| !self.value(id).is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_is_fixed() {
        assert_eq!(FeatureId::all().len(), 2 * CEPSTRAL_COEFFICIENTS + 24);
        assert_eq!(FeatureVector::default().to_dense().len(), FeatureId::all().len());
    }

    #[test]
    fn test_names_parse_back() {
        for &id in FeatureId::all() {
            assert_eq!(id.name().parse::<FeatureId>().unwrap(), id);
        }
        assert!("mfcc_mean_13".parse::<FeatureId>().is_err());
        assert!("mfcc".parse::<FeatureId>().is_err());
        assert!("loudness".parse::<FeatureId>().is_err());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<String> = FeatureId::all().iter().map(|id| id.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), FeatureId::all().len());
    }

    #[test]
    fn test_with_sets_value() {
        let v = FeatureVector::default()
            .with(FeatureId::PitchStd, 35.0)
            .with(FeatureId::MfccMean(2), -12.5);
        assert_eq!(v.value(FeatureId::PitchStd), 35.0);
        assert_eq!(v.value(FeatureId::MfccMean(2)), -12.5);
        assert_eq!(v.value(FeatureId::MfccMean(3)), 0.0);
    }

    #[test]
    fn test_non_finite_detection() {
        assert_eq!(FeatureVector::default().first_non_finite(), None);
        let bad = FeatureVector::default().with(FeatureId::ZcrMean, f64::NAN);
        assert_eq!(bad.first_non_finite(), Some(FeatureId::ZcrMean));
    }

    #[test]
    fn test_feature_id_serde_uses_names() {
        let json = serde_json::to_string(&FeatureId::SpectralRolloffMean).unwrap();
        assert_eq!(json, "\"spectral_rolloff_mean\"");
        let id: FeatureId = serde_json::from_str("\"mfcc_var_4\"").unwrap();
        assert_eq!(id, FeatureId::MfccVar(4));
    }
}
