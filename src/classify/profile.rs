//! Accent reference profiles.
//!
//! Each accent is described purely as data: a list of weighted feature ranges.
//! The table is validated once at load time and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::features::{FeatureId, FeatureVector};
use crate::types::AccentClass;

/// Expected range of one feature within a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub feature: FeatureId,
    pub low: f64,
    pub high: f64,
    /// Distance outside `[low, high]` at which membership reaches zero.
    pub tolerance: f64,
    pub weight: f64,
}

impl FeatureRange {
    pub fn new(feature: FeatureId, low: f64, high: f64, tolerance: f64, weight: f64) -> Self {
        Self {
            feature,
            low,
            high,
            tolerance,
            weight,
        }
    }

    /// Membership of `value` in this range, in `[0, 1]`.
    ///
    /// 1 inside the range, decaying linearly to 0 at `tolerance` outside it.
    /// A zero tolerance makes the range a hard window.
    pub fn membership(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let distance = if value < self.low {
            self.low - value
        } else if value > self.high {
            value - self.high
        } else {
            return 1.0;
        };
        if self.tolerance <= 0.0 {
            return 0.0;
        }
        (1.0 - distance / self.tolerance).clamp(0.0, 1.0)
    }

    /// Midpoint of the range.
    pub fn center(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    fn validate(&self, accent: AccentClass) -> Result<()> {
        let invalid = |what: &str| {
            Err(AnalysisError::Configuration(format!(
                "{} profile, feature '{}': {}",
                accent, self.feature, what
            )))
        };
        if !self.low.is_finite() || !self.high.is_finite() {
            return invalid("range bounds must be finite");
        }
        if self.low > self.high {
            return invalid("low must not exceed high");
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return invalid("tolerance must be finite and non-negative");
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return invalid("weight must be finite and non-negative");
        }
        Ok(())
    }
}

/// Reference profile for one accent class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccentProfile {
    pub accent: AccentClass,
    pub features: Vec<FeatureRange>,
}

impl AccentProfile {
    pub fn new(accent: AccentClass, features: Vec<FeatureRange>) -> Self {
        Self { accent, features }
    }

    /// Sum of feature weights.
    pub fn total_weight(&self) -> f64 {
        self.features.iter().map(|range| range.weight).sum()
    }

    /// A feature vector sitting at the center of every range of this profile.
    pub fn center_vector(&self, base: FeatureVector) -> FeatureVector {
        self.features
            .iter()
            .fold(base, |vector, range| vector.with(range.feature, range.center()))
    }

    fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(AnalysisError::Configuration(format!(
                "{} profile has no features",
                self.accent
            )));
        }
        let mut seen = BTreeSet::new();
        for range in &self.features {
            range.validate(self.accent)?;
            if !seen.insert(range.feature) {
                return Err(AnalysisError::Configuration(format!(
                    "{} profile lists feature '{}' twice",
                    self.accent, range.feature
                )));
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(AnalysisError::Configuration(format!(
                "{} profile weights sum to zero",
                self.accent
            )));
        }
        Ok(())
    }
}

/// Process-wide set of accent profiles, kept in canonical accent order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileTable {
    profiles: Vec<AccentProfile>,
}

impl ProfileTable {
    /// Validate and build a table.
    ///
    /// # Errors
    /// `Configuration` when the table is empty, an accent appears twice, or a
    /// profile is malformed.
    pub fn new(mut profiles: Vec<AccentProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(AnalysisError::Configuration(
                "profile table is empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !seen.insert(profile.accent) {
                return Err(AnalysisError::Configuration(format!(
                    "accent {} has more than one profile",
                    profile.accent
                )));
            }
        }
        profiles.sort_by_key(|profile| profile.accent);
        Ok(Self { profiles })
    }

    /// Parse a table from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: ProfileTable = toml::from_str(text)
            .map_err(|e| AnalysisError::Configuration(format!("invalid profile table: {}", e)))?;
        Self::new(raw.profiles)
    }

    /// Load a table from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialise the table as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::Configuration(format!("cannot serialise profiles: {}", e)))
    }

    /// The built-in reference table.
    ///
    /// Each accent weighs pitch variation (25), onset tempo (20), speaking
    /// rate (15) and the sign pattern of two low cepstral coefficients (10
    /// each).
    pub fn builtin() -> Self {
        use FeatureId::*;

        let pitch = |low: f64, high: f64| FeatureRange::new(PitchStd, low, high, 15.0, 25.0);
        let tempo = |low: f64, high: f64| FeatureRange::new(Tempo, low, high, 30.0, 20.0);
        let rate = |low: f64, high: f64| FeatureRange::new(SpeakingRate, low, high, 2.0, 15.0);
        let mfcc =
            |i: usize, low: f64, high: f64| FeatureRange::new(MfccMean(i), low, high, 10.0, 10.0);

        let profile = |accent: AccentClass, prosody: [FeatureRange; 3], cepstral: [FeatureRange; 2]| {
            AccentProfile::new(accent, prosody.into_iter().chain(cepstral).collect())
        };

        Self {
            profiles: vec![
                profile(
                    AccentClass::American,
                    [pitch(20.0, 50.0), tempo(140.0, 180.0), rate(4.0, 6.0)],
                    [mfcc(1, 5.0, 35.0), mfcc(2, -35.0, -5.0)],
                ),
                profile(
                    AccentClass::British,
                    [pitch(50.0, 80.0), tempo(120.0, 160.0), rate(3.0, 5.0)],
                    [mfcc(1, -35.0, -5.0), mfcc(3, 5.0, 35.0)],
                ),
                profile(
                    AccentClass::Australian,
                    [pitch(50.0, 80.0), tempo(130.0, 170.0), rate(4.0, 6.0)],
                    [mfcc(2, 5.0, 35.0), mfcc(4, 5.0, 35.0)],
                ),
                profile(
                    AccentClass::Canadian,
                    [pitch(20.0, 50.0), tempo(135.0, 175.0), rate(4.0, 6.0)],
                    [mfcc(1, -15.0, 5.0), mfcc(2, -5.0, 25.0)],
                ),
                profile(
                    AccentClass::Indian,
                    [pitch(80.0, 140.0), tempo(150.0, 200.0), rate(5.0, 8.0)],
                    [mfcc(0, 10.0, 60.0), mfcc(1, 5.0, 35.0)],
                ),
            ],
        }
    }

    pub fn profiles(&self) -> &[AccentProfile] {
        &self.profiles
    }

    pub fn get(&self, accent: AccentClass) -> Option<&AccentProfile> {
        self.profiles.iter().find(|profile| profile.accent == accent)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Whether any profile gives `feature` a non-zero weight.
    pub fn uses_feature(&self, feature: FeatureId) -> bool {
        self.profiles.iter().any(|profile| {
            profile
                .features
                .iter()
                .any(|range| range.feature == feature && range.weight > 0.0)
        })
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_membership_shape() {
        let range = FeatureRange::new(FeatureId::PitchStd, 20.0, 50.0, 10.0, 1.0);
        assert_eq!(range.membership(20.0), 1.0);
        assert_eq!(range.membership(35.0), 1.0);
        assert_eq!(range.membership(50.0), 1.0);
        assert!((range.membership(55.0) - 0.5).abs() < 1e-12);
        assert!((range.membership(15.0) - 0.5).abs() < 1e-12);
        assert_eq!(range.membership(60.0), 0.0);
        assert_eq!(range.membership(500.0), 0.0);
        assert_eq!(range.membership(f64::NAN), 0.0);
    }

    #[test]
    fn test_zero_tolerance_is_hard_window() {
        let range = FeatureRange::new(FeatureId::PauseRatio, 0.1, 0.3, 0.0, 1.0);
        assert_eq!(range.membership(0.2), 1.0);
        assert_eq!(range.membership(0.3000001), 0.0);
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let builtin = ProfileTable::builtin();
        let validated = ProfileTable::new(builtin.profiles().to_vec()).unwrap();
        assert_eq!(validated, builtin);
        assert_eq!(builtin.len(), AccentClass::ALL.len());
        let order: Vec<_> = builtin.profiles().iter().map(|p| p.accent).collect();
        assert_eq!(order, AccentClass::ALL.to_vec());
    }

    #[test]
    fn test_table_sorted_into_canonical_order() {
        let range = || vec![FeatureRange::new(FeatureId::PitchStd, 0.0, 1.0, 1.0, 1.0)];
        let table = ProfileTable::new(vec![
            AccentProfile::new(AccentClass::Indian, range()),
            AccentProfile::new(AccentClass::American, range()),
        ])
        .unwrap();
        assert_eq!(table.profiles()[0].accent, AccentClass::American);
        assert_eq!(table.profiles()[1].accent, AccentClass::Indian);
    }

    #[test]
    fn test_rejects_invalid_tables() {
        assert!(ProfileTable::new(vec![]).is_err());

        let range = |low, high, tol, weight| {
            vec![FeatureRange::new(FeatureId::PitchStd, low, high, tol, weight)]
        };
        let bad = [
            range(5.0, 1.0, 1.0, 1.0),
            range(0.0, 1.0, -1.0, 1.0),
            range(0.0, 1.0, 1.0, -1.0),
            range(0.0, 1.0, 1.0, 0.0),
            range(f64::NAN, 1.0, 1.0, 1.0),
            vec![],
        ];
        for features in bad {
            let err = ProfileTable::new(vec![AccentProfile::new(AccentClass::British, features)])
                .unwrap_err();
            assert_eq!(err.kind(), "ConfigurationError");
        }

        let duplicate = ProfileTable::new(vec![
            AccentProfile::new(AccentClass::British, range(0.0, 1.0, 1.0, 1.0)),
            AccentProfile::new(AccentClass::British, range(0.0, 1.0, 1.0, 1.0)),
        ]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_builtin_weights_tempo_bands() {
        let table = ProfileTable::builtin();
        assert!(table.uses_feature(FeatureId::Tempo));
        assert!(!table.uses_feature(FeatureId::ArticulationRate));
        for profile in table.profiles() {
            assert_eq!(profile.total_weight(), 80.0);
        }
        let british = table.get(AccentClass::British).unwrap();
        let tempo = british
            .features
            .iter()
            .find(|range| range.feature == FeatureId::Tempo)
            .unwrap();
        assert_eq!((tempo.low, tempo.high), (120.0, 160.0));
        assert_eq!(tempo.membership(140.0), 1.0);
        assert!((tempo.membership(175.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let builtin = ProfileTable::builtin();
        let text = builtin.to_toml().unwrap();
        assert!(text.contains("pitch_std"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let loaded = ProfileTable::load(file.path()).unwrap();
        assert_eq!(loaded, builtin);
    }

    #[test]
    fn test_parse_custom_table() {
        let text = r#"
            [[profiles]]
            accent = "Canadian"

            [[profiles.features]]
            feature = "speaking_rate"
            low = 3.0
            high = 5.0
            tolerance = 1.0
            weight = 2.0
        "#;
        let table = ProfileTable::from_toml_str(text).unwrap();
        assert_eq!(table.len(), 1);
        let profile = table.get(AccentClass::Canadian).unwrap();
        assert_eq!(profile.features[0].feature, FeatureId::SpeakingRate);
        assert!(table.uses_feature(FeatureId::SpeakingRate));
        assert!(!table.uses_feature(FeatureId::ZcrMean));
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let text = r#"
            [[profiles]]
            accent = "Canadian"

            [[profiles.features]]
            feature = "loudness"
            low = 0.0
            high = 1.0
            tolerance = 1.0
            weight = 1.0
        "#;
        assert!(ProfileTable::from_toml_str(text).is_err());
    }
}
