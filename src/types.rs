//! Strong typing with newtypes for domain concepts.
//!
//! This module provides type-safe wrappers around primitive types so that an
//! unsupported sample rate or an out-of-range duration cap cannot reach the
//! analysis stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::audio::{
    DEFAULT_MAX_DURATION_MINUTES, DEFAULT_SAMPLE_RATE, MAX_MAX_DURATION_MINUTES,
    MIN_MAX_DURATION_MINUTES, SUPPORTED_SAMPLE_RATES,
};
use crate::error::AnalysisError;

/// Output sample rate of the normaliser, restricted to the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SampleRate(u32);

impl SampleRate {
    /// 16 kHz.
    pub const HZ_16000: Self = Self(16_000);

    /// 22.05 kHz.
    pub const HZ_22050: Self = Self(22_050);

    /// 44.1 kHz.
    pub const HZ_44100: Self = Self(44_100);

    /// Create a sample rate, rejecting anything outside the supported set.
    pub fn new(rate: u32) -> Result<Self, AnalysisError> {
        if SUPPORTED_SAMPLE_RATES.contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(AnalysisError::InvalidRequest(format!(
                "sample rate {} not supported (expected one of {:?})",
                rate, SUPPORTED_SAMPLE_RATES
            )))
        }
    }

    /// Get the sample rate value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Convert to f64 for calculations.
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// Number of samples covering `ms` milliseconds at this rate.
    pub fn samples_for_ms(self, ms: f64) -> usize {
        (self.as_f64() * ms / 1000.0).round() as usize
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self(DEFAULT_SAMPLE_RATE)
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = AnalysisError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.0
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

/// Maximum clip duration in whole minutes, within `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MaxDuration(u8);

impl MaxDuration {
    /// Create a duration cap with validation.
    pub fn from_minutes(minutes: u8) -> Result<Self, AnalysisError> {
        if (MIN_MAX_DURATION_MINUTES..=MAX_MAX_DURATION_MINUTES).contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(AnalysisError::InvalidRequest(format!(
                "max_duration_minutes must be between {} and {}, got {}",
                MIN_MAX_DURATION_MINUTES, MAX_MAX_DURATION_MINUTES, minutes
            )))
        }
    }

    /// Get the cap in minutes.
    pub fn minutes(self) -> u8 {
        self.0
    }

    /// Get the cap in seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 * 60.0
    }

    /// Maximum number of samples at the given rate.
    pub fn max_samples(self, rate: SampleRate) -> usize {
        self.0 as usize * 60 * rate.value() as usize
    }
}

impl Default for MaxDuration {
    fn default() -> Self {
        Self(DEFAULT_MAX_DURATION_MINUTES)
    }
}

impl TryFrom<u8> for MaxDuration {
    type Error = AnalysisError;

    fn try_from(minutes: u8) -> Result<Self, Self::Error> {
        Self::from_minutes(minutes)
    }
}

impl From<MaxDuration> for u8 {
    fn from(cap: MaxDuration) -> Self {
        cap.0
    }
}

/// Supported accent classes.
///
/// Declaration order is the canonical ordering used to break ties between
/// equal scores: American, British, Australian, Canadian, Indian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccentClass {
    American,
    British,
    Australian,
    Canadian,
    Indian,
}

impl AccentClass {
    /// All classes in canonical order.
    pub const ALL: [AccentClass; 5] = [
        AccentClass::American,
        AccentClass::British,
        AccentClass::Australian,
        AccentClass::Canadian,
        AccentClass::Indian,
    ];

    /// Display name.
    pub fn as_str(self) -> &'static str {
        match self {
            AccentClass::American => "American",
            AccentClass::British => "British",
            AccentClass::Australian => "Australian",
            AccentClass::Canadian => "Canadian",
            AccentClass::Indian => "Indian",
        }
    }
}

impl fmt::Display for AccentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccentClass {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccentClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AnalysisError::Configuration(format!("unknown accent class '{}'", s)))
    }
}

/// Normalised mono PCM clip.
///
/// Owned by the request that produced it; never shared across requests.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: SampleRate,
}

impl AudioClip {
    /// Create a clip from mono samples at a supported rate.
    pub fn new(samples: Vec<f32>, sample_rate: SampleRate) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get the samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get the sample rate.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the clip is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clip duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.as_f64()
    }
}

impl fmt::Display for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioClip({} samples @ {}, {:.2}s)",
            self.samples.len(),
            self.sample_rate,
            self.duration_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_validation() {
        assert!(SampleRate::new(8000).is_err());
        assert!(SampleRate::new(48000).is_err());
        assert_eq!(SampleRate::new(16000).unwrap(), SampleRate::HZ_16000);
        assert_eq!(SampleRate::new(22050).unwrap(), SampleRate::HZ_22050);
        assert_eq!(SampleRate::new(44100).unwrap(), SampleRate::HZ_44100);
    }

    #[test]
    fn test_sample_rate_serde_rejects_unsupported() {
        assert!(serde_json::from_str::<SampleRate>("22050").is_ok());
        assert!(serde_json::from_str::<SampleRate>("48000").is_err());
    }

    #[test]
    fn test_samples_for_ms_scales_with_rate() {
        assert_eq!(SampleRate::HZ_16000.samples_for_ms(25.0), 400);
        assert_eq!(SampleRate::HZ_16000.samples_for_ms(10.0), 160);
        assert_eq!(SampleRate::HZ_44100.samples_for_ms(10.0), 441);
    }

    #[test]
    fn test_max_duration_bounds() {
        assert!(MaxDuration::from_minutes(0).is_err());
        assert!(MaxDuration::from_minutes(11).is_err());
        let cap = MaxDuration::from_minutes(5).unwrap();
        assert_eq!(cap.as_secs_f64(), 300.0);
        assert_eq!(cap.max_samples(SampleRate::HZ_16000), 300 * 16000);
    }

    #[test]
    fn test_accent_canonical_order() {
        let mut shuffled = vec![
            AccentClass::Indian,
            AccentClass::American,
            AccentClass::Canadian,
            AccentClass::British,
            AccentClass::Australian,
        ];
        shuffled.sort();
        assert_eq!(shuffled, AccentClass::ALL.to_vec());
    }

    #[test]
    fn test_accent_from_str() {
        assert_eq!("british".parse::<AccentClass>().unwrap(), AccentClass::British);
        assert!("Scottish".parse::<AccentClass>().is_err());
    }

    #[test]
    fn test_audio_clip_duration() {
        let clip = AudioClip::new(vec![0.0; 32000], SampleRate::HZ_16000);
        assert_eq!(clip.duration_secs(), 2.0);
        assert_eq!(clip.len(), 32000);
    }
}
