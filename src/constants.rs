//! Domain constants for the accent analyzer.
//!
//! This module contains compile-time constants used throughout the analysis
//! pipeline. These are separated from runtime configuration to provide a clear
//! distinction between values that never change and those that can be configured.

/// Audio normalisation constants.
pub mod audio {
    /// Sample rates the normaliser can produce.
    pub const SUPPORTED_SAMPLE_RATES: [u32; 3] = [16_000, 22_050, 44_100];

    /// Default target sample rate.
    pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

    /// Smallest accepted maximum duration, in minutes.
    pub const MIN_MAX_DURATION_MINUTES: u8 = 1;

    /// Largest accepted maximum duration, in minutes.
    pub const MAX_MAX_DURATION_MINUTES: u8 = 10;

    /// Default maximum duration, in minutes.
    pub const DEFAULT_MAX_DURATION_MINUTES: u8 = 5;

    /// Minimum usable clip duration after normalisation.
    pub const MIN_CLIP_DURATION_SECS: f64 = 1.0;

    /// Extra decoded audio kept past the cap so the resampled clip can be
    /// truncated to the exact maximum.
    pub const DECODE_MARGIN_SECS: f64 = 1.0;

    /// Sinc filter length used by the resampler.
    pub const RESAMPLER_SINC_LEN: usize = 256;

    /// Resampler cutoff relative to Nyquist.
    pub const RESAMPLER_CUTOFF: f32 = 0.95;

    /// Resampler input block size in frames.
    pub const RESAMPLER_CHUNK_FRAMES: usize = 8192;
}

/// Frame-level analysis constants.
pub mod analysis {
    /// Analysis window length in milliseconds.
    pub const WINDOW_MS: f64 = 25.0;

    /// Hop between consecutive frames in milliseconds.
    pub const HOP_MS: f64 = 10.0;

    /// Pitch analysis window in milliseconds. Longer than the spectral window
    /// so two periods of the lowest pitch fit inside.
    pub const PITCH_WINDOW_MS: f64 = 40.0;

    /// Number of mel bands in the filter bank.
    pub const MEL_BANDS: usize = 26;

    /// Number of cepstral coefficients kept per frame.
    pub const CEPSTRAL_COEFFICIENTS: usize = 13;

    /// Lower edge of the mel filter bank in Hz.
    pub const MEL_LOW_HZ: f64 = 20.0;

    /// Upper edge of the mel filter bank in Hz (clamped to Nyquist).
    pub const MEL_HIGH_HZ: f64 = 8_000.0;

    /// Fraction of spectral energy below the rolloff frequency.
    pub const ROLLOFF_FRACTION: f64 = 0.85;

    /// Floor applied to mel energies before taking the logarithm.
    pub const LOG_FLOOR: f64 = 1e-10;

    /// Lowest plausible fundamental frequency of a human voice.
    pub const PITCH_MIN_HZ: f64 = 60.0;

    /// Highest plausible fundamental frequency of a human voice.
    pub const PITCH_MAX_HZ: f64 = 400.0;

    /// Absolute RMS floor below which a frame is never voiced.
    pub const VOICING_RMS_FLOOR: f64 = 0.005;

    /// Frame energy relative to the clip's mean energy needed for voicing.
    pub const VOICING_RELATIVE_ENERGY: f64 = 0.3;

    /// Normalised autocorrelation peak needed for a periodic (pitched) frame.
    pub const PERIODICITY_THRESHOLD: f64 = 0.3;

    /// Shortest run of active frames counted as a speech segment.
    pub const MIN_SEGMENT_FRAMES: usize = 3;

    /// Slowest tempo the onset tracker reports, in beats per minute.
    pub const TEMPO_MIN_BPM: f64 = 60.0;

    /// Fastest tempo the onset tracker reports, in beats per minute.
    pub const TEMPO_MAX_BPM: f64 = 300.0;

    /// Normalised onset autocorrelation peak needed to report a tempo.
    pub const TEMPO_PERIODICITY_THRESHOLD: f64 = 0.1;

    /// Lowest frequency folded into the chroma profile (A0).
    pub const CHROMA_LOW_HZ: f64 = 27.5;

    /// Absolute amplitude from which a sample counts as clipped.
    pub const CLIPPING_LEVEL: f32 = 0.95;

    /// Frame-level percentile taken as the noise floor.
    pub const NOISE_PERCENTILE: f64 = 0.1;

    /// Frame-level percentile taken as the signal level.
    pub const SIGNAL_PERCENTILE: f64 = 0.9;

    /// Upper bound on the reported signal-to-noise ratio.
    pub const MAX_SNR_DB: f64 = 60.0;
}

/// Classification and calibration constants.
pub mod scoring {
    /// Scores within this distance of the maximum are treated as tied.
    pub const TIE_EPSILON: f64 = 1e-9;

    /// Margin over the runner-up at which the margin bonus saturates.
    pub const MARGIN_SATURATION: f64 = 0.25;

    /// Share of confidence earned by the winning score alone.
    pub const CONFIDENCE_BASE_SHARE: f64 = 0.6;

    /// Voiced-frame ratio from which confidence is no longer capped.
    pub const RELIABLE_VOICED_RATIO: f64 = 0.3;

    /// Confidence ceiling for a clip with no voiced frames.
    pub const UNVOICED_CONFIDENCE_CAP: f64 = 20.0;

    /// Clip length from which duration no longer caps confidence.
    pub const FULL_EVIDENCE_SECS: f64 = 30.0;

    /// Confidence ceiling for a clip of zero length.
    pub const SHORT_CLIP_CONFIDENCE_CAP: f64 = 20.0;

    /// Audio quality score from which quality no longer caps confidence.
    pub const GOOD_QUALITY_SCORE: f64 = 60.0;

    /// Confidence ceiling for a clip with a quality score of zero.
    pub const POOR_QUALITY_CONFIDENCE_CAP: f64 = 50.0;

    /// Articulation rate (segments per voiced second) that earns full credit.
    pub const FLUENT_ARTICULATION_RATE: f64 = 3.0;

    /// Pause ratio up to which no fluency penalty applies.
    pub const FLUENT_PAUSE_RATIO: f64 = 0.35;

    /// Pause ratio at which pause credit reaches zero.
    pub const EXTREME_PAUSE_RATIO: f64 = 0.85;

    /// F0 standard deviation (Hz) that earns full intonation credit.
    pub const EXPRESSIVE_PITCH_STD_HZ: f64 = 20.0;

    /// RMS level that earns full clarity credit.
    pub const CLEAR_RMS_LEVEL: f64 = 0.02;
}

/// Service boundary constants.
pub mod server {
    /// Default maximum number of concurrent classification requests.
    pub const MAX_CONCURRENT_REQUESTS: usize = 8;

    /// Default limit on fetched audio size (200 MiB).
    pub const MAX_DOWNLOAD_BYTES: usize = 200 * 1024 * 1024;

    /// Default upload body limit for the raw-bytes endpoint (200 MiB).
    pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_rates_are_sorted_and_include_default() {
        let rates = audio::SUPPORTED_SAMPLE_RATES;
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
        assert!(rates.contains(&audio::DEFAULT_SAMPLE_RATE));
    }

    #[test]
    fn test_pitch_window_fits_two_periods() {
        let lowest_period_ms = 1000.0 / analysis::PITCH_MIN_HZ;
        assert!(analysis::PITCH_WINDOW_MS >= 2.0 * lowest_period_ms);
    }

    #[test]
    fn test_tempo_band_is_ordered() {
        assert!(analysis::TEMPO_MIN_BPM < analysis::TEMPO_MAX_BPM);
        assert!(analysis::NOISE_PERCENTILE < analysis::SIGNAL_PERCENTILE);
    }

    #[test]
    fn test_duration_bounds() {
        assert!(audio::MIN_MAX_DURATION_MINUTES <= audio::DEFAULT_MAX_DURATION_MINUTES);
        assert!(audio::DEFAULT_MAX_DURATION_MINUTES <= audio::MAX_MAX_DURATION_MINUTES);
    }
}
