//! Audio normalisation: decode, downmix, resample, cap.
//!
//! Turns an arbitrary container/codec byte stream into a mono [`AudioClip`] at
//! one of the supported sample rates. Over-length input is truncated to the
//! requested maximum, never rejected.

use bytes::Bytes;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::constants::audio::{
    DECODE_MARGIN_SECS, MIN_CLIP_DURATION_SECS, RESAMPLER_CHUNK_FRAMES, RESAMPLER_CUTOFF,
    RESAMPLER_SINC_LEN,
};
use crate::error::{AnalysisError, Result};
use crate::types::{AudioClip, MaxDuration, SampleRate};

/// Decoded mono audio at its native rate.
#[derive(Debug)]
struct DecodedMono {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Decodes and normalises raw audio byte streams.
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    /// Clips shorter than this after normalisation are rejected.
    min_clip_secs: f64,
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self {
            min_clip_secs: MIN_CLIP_DURATION_SECS,
        }
    }
}

impl AudioNormalizer {
    /// Create a normaliser with a custom minimum clip duration.
    pub fn new(min_clip_secs: f64) -> Self {
        Self { min_clip_secs }
    }

    /// Decode `bytes`, downmix to mono, resample to `target` and cap at `max`.
    ///
    /// # Errors
    /// * `UnsupportedFormat` - empty input or a stream symphonia cannot decode
    /// * `AudioTooShort` - normalised clip shorter than the minimum duration
    pub fn normalize(&self, bytes: Bytes, target: SampleRate, max: MaxDuration) -> Result<AudioClip> {
        if bytes.is_empty() {
            return Err(AnalysisError::UnsupportedFormat(
                "empty byte stream".to_string(),
            ));
        }

        let decoded = decode_mono(bytes, max.as_secs_f64() + DECODE_MARGIN_SECS)?;
        debug!(
            "Decoded {} mono frames at {} Hz",
            decoded.samples.len(),
            decoded.sample_rate
        );

        let mut samples = if decoded.sample_rate == target.value() {
            decoded.samples
        } else {
            resample_mono(&decoded.samples, decoded.sample_rate, target.value())?
        };

        let max_samples = max.max_samples(target);
        if samples.len() > max_samples {
            debug!(
                "Truncating clip from {:.2}s to {:.2}s",
                samples.len() as f64 / target.as_f64(),
                max.as_secs_f64()
            );
            samples.truncate(max_samples);
        }

        let clip = AudioClip::new(samples, target);
        if clip.duration_secs() < self.min_clip_secs {
            return Err(AnalysisError::AudioTooShort {
                duration_secs: clip.duration_secs(),
                min_secs: self.min_clip_secs,
            });
        }

        Ok(clip)
    }
}

/// Decode the default audio track into mono `f32`, stopping once `max_secs`
/// of audio has been collected.
fn decode_mono(bytes: Bytes, max_secs: f64) -> Result<DecodedMono> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AnalysisError::UnsupportedFormat(format!("probe failed: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::UnsupportedFormat("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params.sample_rate.ok_or_else(|| {
        AnalysisError::UnsupportedFormat("sample rate not specified".to_string())
    })?;
    if sample_rate == 0 {
        return Err(AnalysisError::UnsupportedFormat(
            "sample rate is zero".to_string(),
        ));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::UnsupportedFormat(format!("no decoder: {}", e)))?;

    let max_frames = (max_secs * sample_rate as f64).ceil() as usize;
    let mut samples = Vec::new();

    loop {
        if samples.len() >= max_frames {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AnalysisError::UnsupportedFormat(format!(
                    "packet read failed: {}",
                    e
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(AnalysisError::UnsupportedFormat(format!(
                    "decode failed: {}",
                    e
                )))
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        if decoded.frames() == 0 {
            continue;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        downmix_into(sample_buf.samples(), channels, &mut samples);
    }

    samples.truncate(max_frames);

    Ok(DecodedMono {
        samples,
        sample_rate,
    })
}

/// Average interleaved frames into mono and append them to `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Resample mono PCM with band-limited sinc interpolation.
///
/// The resampler's output delay is trimmed so the result is time-aligned with
/// the input and has `round(len * ratio)` samples.
fn resample_mono(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: RESAMPLER_SINC_LEN,
        f_cutoff: RESAMPLER_CUTOFF,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK_FRAMES, 1)
        .map_err(|e| AnalysisError::UnsupportedFormat(format!("resampler setup failed: {}", e)))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + delay);
    let resample_err =
        |e: rubato::ResampleError| AnalysisError::UnsupportedFormat(format!("resampling failed: {}", e));

    let mut chunks = samples.chunks_exact(RESAMPLER_CHUNK_FRAMES);
    for chunk in chunks.by_ref() {
        let block = resampler.process(&[chunk], None).map_err(resample_err)?;
        output.extend_from_slice(&block[0]);
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let tail_in: [&[f32]; 1] = [tail];
        let block = resampler
            .process_partial(Some(&tail_in[..]), None)
            .map_err(resample_err)?;
        output.extend_from_slice(&block[0]);
    }
    while output.len() < expected + delay {
        let block = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resample_err)?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);

    debug!(
        "Resampled {} frames ({} Hz) -> {} frames ({} Hz)",
        samples.len(),
        source_rate,
        output.len(),
        target_rate
    );

    Ok(output)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Encode mono or stereo PCM as an in-memory 16-bit WAV file.
    pub(crate) fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Bytes {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                for _ in 0..channels {
                    writer
                        .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    pub(crate) fn sine(freq: f32, secs: f32, rate: u32, amp: f32) -> Vec<f32> {
        let n = (secs * rate as f32) as usize;
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_empty_stream_is_unsupported() {
        let normalizer = AudioNormalizer::default();
        let err = normalizer
            .normalize(Bytes::new(), SampleRate::HZ_16000, MaxDuration::default())
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormatError");
    }

    #[test]
    fn test_garbage_stream_is_unsupported() {
        let normalizer = AudioNormalizer::default();
        let garbage = Bytes::from(vec![0x42u8; 4096]);
        let err = normalizer
            .normalize(garbage, SampleRate::HZ_16000, MaxDuration::default())
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormatError");
    }

    #[test]
    fn test_same_rate_passthrough() {
        let samples = sine(220.0, 2.0, 16000, 0.5);
        let bytes = wav_bytes(&samples, 16000, 1);
        let clip = AudioNormalizer::default()
            .normalize(bytes, SampleRate::HZ_16000, MaxDuration::default())
            .unwrap();
        assert_eq!(clip.sample_rate(), SampleRate::HZ_16000);
        assert_eq!(clip.len(), samples.len());
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let samples = sine(220.0, 1.5, 22050, 0.5);
        let bytes = wav_bytes(&samples, 22050, 2);
        let clip = AudioNormalizer::default()
            .normalize(bytes, SampleRate::HZ_22050, MaxDuration::default())
            .unwrap();
        assert_eq!(clip.len(), samples.len());
        let peak = clip.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_resample_changes_length_proportionally() {
        let samples = sine(220.0, 2.0, 16000, 0.5);
        let bytes = wav_bytes(&samples, 16000, 1);
        let clip = AudioNormalizer::default()
            .normalize(bytes, SampleRate::HZ_44100, MaxDuration::default())
            .unwrap();
        assert_eq!(clip.sample_rate(), SampleRate::HZ_44100);
        let expected = (samples.len() as f64 * 44100.0 / 16000.0).round() as usize;
        assert_eq!(clip.len(), expected);
    }

    #[test]
    fn test_over_length_clip_is_truncated_exactly() {
        // 75 s of audio against a 1 minute cap.
        let samples = vec![0.1f32; 16000 * 75];
        let bytes = wav_bytes(&samples, 16000, 1);
        let cap = MaxDuration::from_minutes(1).unwrap();
        let clip = AudioNormalizer::default()
            .normalize(bytes, SampleRate::HZ_16000, cap)
            .unwrap();
        assert_eq!(clip.len(), cap.max_samples(SampleRate::HZ_16000));
        assert_eq!(clip.duration_secs(), 60.0);
    }

    #[test]
    fn test_short_clip_rejected() {
        let samples = vec![0.1f32; 8000];
        let bytes = wav_bytes(&samples, 16000, 1);
        let err = AudioNormalizer::default()
            .normalize(bytes, SampleRate::HZ_16000, MaxDuration::default())
            .unwrap_err();
        match err {
            AnalysisError::AudioTooShort { duration_secs, min_secs } => {
                assert!((duration_secs - 0.5).abs() < 1e-9);
                assert_eq!(min_secs, 1.0);
            }
            other => panic!("expected AudioTooShort, got {:?}", other),
        }
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, 0.5], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5]);
    }
}
