//! Audio acquisition and normalisation.

pub mod normalizer;
pub mod source;

pub use normalizer::AudioNormalizer;
pub use source::{is_supported_url, AudioFetcher, AudioInput, HttpAudioFetcher};
