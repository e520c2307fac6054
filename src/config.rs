//! Runtime configuration.
//!
//! Values are layered with figment: built-in defaults, then `config.toml`,
//! then `config.yaml`, then `ACCENT_`-prefixed environment variables.

use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::classify::ProfileTable;
use crate::constants::audio::MIN_CLIP_DURATION_SECS;
use crate::constants::server::{MAX_CONCURRENT_REQUESTS, MAX_DOWNLOAD_BYTES, MAX_UPLOAD_BYTES};
use crate::error::{AnalysisError, Result};
use crate::types::{MaxDuration, SampleRate};

/// Serde helper for Duration serialization/deserialization as seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

const MAX_TIMEOUT_SECS: u64 = 600;

fn default_server_host() -> String { "0.0.0.0".to_string() }
fn default_server_port() -> u16 { 8057 }
fn default_min_clip_duration_secs() -> f64 { MIN_CLIP_DURATION_SECS }
fn default_acquisition_timeout() -> Duration { Duration::from_secs(120) }
fn default_decode_timeout() -> Duration { Duration::from_secs(60) }
fn default_max_download_bytes() -> usize { MAX_DOWNLOAD_BYTES }
fn default_max_upload_bytes() -> usize { MAX_UPLOAD_BYTES }
fn default_max_concurrent_requests() -> usize { MAX_CONCURRENT_REQUESTS }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "accent-analyzer".to_string() }

/// Application configuration loaded from multiple sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server host
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// HTTP server port
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Sample rate used when a request does not specify one
    #[serde(default)]
    pub default_sample_rate: SampleRate,

    /// Duration cap used when a request does not specify one
    #[serde(default)]
    pub default_max_duration_minutes: MaxDuration,

    /// Shortest usable clip after normalisation
    #[serde(default = "default_min_clip_duration_secs")]
    pub min_clip_duration_secs: f64,

    /// Deadline for fetching remote audio
    #[serde(
        rename = "acquisition_timeout_secs",
        with = "duration_secs",
        default = "default_acquisition_timeout"
    )]
    pub acquisition_timeout: Duration,

    /// Deadline for decoding and resampling
    #[serde(
        rename = "decode_timeout_secs",
        with = "duration_secs",
        default = "default_decode_timeout"
    )]
    pub decode_timeout: Duration,

    /// Largest remote body the fetcher accepts
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: usize,

    /// Largest request body the upload endpoint accepts
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Requests processed at once before new ones are refused
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// TOML file replacing the built-in profile table
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Service name reported to the tracing backend
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Jaeger agent endpoint; tracing export is off when unset
    #[serde(default)]
    pub jaeger_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            default_sample_rate: SampleRate::default(),
            default_max_duration_minutes: MaxDuration::default(),
            min_clip_duration_secs: default_min_clip_duration_secs(),
            acquisition_timeout: default_acquisition_timeout(),
            decode_timeout: default_decode_timeout(),
            max_download_bytes: default_max_download_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
            max_concurrent_requests: default_max_concurrent_requests(),
            profiles_path: None,
            log_level: default_log_level(),
            log_json: false,
            service_name: default_service_name(),
            jaeger_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables prefixed `ACCENT_` (highest priority)
    /// 2. config.yaml (if exists)
    /// 3. config.toml (if exists)
    /// 4. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file("config.toml"))
                .merge(Yaml::file("config.yaml"))
                .merge(Env::prefixed("ACCENT_")),
        )
    }

    /// Extract and validate configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| AnalysisError::Configuration(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server_host.is_empty() {
            return Err(AnalysisError::Configuration(
                "server_host cannot be empty".to_string(),
            ));
        }

        if self.server_port < 1024 {
            return Err(AnalysisError::Configuration(
                "server_port must be between 1024 and 65535".to_string(),
            ));
        }

        if !(self.min_clip_duration_secs > 0.0 && self.min_clip_duration_secs < 60.0) {
            return Err(AnalysisError::Configuration(
                "min_clip_duration_secs must be between 0 and 60 seconds".to_string(),
            ));
        }

        for (name, timeout) in [
            ("acquisition_timeout_secs", self.acquisition_timeout),
            ("decode_timeout_secs", self.decode_timeout),
        ] {
            if timeout.as_secs() == 0 || timeout.as_secs() > MAX_TIMEOUT_SECS {
                return Err(AnalysisError::Configuration(format!(
                    "{} must be between 1 and {} seconds",
                    name, MAX_TIMEOUT_SECS
                )));
            }
        }

        if self.max_download_bytes == 0 || self.max_upload_bytes == 0 {
            return Err(AnalysisError::Configuration(
                "byte limits must be positive".to_string(),
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(AnalysisError::Configuration(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        if let Some(path) = &self.profiles_path {
            validate_path(path, "profiles_path")?;
        }

        if let Some(endpoint) = &self.jaeger_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AnalysisError::Configuration(
                    "jaeger_endpoint must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Load the profile table named by `profiles_path`, or the built-in one.
    pub fn profile_table(&self) -> Result<ProfileTable> {
        match &self.profiles_path {
            Some(path) => {
                info!("Loading accent profiles from {}", path.display());
                ProfileTable::load(path)
            }
            None => Ok(ProfileTable::builtin()),
        }
    }

    /// Export configuration to TOML format
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::Configuration(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Export configuration to YAML format
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AnalysisError::Configuration(format!("Failed to serialize to YAML: {}", e)))
    }
}

/// Reject paths with traversal sequences, NUL bytes or control characters.
fn validate_path(path: &Path, field_name: &str) -> Result<()> {
    let path_str = path.to_string_lossy();

    if path_str.is_empty() {
        return Err(AnalysisError::Configuration(format!(
            "{} cannot be empty",
            field_name
        )));
    }

    if path_str.contains("../..") || path_str.contains("//") {
        return Err(AnalysisError::Configuration(format!(
            "{} contains potentially unsafe path components",
            field_name
        )));
    }

    if path_str.chars().any(|c| c == '\0' || (c.is_control() && c != '\t')) {
        return Err(AnalysisError::Configuration(format!(
            "{} contains invalid control characters",
            field_name
        )));
    }

    if path_str.len() > 4096 {
        return Err(AnalysisError::Configuration(format!(
            "{} is too long (max 4096 characters)",
            field_name
        )));
    }

    Ok(())
}
