//! Audio source seam.
//!
//! The pipeline either receives audio bytes directly or asks an
//! [`AudioFetcher`] to produce them from a remote descriptor. Whatever goes
//! wrong while fetching is reported as `DownloadError`.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use crate::constants::server::MAX_DOWNLOAD_BYTES;
use crate::error::{AnalysisError, Result};

/// Video hosts the acquisition layer knows how to resolve.
pub const SUPPORTED_HOSTS: [&str; 6] = [
    "youtube.com",
    "youtu.be",
    "loom.com",
    "vimeo.com",
    "dailymotion.com",
    "streamable.com",
];

/// Where the audio for one request comes from.
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Audio bytes supplied by the caller.
    Bytes(Bytes),
    /// A remote source resolved through an [`AudioFetcher`].
    Remote(String),
}

impl AudioInput {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            AudioInput::Bytes(bytes) => format!("{} inline bytes", bytes.len()),
            AudioInput::Remote(url) => format!("remote {}", url),
        }
    }
}

/// Fetches an audio byte stream for a source descriptor, or fails.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Fetch the complete byte stream for `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Whether `url` points at one of the [`SUPPORTED_HOSTS`].
pub fn is_supported_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    SUPPORTED_HOSTS.iter().any(|host| lower.contains(host))
}

/// Plain HTTP(S) fetcher with a body size limit.
#[derive(Debug, Clone)]
pub struct HttpAudioFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl Default for HttpAudioFetcher {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: MAX_DOWNLOAD_BYTES,
        }
    }
}

impl HttpAudioFetcher {
    /// Create a fetcher with a body limit and a connect timeout.
    pub fn new(max_bytes: usize, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    fn parse_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| AnalysisError::Download(format!("invalid URL '{}': {}", url, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(AnalysisError::Download(format!(
                "unsupported URL scheme '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let url = Self::parse_url(url)?;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AnalysisError::Download(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Download(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(AnalysisError::Download(format!(
                    "response of {} bytes exceeds limit of {} bytes",
                    length, self.max_bytes
                )));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AnalysisError::Download(format!("body read failed: {}", e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(AnalysisError::Download(format!(
                    "response exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.freeze())
    }
}
