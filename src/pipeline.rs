//! Pipeline orchestrator.
//!
//! Sequences acquisition, normalisation, feature extraction, classification
//! and scoring for one request:
//!
//! `Acquiring → Normalizing → ExtractingFeatures → Classifying → Scoring → Done`
//!
//! Any stage may end the run in `Failed(kind)`. Errors are surfaced unchanged;
//! nothing is retried. Cancellation is observed between stages only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::audio::{AudioFetcher, AudioInput, AudioNormalizer, HttpAudioFetcher};
use crate::classify::{assess, classify, summarize, Assessment, Classification, ProfileTable, ScoreMap};
use crate::config::Config;
use crate::error::{with_timeout_and_convert, AnalysisError, Result};
use crate::features::{self, FeatureVector};
use crate::reliability::metrics;
use crate::reliability::tracing::span_utils;
use crate::types::{AccentClass, AudioClip, MaxDuration, SampleRate};

/// Stage of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Acquiring,
    Normalizing,
    ExtractingFeatures,
    Classifying,
    Scoring,
    Done,
    /// Terminal failure carrying the error kind.
    Failed(&'static str),
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Acquiring => "acquiring",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::ExtractingFeatures => "extracting_features",
            PipelineStage::Classifying => "classifying",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Done => "done",
            PipelineStage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed(_))
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Time spent in one completed stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub elapsed: Duration,
}

/// Request-scoped trace of stage transitions.
#[derive(Debug)]
pub struct PipelineRun {
    request_id: Uuid,
    started: Instant,
    stage: PipelineStage,
    stage_started: Instant,
    transitions: Vec<StageRecord>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            request_id: Uuid::new_v4(),
            started: now,
            stage: PipelineStage::Acquiring,
            stage_started: now,
            transitions: Vec::with_capacity(6),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Completed stages in the order they ran.
    pub fn transitions(&self) -> &[StageRecord] {
        &self.transitions
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close the current stage and enter `next`. No-op once terminal.
    pub fn advance(&mut self, next: PipelineStage) {
        if self.stage.is_terminal() {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.stage_started);
        metrics::record_stage_duration(self.stage.as_str(), elapsed);
        debug!(
            request_id = %self.request_id,
            "{} -> {} after {:.3}ms",
            self.stage,
            next,
            elapsed.as_secs_f64() * 1000.0
        );
        self.transitions.push(StageRecord {
            stage: self.stage,
            elapsed,
        });
        self.stage = next;
        self.stage_started = now;
    }

    /// Move to `Failed` with the kind of `error`.
    pub fn fail(&mut self, error: &AnalysisError) {
        self.advance(PipelineStage::Failed(error.kind()));
    }

    /// Fail with `Cancelled` if the token has fired.
    fn checkpoint(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            Err(AnalysisError::Cancelled(self.stage.as_str().to_string()))
        } else {
            Ok(())
        }
    }
}

/// Input to one classification.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub input: AudioInput,
    pub max_duration: MaxDuration,
    pub sample_rate: SampleRate,
}

impl ClassificationRequest {
    pub fn new(input: AudioInput) -> Self {
        Self {
            input,
            max_duration: MaxDuration::default(),
            sample_rate: SampleRate::default(),
        }
    }

    pub fn with_max_duration(mut self, max_duration: MaxDuration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn source(&self) -> &'static str {
        match self.input {
            AudioInput::Bytes(_) => "upload",
            AudioInput::Remote(_) => "url",
        }
    }
}

/// Immutable outcome of one successful classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: AccentClass,
    pub confidence: u8,
    pub proficiency: u8,
    pub scores: ScoreMap,
    pub features_summary: FeatureVector,
    pub summary: String,
}

impl ClassificationResult {
    fn assemble(
        classification: Classification,
        assessment: Assessment,
        features: FeatureVector,
    ) -> Self {
        let summary = summarize(classification.label, assessment.confidence, &features);
        Self {
            label: classification.label,
            confidence: assessment.confidence,
            proficiency: assessment.proficiency,
            scores: classification.scores,
            features_summary: features,
            summary,
        }
    }
}

/// Run extraction, classification and scoring on an already normalised clip.
pub fn analyze_clip(clip: &AudioClip, table: &ProfileTable) -> Result<ClassificationResult> {
    let features = features::extract(clip)?;
    let classification = classify(&features, table)?;
    let assessment = assess(&classification, &features);
    Ok(ClassificationResult::assemble(classification, assessment, features))
}

/// Contract for a classification pipeline.
#[async_trait]
pub trait AccentPipeline: Send + Sync {
    /// Classify one request, observing `cancel` between stages.
    async fn classify(
        &self,
        request: ClassificationRequest,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult>;

    /// The read-only profile table used for scoring.
    fn profiles(&self) -> &ProfileTable;
}

/// Default pipeline: fetch, normalise on the blocking pool, extract, score.
pub struct AnalysisPipeline {
    table: Arc<ProfileTable>,
    fetcher: Arc<dyn AudioFetcher>,
    normalizer: AudioNormalizer,
    acquisition_timeout: Duration,
    decode_timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(table: Arc<ProfileTable>, fetcher: Arc<dyn AudioFetcher>) -> Self {
        let defaults = Config::default();
        Self {
            table,
            fetcher,
            normalizer: AudioNormalizer::default(),
            acquisition_timeout: defaults.acquisition_timeout,
            decode_timeout: defaults.decode_timeout,
        }
    }

    /// Build the pipeline described by `config` with an HTTP fetcher.
    pub fn from_config(config: &Config, table: Arc<ProfileTable>) -> Result<Self> {
        let fetcher = HttpAudioFetcher::new(config.max_download_bytes, config.acquisition_timeout)?;
        Ok(Self::new(table, Arc::new(fetcher))
            .with_normalizer(AudioNormalizer::new(config.min_clip_duration_secs))
            .with_timeouts(config.acquisition_timeout, config.decode_timeout))
    }

    pub fn with_normalizer(mut self, normalizer: AudioNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_timeouts(mut self, acquisition: Duration, decode: Duration) -> Self {
        self.acquisition_timeout = acquisition;
        self.decode_timeout = decode;
        self
    }

    /// Run every stage, recording transitions in `run`.
    pub async fn run(
        &self,
        request: ClassificationRequest,
        cancel: &CancellationToken,
        run: &mut PipelineRun,
    ) -> Result<ClassificationResult> {
        let outcome = self.run_stages(request, cancel, run).await;
        match &outcome {
            Ok(_) => run.advance(PipelineStage::Done),
            Err(e) => run.fail(e),
        }
        outcome
    }

    async fn run_stages(
        &self,
        request: ClassificationRequest,
        cancel: &CancellationToken,
        run: &mut PipelineRun,
    ) -> Result<ClassificationResult> {
        run.checkpoint(cancel)?;
        let bytes = self.acquire(request.input).await?;

        run.checkpoint(cancel)?;
        run.advance(PipelineStage::Normalizing);
        let clip = self
            .normalize(bytes, request.sample_rate, request.max_duration)
            .await?;
        let span = tracing::Span::current();
        span_utils::add_audio_duration(&span, (clip.duration_secs() * 1000.0).round() as u64);
        metrics::record_audio_duration(clip.duration_secs());

        run.checkpoint(cancel)?;
        run.advance(PipelineStage::ExtractingFeatures);
        let features = tokio::task::spawn_blocking(move || features::extract(&clip))
            .await
            .map_err(|e| AnalysisError::Internal(format!("feature task failed: {}", e)))??;

        run.checkpoint(cancel)?;
        run.advance(PipelineStage::Classifying);
        let classification = classify(&features, &self.table)?;

        run.checkpoint(cancel)?;
        run.advance(PipelineStage::Scoring);
        let assessment = assess(&classification, &features);

        Ok(ClassificationResult::assemble(classification, assessment, features))
    }

    async fn acquire(&self, input: AudioInput) -> Result<bytes::Bytes> {
        match input {
            AudioInput::Bytes(bytes) => Ok(bytes),
            AudioInput::Remote(url) => {
                let timeout = self.acquisition_timeout;
                with_timeout_and_convert(self.fetcher.fetch(&url), timeout, |e| {
                    e.unwrap_or_else(|| {
                        AnalysisError::Download(format!(
                            "acquisition timed out after {}s",
                            timeout.as_secs_f64()
                        ))
                    })
                })
                .await
            }
        }
    }

    async fn normalize(
        &self,
        bytes: bytes::Bytes,
        rate: SampleRate,
        max: MaxDuration,
    ) -> Result<AudioClip> {
        let normalizer = self.normalizer.clone();
        let timeout = self.decode_timeout;
        with_timeout_and_convert(
            tokio::task::spawn_blocking(move || normalizer.normalize(bytes, rate, max)),
            timeout,
            |e| match e {
                Some(join) => AnalysisError::Internal(format!("decode task failed: {}", join)),
                None => AnalysisError::UnsupportedFormat(format!(
                    "decoding timed out after {}s",
                    timeout.as_secs_f64()
                )),
            },
        )
        .await?
    }
}

#[async_trait]
impl AccentPipeline for AnalysisPipeline {
    async fn classify(
        &self,
        request: ClassificationRequest,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult> {
        let mut run = PipelineRun::new();
        let span = crate::analysis_span!("analysis", source = request.source());
        span_utils::add_request_id(&span, &run.request_id());
        span_utils::add_sample_rate(&span, request.sample_rate.value());

        let _active = metrics::ActiveRequest::start(request.source());
        info!(
            parent: &span,
            "Classifying {} (max {} min, {})",
            request.input.describe(),
            request.max_duration.minutes(),
            request.sample_rate
        );

        let outcome = self
            .run(request, cancel, &mut run)
            .instrument(span.clone())
            .await;

        let elapsed = run.elapsed();
        span_utils::add_processing_time(&span, elapsed.as_millis() as u64);
        metrics::record_request_end(elapsed);
        match &outcome {
            Ok(result) => {
                span_utils::add_label(&span, result.label.as_str());
                metrics::record_label(result.label);
                info!(
                    parent: &span,
                    "Classified as {} (confidence {}, proficiency {}) in {:.1}ms",
                    result.label,
                    result.confidence,
                    result.proficiency,
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                metrics::record_request_failure(e);
                warn!(parent: &span, "Classification failed: {} [{}]", e, e.kind());
            }
        }
        outcome
    }

    fn profiles(&self) -> &ProfileTable {
        &self.table
    }
}
