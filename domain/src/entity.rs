use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::DomainError;

pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Share of the stride used to estimate an end timestamp the engine did not report.
pub const END_FALLBACK_STRIDE_RATIO: f64 = 0.9;

pub type TokenId = u32;

/// Mono 16 kHz samples. Clones share the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
}

impl AudioBuffer {
    pub fn new(samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / f64::from(SAMPLE_RATE_HZ)
    }
}

impl From<Vec<f32>> for AudioBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_overlap"))]
pub struct ChunkingParams {
    #[validate(range(exclusive_min = 0.0))]
    pub chunk_length_seconds: f32,
    #[validate(range(min = 0.0))]
    pub stride_length_seconds: f32,
    #[validate(range(min = 1))]
    pub partial_update_period: u32,
}

fn validate_overlap(params: &ChunkingParams) -> Result<(), ValidationError> {
    if 2.0 * params.stride_length_seconds >= params.chunk_length_seconds {
        return Err(ValidationError::new("stride_exceeds_chunk"));
    }
    Ok(())
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_length_seconds: 30.0,
            stride_length_seconds: 5.0,
            partial_update_period: 5,
        }
    }
}

impl ChunkingParams {
    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()
            .map_err(|err| DomainError::Validation(format!("invalid chunking params: {err}")))
    }

    /// Distilled checkpoints are trained on shorter windows.
    pub fn adjusted_for(&self, model: &ModelConfig) -> Self {
        if model.is_distilled() {
            Self {
                chunk_length_seconds: 20.0,
                stride_length_seconds: 3.0,
                ..*self
            }
        } else {
            *self
        }
    }

    pub fn end_fallback_seconds(&self, start: f64) -> f64 {
        start + END_FALLBACK_STRIDE_RATIO * f64::from(self.stride_length_seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_id: String,
    #[serde(default)]
    pub multilingual: bool,
    #[serde(default)]
    pub quantized: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub task: Task,
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            multilingual: false,
            quantized: false,
            language: None,
            task: Task::Transcribe,
        }
    }

    pub fn is_distilled(&self) -> bool {
        self.model_id
            .rsplit('/')
            .next()
            .is_some_and(|name| name.starts_with("distil"))
    }

    /// Engine-level model name, e.g. `base.en-q5_1`.
    pub fn resolved_model_name(&self) -> String {
        let mut name = self
            .model_id
            .rsplit('/')
            .next()
            .unwrap_or(&self.model_id)
            .trim_start_matches("whisper-")
            .to_string();
        let english_only_available = !name.starts_with("large") && !self.is_distilled();
        if !self.multilingual && english_only_available && !name.ends_with(".en") {
            name.push_str(".en");
        }
        if self.quantized {
            name.push_str("-q5_1");
        }
        name
    }

    /// Language passed to the decoder; English-only models never take one.
    pub fn decode_language(&self) -> Option<&str> {
        if !self.multilingual {
            return None;
        }
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty() && *lang != "auto")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamHypothesis {
    pub output_token_ids: Vec<TokenId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampRange {
    pub start: f64,
    pub end: Option<f64>,
}

impl TimestampRange {
    pub fn new(start: f64, end: Option<f64>) -> Self {
        Self { start, end }
    }

    pub fn is_consistent(&self) -> bool {
        self.start.is_finite()
            && self.start >= 0.0
            && self.end.map_or(true, |end| end.is_finite() && end >= self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChunk {
    pub tokens: Vec<TokenId>,
    pub timestamp: TimestampRange,
}

/// One entry of the merge output; timestamps are still unrounded seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedChunk {
    pub text: String,
    pub timestamp: TimestampRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedSegment {
    pub index: usize,
    pub text: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    pub text: String,
    pub start: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Loading,
    Downloading,
    Running,
    Done,
}

impl RequestState {
    pub fn accepts_submissions(self) -> bool {
        matches!(self, RequestState::Idle | RequestState::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Downloading,
    Progressing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub stage: LoadStage,
    pub file: Option<String>,
    pub loaded: Option<u64>,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn downloading(file: impl Into<String>) -> Self {
        Self {
            stage: LoadStage::Downloading,
            file: Some(file.into()),
            loaded: None,
            total: None,
        }
    }

    pub fn progressing(file: impl Into<String>, loaded: u64, total: Option<u64>) -> Self {
        Self {
            stage: LoadStage::Progressing,
            file: Some(file.into()),
            loaded: Some(loaded),
            total,
        }
    }

    pub fn percent(&self) -> f64 {
        match (self.loaded, self.total) {
            (Some(loaded), Some(total)) if total > 0 => {
                (loaded as f64 / total as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub id: Uuid,
    pub audio: AudioBuffer,
    pub model_config: ModelConfig,
    pub chunking: Option<ChunkingParams>,
}

impl TranscriptionRequest {
    pub fn new(audio: AudioBuffer, model_config: ModelConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            audio,
            model_config,
            chunking: None,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingParams) -> Self {
        self.chunking = Some(chunking);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub texts: Vec<String>,
    pub source_language: String,
    pub target_language: String,
}
