use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    AudioBuffer, BeamHypothesis, ChunkingParams, DomainError, LoadProgress, ModelConfig, RawChunk,
    StreamingTokenizer, TranslationRequest,
};

pub type ProgressObserver<'a> = &'a (dyn Fn(LoadProgress) + Send + Sync);

/// Receives the two callback streams of a chunked run.
pub trait DecodeObserver: Send {
    fn on_partial_beam(&mut self, hypothesis: &BeamHypothesis);

    /// Returning `Break` asks the engine to stop before the next chunk.
    fn on_chunk_finalized(&mut self, chunk: RawChunk) -> ControlFlow<()>;
}

pub trait InferenceEngine: Send + Sync {
    fn tokenizer(&self) -> &dyn StreamingTokenizer;

    /// Blocks until the whole buffer is decoded or the observer breaks.
    /// Chunks are reported in strictly increasing time order.
    fn run(
        &self,
        audio: &AudioBuffer,
        params: &ChunkingParams,
        observer: &mut dyn DecodeObserver,
    ) -> Result<(), DomainError>;
}

#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(
        &self,
        model: &ModelConfig,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError>;
}

pub trait TranslationEngine: Send + Sync {
    fn translate(
        &self,
        request: &TranslationRequest,
        on_update: &mut dyn FnMut(String),
    ) -> Result<String, DomainError>;
}

#[async_trait]
pub trait TranslationLoader: Send + Sync {
    async fn load(
        &self,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn TranslationEngine>, DomainError>;
}
