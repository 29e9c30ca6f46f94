use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use scribe_domain::{
    BeamHypothesis, ChunkingParams, DecodeObserver, DomainError, InferenceEngine, MergedChunk,
    PartialResult, ProcessedSegment, RawChunk, TranscriptionEvent,
};

use crate::worker;

/// Rounds seconds to the nearest integer, halves away from zero (5.5 -> 6, 4.5 -> 5).
pub fn round_seconds(seconds: f64) -> u64 {
    seconds.round().max(0.0) as u64
}

/// Per-request accumulator between the engine callbacks and the host events.
pub struct GenerationTracker {
    engine: Arc<dyn InferenceEngine>,
    params: ChunkingParams,
    events: UnboundedSender<TranscriptionEvent>,
    cancel: CancellationToken,
    chunks: Vec<RawChunk>,
    segments: Vec<ProcessedSegment>,
    beam_updates: u64,
    malformed: Option<DomainError>,
}

impl GenerationTracker {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        params: ChunkingParams,
        events: UnboundedSender<TranscriptionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            params,
            events,
            cancel,
            chunks: Vec::new(),
            segments: Vec::new(),
            beam_updates: 0,
            malformed: None,
        }
    }

    pub fn segments(&self) -> &[ProcessedSegment] {
        &self.segments
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn beam_updates(&self) -> u64 {
        self.beam_updates
    }

    pub fn malformed(&self) -> Option<&DomainError> {
        self.malformed.as_ref()
    }

    /// Rebuilds the whole segment sequence from the accumulated chunks.
    pub fn derive_segments(&self) -> Vec<ProcessedSegment> {
        let (_, merged) = self.engine.tokenizer().decode_streaming(&self.chunks);
        merged
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| self.to_segment(index, chunk))
            .collect()
    }

    /// Emits the terminal `Done`. Consumes the tracker so nothing can follow it.
    pub fn send_final_result(self) {
        tracing::debug!(
            chunk_count = self.chunks.len(),
            segment_count = self.segments.len(),
            beam_updates = self.beam_updates,
            truncated = self.malformed.is_some(),
            "sending final result"
        );
        self.emit(TranscriptionEvent::Done);
    }

    fn to_segment(&self, index: usize, chunk: MergedChunk) -> ProcessedSegment {
        let raw_start = chunk.timestamp.start;
        let raw_end = chunk
            .timestamp
            .end
            .unwrap_or_else(|| self.params.end_fallback_seconds(raw_start));
        let start = round_seconds(raw_start);
        ProcessedSegment {
            index,
            text: chunk.text.trim().to_string(),
            start,
            end: round_seconds(raw_end).max(start),
        }
    }

    fn last_start(&self) -> u64 {
        self.segments.last().map_or(0, |segment| segment.start)
    }

    fn stopped(&self) -> bool {
        self.malformed.is_some() || self.cancel.is_cancelled()
    }

    fn emit(&self, event: TranscriptionEvent) {
        worker::emit(&self.events, event);
    }
}

impl DecodeObserver for GenerationTracker {
    fn on_partial_beam(&mut self, hypothesis: &BeamHypothesis) {
        if self.stopped() {
            return;
        }
        self.beam_updates += 1;
        let period = u64::from(self.params.partial_update_period.max(1));
        if self.beam_updates % period != 0 {
            return;
        }

        let text = self
            .engine
            .tokenizer()
            .decode(&hypothesis.output_token_ids)
            .trim()
            .to_string();
        self.emit(TranscriptionEvent::PartialResult(PartialResult {
            text,
            start: self.last_start(),
        }));
    }

    fn on_chunk_finalized(&mut self, chunk: RawChunk) -> ControlFlow<()> {
        if self.malformed.is_some() {
            return ControlFlow::Break(());
        }

        if !chunk.timestamp.is_consistent() {
            let error = DomainError::MalformedChunk {
                index: self.chunks.len(),
                start: chunk.timestamp.start,
                end: chunk.timestamp.end,
            };
            tracing::warn!(
                error = %error,
                kept_segments = self.segments.len(),
                "engine produced a malformed chunk; keeping what was decoded so far"
            );
            self.malformed = Some(error);
            return ControlFlow::Break(());
        }

        self.chunks.push(chunk);
        self.segments = self.derive_segments();
        tracing::trace!(
            chunk_count = self.chunks.len(),
            segment_count = self.segments.len(),
            "chunk finalized"
        );
        self.emit(TranscriptionEvent::Result {
            segments: self.segments.clone(),
            is_done: false,
            last_start: self.last_start(),
        });

        if self.cancel.is_cancelled() {
            tracing::info!(
                chunk_count = self.chunks.len(),
                "cancellation requested; stopping after this chunk"
            );
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}
