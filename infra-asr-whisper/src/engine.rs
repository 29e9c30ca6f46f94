use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use scribe_domain::{
    AudioBuffer, BeamHypothesis, ChunkingParams, DecodeObserver, DomainError, InferenceEngine,
    ModelConfig, RawChunk, StreamingTokenizer, Task, TimestampRange, TokenId,
};

use crate::vocabulary::Vocabulary;
use crate::window::{plan_windows, Window};

const BEAM_SIZE: i32 = 5;

/// whisper.cpp model wrapped as a chunked, observable inference engine.
pub struct WhisperEngine {
    context: WhisperContext,
    model: ModelConfig,
    threads: usize,
    // Filled from decoded segments; whisper.cpp has no standalone detokenizer.
    vocabulary: Vocabulary,
}

impl WhisperEngine {
    pub fn from_file(path: &Path, model: ModelConfig, threads: usize) -> Result<Self, DomainError> {
        let path = path.to_str().ok_or_else(|| {
            DomainError::external_service_error("whisper", "model path is not valid UTF-8")
        })?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|err| {
                DomainError::external_service_error("whisper", &format!("failed to load model: {err}"))
            })?;
        Ok(Self {
            context,
            model,
            threads,
            vocabulary: Vocabulary::new(),
        })
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: BEAM_SIZE,
            patience: -1.0,
        });
        params.set_n_threads(self.threads as i32);
        let language = if self.model.multilingual {
            self.model.decode_language()
        } else {
            Some("en")
        };
        params.set_language(language);
        params.set_translate(self.model.multilingual && self.model.task == Task::Translate);
        params.set_no_timestamps(false);
        params.set_single_segment(false);
        params.set_print_realtime(false);
        params.set_print_progress(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);
        params
    }

    /// Decodes one window and forwards its owned segments to `observer`.
    /// Returns `false` once the observer asked to stop.
    fn decode_window(
        &self,
        state: &mut whisper_rs::WhisperState,
        samples: &[f32],
        window: &Window,
        observer: &mut dyn DecodeObserver,
    ) -> Result<bool, DomainError> {
        state
            .full(self.full_params(), &samples[window.offset..window.end()])
            .map_err(|err| DomainError::run_error("whisper", &format!("full decode failed: {err}")))?;

        for idx in 0..state.full_n_segments() {
            let Some(segment) = state.get_segment(idx) else {
                continue;
            };
            let relative_start = centiseconds(segment.start_timestamp());
            let relative_end = centiseconds(segment.end_timestamp());
            let start = window.offset_seconds() + relative_start;
            if !window.owns(start) {
                continue;
            }
            let end = (!window.truncates(relative_end)).then(|| window.offset_seconds() + relative_end);

            let mut pieces = Vec::new();
            for token_idx in 0..segment.n_tokens().max(0) {
                let Some(token) = segment.get_token(token_idx) else {
                    continue;
                };
                let Ok(bytes) = token.to_bytes() else {
                    continue;
                };
                if is_special(bytes) {
                    continue;
                }
                let Ok(id) = TokenId::try_from(token.token_data().id) else {
                    continue;
                };
                pieces.push((id, bytes.to_vec()));
            }
            let tokens: Vec<TokenId> = pieces.iter().map(|(id, _)| *id).collect();
            self.vocabulary.extend(pieces);

            // whisper.cpp only surfaces finished segments; replay their
            // token prefixes as the beam grows.
            for len in 1..=tokens.len() {
                observer.on_partial_beam(&BeamHypothesis {
                    output_token_ids: tokens[..len].to_vec(),
                });
            }
            let chunk = RawChunk {
                tokens,
                timestamp: TimestampRange::new(start, end),
            };
            if observer.on_chunk_finalized(chunk).is_break() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl StreamingTokenizer for WhisperEngine {
    fn decode(&self, token_ids: &[TokenId]) -> String {
        self.vocabulary.decode(token_ids)
    }
}

impl InferenceEngine for WhisperEngine {
    fn tokenizer(&self) -> &dyn StreamingTokenizer {
        self
    }

    fn run(
        &self,
        audio: &AudioBuffer,
        params: &ChunkingParams,
        observer: &mut dyn DecodeObserver,
    ) -> Result<(), DomainError> {
        let mut state = self.context.create_state().map_err(|err| {
            DomainError::run_error("whisper", &format!("failed to create state: {err}"))
        })?;
        let windows = plan_windows(audio.len(), params);
        tracing::debug!(
            windows = windows.len(),
            duration_seconds = audio.duration_seconds(),
            "decoding audio"
        );
        for window in &windows {
            if !self.decode_window(&mut state, audio.samples(), window, observer)? {
                tracing::debug!(offset = window.offset, "observer stopped decoding");
                break;
            }
        }
        Ok(())
    }
}

fn centiseconds(raw: i64) -> f64 {
    raw as f64 / 100.0
}

fn is_special(bytes: &[u8]) -> bool {
    (bytes.starts_with(b"[_") && bytes.ends_with(b"]")) || bytes.starts_with(b"<|")
}
