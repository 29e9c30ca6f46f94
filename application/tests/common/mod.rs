#![allow(dead_code)]

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scribe_domain::{
    AudioBuffer, BeamHypothesis, ChunkingParams, DecodeObserver, DomainError, EngineLoader,
    InferenceEngine, LoadProgress, ModelConfig, ProgressObserver, RawChunk, StreamingTokenizer,
    TimestampRange, TokenId, TranscriptionEvent,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

pub const WORDS: &[&str] = &["hello", "world", "one", "two", "three", "four", "five"];

pub fn ids(phrase: &str) -> Vec<TokenId> {
    phrase
        .split_whitespace()
        .map(|word| {
            WORDS
                .iter()
                .position(|known| *known == word)
                .expect("word in vocabulary") as TokenId
        })
        .collect()
}

pub fn chunk(phrase: &str, start: f64, end: Option<f64>) -> RawChunk {
    RawChunk {
        tokens: ids(phrase),
        timestamp: TimestampRange::new(start, end),
    }
}

pub fn audio() -> AudioBuffer {
    AudioBuffer::from(vec![0.0; 16_000])
}

pub fn model() -> ModelConfig {
    ModelConfig::new("base")
}

pub enum Step {
    Beam(&'static str),
    Chunk(RawChunk),
    /// Notifies the test and blocks until it releases the gate.
    Pause,
    Fail(&'static str),
}

pub struct ScriptedEngine {
    script: Vec<Step>,
    gate: Mutex<Option<std_mpsc::Receiver<()>>>,
    started: Option<UnboundedSender<()>>,
    pub runs: AtomicUsize,
    pub delivered_chunks: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            gate: Mutex::new(None),
            started: None,
            runs: AtomicUsize::new(0),
            delivered_chunks: AtomicUsize::new(0),
        }
    }

    pub fn gated(script: Vec<Step>) -> (Self, std_mpsc::Sender<()>, UnboundedReceiver<()>) {
        let (gate_tx, gate_rx) = std_mpsc::channel();
        let (started_tx, started_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut engine = Self::new(script);
        engine.gate = Mutex::new(Some(gate_rx));
        engine.started = Some(started_tx);
        (engine, gate_tx, started_rx)
    }
}

impl StreamingTokenizer for ScriptedEngine {
    fn decode(&self, token_ids: &[TokenId]) -> String {
        token_ids
            .iter()
            .filter_map(|id| WORDS.get(*id as usize))
            .map(|word| format!(" {word}"))
            .collect()
    }
}

impl InferenceEngine for ScriptedEngine {
    fn tokenizer(&self) -> &dyn StreamingTokenizer {
        self
    }

    fn run(
        &self,
        _audio: &AudioBuffer,
        _params: &ChunkingParams,
        observer: &mut dyn DecodeObserver,
    ) -> Result<(), DomainError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for step in &self.script {
            match step {
                Step::Beam(phrase) => observer.on_partial_beam(&BeamHypothesis {
                    output_token_ids: ids(phrase),
                }),
                Step::Chunk(chunk) => {
                    self.delivered_chunks.fetch_add(1, Ordering::SeqCst);
                    if let ControlFlow::Break(()) = observer.on_chunk_finalized(chunk.clone()) {
                        return Ok(());
                    }
                }
                Step::Pause => {
                    if let Some(started) = &self.started {
                        let _ = started.send(());
                    }
                    let gate = self.gate.lock().expect("gate lock");
                    if let Some(gate) = gate.as_ref() {
                        let _ = gate.recv();
                    }
                }
                Step::Fail(message) => return Err(DomainError::EngineRun(message.to_string())),
            }
        }
        Ok(())
    }
}

pub struct FakeLoader {
    engine: Arc<ScriptedEngine>,
    failures: usize,
    pub attempts: AtomicUsize,
}

impl FakeLoader {
    pub fn new(engine: Arc<ScriptedEngine>) -> Self {
        Self::failing(engine, 0)
    }

    pub fn failing(engine: Arc<ScriptedEngine>, failures: usize) -> Self {
        Self {
            engine,
            failures,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn load(
        &self,
        model: &ModelConfig,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let file = format!("ggml-{}.bin", model.resolved_model_name());
        progress(LoadProgress::downloading(file.clone()));
        if attempt < self.failures {
            return Err(DomainError::EngineInit("model fetch failed".to_string()));
        }
        progress(LoadProgress::progressing(file.clone(), 512, Some(1024)));
        progress(LoadProgress::progressing(file, 1024, Some(1024)));
        Ok(self.engine.clone())
    }
}

/// Signals once `load` is entered, then waits for the test to release it.
pub struct GatedLoader {
    engine: Arc<ScriptedEngine>,
    reports_download: bool,
    entered: UnboundedSender<()>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl GatedLoader {
    pub fn new(
        engine: Arc<ScriptedEngine>,
        reports_download: bool,
    ) -> (Self, oneshot::Sender<()>, UnboundedReceiver<()>) {
        let (gate_tx, gate_rx) = oneshot::channel();
        let (entered_tx, entered_rx) = tokio::sync::mpsc::unbounded_channel();
        let loader = Self {
            engine,
            reports_download,
            entered: entered_tx,
            gate: Mutex::new(Some(gate_rx)),
        };
        (loader, gate_tx, entered_rx)
    }
}

#[async_trait]
impl EngineLoader for GatedLoader {
    async fn load(
        &self,
        model: &ModelConfig,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError> {
        if self.reports_download {
            progress(LoadProgress::downloading(format!(
                "ggml-{}.bin",
                model.resolved_model_name()
            )));
        }
        let _ = self.entered.send(());
        let gate = self.gate.lock().expect("gate lock").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self.engine.clone())
    }
}

pub async fn next_request_events(
    events: &mut UnboundedReceiver<TranscriptionEvent>,
) -> Vec<TranscriptionEvent> {
    let mut collected = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            return collected;
        }
    }
}

pub fn is_loading_event(event: &TranscriptionEvent) -> bool {
    matches!(
        event,
        TranscriptionEvent::Loading | TranscriptionEvent::Downloading { .. }
    )
}

pub fn result_segment_counts(events: &[TranscriptionEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            TranscriptionEvent::Result { segments, .. } => Some(segments.len()),
            _ => None,
        })
        .collect()
}
