use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use scribe_domain::{
    AudioBuffer, ChunkingParams, DomainError, LoadProgress, ModelConfig, RequestState,
    TranscriptionEvent, TranscriptionRequest,
};

use crate::worker::{self, drive, reject_pending};
use crate::{ApplicationError, EngineHandle, GenerationTracker};

#[derive(Debug, Clone)]
pub enum TranscriptionCommand {
    Transcribe(TranscriptionRequest),
    Cancel,
}

/// Host side of an orchestrator. Dropping it stops the worker once idle.
pub struct OrchestratorHandle {
    commands: UnboundedSender<TranscriptionCommand>,
    state: watch::Receiver<RequestState>,
    worker: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub fn submit(
        &self,
        audio: AudioBuffer,
        model_config: ModelConfig,
    ) -> Result<Uuid, ApplicationError> {
        self.submit_request(TranscriptionRequest::new(audio, model_config))
    }

    pub fn submit_request(&self, request: TranscriptionRequest) -> Result<Uuid, ApplicationError> {
        let id = request.id;
        self.send(TranscriptionCommand::Transcribe(request))?;
        Ok(id)
    }

    pub fn cancel(&self) -> Result<(), ApplicationError> {
        self.send(TranscriptionCommand::Cancel)
    }

    /// State of the request in flight, or of the last one.
    pub fn state(&self) -> RequestState {
        *self.state.borrow()
    }

    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(err) = self.worker.await {
            tracing::error!(error = %err, "orchestrator worker terminated abnormally");
        }
    }

    fn send(&self, command: TranscriptionCommand) -> Result<(), ApplicationError> {
        self.commands
            .send(command)
            .map_err(|_| ApplicationError::Internal("orchestrator worker has stopped".to_string()))
    }
}

pub struct TranscriptionOrchestrator {
    engine: Arc<EngineHandle>,
    default_chunking: ChunkingParams,
    events: UnboundedSender<TranscriptionEvent>,
    state: watch::Sender<RequestState>,
}

impl TranscriptionOrchestrator {
    /// Starts the worker task; must be called inside a tokio runtime.
    pub fn spawn(
        engine: Arc<EngineHandle>,
        default_chunking: ChunkingParams,
    ) -> (OrchestratorHandle, UnboundedReceiver<TranscriptionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RequestState::Idle);
        let orchestrator = Self {
            engine,
            default_chunking,
            events: event_tx,
            state: state_tx,
        };
        let worker = tokio::spawn(orchestrator.run(command_rx));
        (
            OrchestratorHandle {
                commands: command_tx,
                state: state_rx,
                worker,
            },
            event_rx,
        )
    }

    async fn run(mut self, mut commands: UnboundedReceiver<TranscriptionCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                TranscriptionCommand::Transcribe(request)
                    if self.current_state().accepts_submissions() =>
                {
                    let span = tracing::info_span!(
                        "transcription",
                        request_id = %request.id,
                        model_id = %request.model_config.model_id,
                        samples = request.audio.len(),
                    );
                    self.process(request, &mut commands).instrument(span).await;
                }
                TranscriptionCommand::Transcribe(request) => {
                    tracing::warn!(
                        request_id = %request.id,
                        state = ?self.current_state(),
                        "orchestrator busy; submission ignored"
                    );
                }
                TranscriptionCommand::Cancel => {
                    tracing::debug!("cancel received with no request in flight");
                }
            }
        }
        tracing::debug!("host disconnected; orchestrator stopping");
    }

    async fn process(
        &mut self,
        request: TranscriptionRequest,
        commands: &mut UnboundedReceiver<TranscriptionCommand>,
    ) {
        let cancel = CancellationToken::new();
        let outcome = self.execute(request, commands, &cancel).await;

        // Anything queued while this request was in flight was sent before the
        // host could observe the terminal event.
        reject_pending(commands, |command| on_busy(command, &cancel));

        match outcome {
            Ok(tracker) => {
                self.transition(RequestState::Done);
                tracker.send_final_result();
            }
            Err(err) => {
                tracing::error!(error = %err, "transcription request failed");
                self.transition(RequestState::Idle);
                self.emit(TranscriptionEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    async fn execute(
        &mut self,
        request: TranscriptionRequest,
        commands: &mut UnboundedReceiver<TranscriptionCommand>,
        cancel: &CancellationToken,
    ) -> Result<GenerationTracker, DomainError> {
        let params = request
            .chunking
            .unwrap_or_else(|| self.default_chunking.adjusted_for(&request.model_config));
        params.check()?;

        self.transition(RequestState::Loading);
        self.emit(TranscriptionEvent::Loading);

        let handle = Arc::clone(&self.engine);
        let progress_events = self.events.clone();
        let progress_state = self.state.clone();
        let progress = move |progress: LoadProgress| {
            tracing::trace!(
                stage = ?progress.stage,
                file = progress.file.as_deref().unwrap_or("-"),
                loaded = progress.loaded,
                total = progress.total,
                "model load progress"
            );
            worker::mark_downloading(&progress_state);
            worker::emit(&progress_events, TranscriptionEvent::from(progress));
        };
        let engine = drive(
            handle.get_or_create(&request.model_config, &progress),
            commands,
            |command| on_busy(command, cancel),
        )
        .await?;

        let tracker = GenerationTracker::new(
            Arc::clone(&engine),
            params,
            self.events.clone(),
            cancel.clone(),
        );
        if cancel.is_cancelled() {
            tracing::info!("request cancelled before decoding started");
            return Ok(tracker);
        }

        self.transition(RequestState::Running);
        let audio = request.audio;
        let decode = tokio::task::spawn_blocking(move || {
            let mut tracker = tracker;
            let result = engine.run(&audio, &params, &mut tracker);
            (tracker, result)
        });
        let (tracker, result) = drive(decode, commands, |command| on_busy(command, cancel))
            .await
            .map_err(|err| DomainError::run_error("decode worker", &err.to_string()))?;

        result.map_err(|err| match err {
            DomainError::EngineRun(_) => err,
            other => DomainError::EngineRun(other.to_string()),
        })?;
        Ok(tracker)
    }

    fn current_state(&self) -> RequestState {
        *self.state.borrow()
    }

    fn transition(&self, next: RequestState) {
        worker::transition(&self.state, next);
    }

    fn emit(&self, event: TranscriptionEvent) {
        worker::emit(&self.events, event);
    }
}

fn on_busy(command: TranscriptionCommand, cancel: &CancellationToken) {
    match command {
        TranscriptionCommand::Transcribe(request) => {
            tracing::warn!(
                request_id = %request.id,
                "transcription already in flight; submission ignored"
            );
        }
        TranscriptionCommand::Cancel => {
            if !cancel.is_cancelled() {
                tracing::info!("cancellation requested");
            }
            cancel.cancel();
        }
    }
}
