use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use scribe_domain::{DomainError, LoadProgress, RequestState, TranslationEvent, TranslationRequest};

use crate::worker::{self, drive, reject_pending};
use crate::{ApplicationError, TranslatorHandle};

pub struct TranslationHandle {
    requests: UnboundedSender<TranslationRequest>,
    state: watch::Receiver<RequestState>,
    worker: JoinHandle<()>,
}

impl TranslationHandle {
    pub fn submit(&self, request: TranslationRequest) -> Result<(), ApplicationError> {
        self.requests
            .send(request)
            .map_err(|_| ApplicationError::Internal("translation worker has stopped".to_string()))
    }

    pub fn state(&self) -> RequestState {
        *self.state.borrow()
    }

    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(err) = self.worker.await {
            tracing::error!(error = %err, "translation worker terminated abnormally");
        }
    }
}

/// Single-pass counterpart of the transcription orchestrator.
pub struct TranslationWorker {
    translator: Arc<TranslatorHandle>,
    events: UnboundedSender<TranslationEvent>,
    state: watch::Sender<RequestState>,
}

impl TranslationWorker {
    pub fn spawn(
        translator: Arc<TranslatorHandle>,
    ) -> (TranslationHandle, UnboundedReceiver<TranslationEvent>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RequestState::Idle);
        let worker = Self {
            translator,
            events: event_tx,
            state: state_tx,
        };
        let worker = tokio::spawn(worker.run(request_rx));
        (
            TranslationHandle {
                requests: request_tx,
                state: state_rx,
                worker,
            },
            event_rx,
        )
    }

    async fn run(mut self, mut requests: UnboundedReceiver<TranslationRequest>) {
        while let Some(request) = requests.recv().await {
            let span = tracing::info_span!(
                "translation",
                source_language = %request.source_language,
                target_language = %request.target_language,
                texts = request.texts.len(),
            );
            async {
                tracing::debug!(state = ?*self.state.borrow(), "translation request received");
                let outcome = self.execute(request, &mut requests).await;
                reject_pending(&mut requests, ignore_busy);
                let event = match outcome {
                    Ok(final_text) => {
                        worker::transition(&self.state, RequestState::Done);
                        TranslationEvent::Complete { final_text }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "translation request failed");
                        worker::transition(&self.state, RequestState::Idle);
                        TranslationEvent::Error {
                            message: err.to_string(),
                        }
                    }
                };
                self.emit(event);
            }
            .instrument(span)
            .await;
        }
    }

    async fn execute(
        &mut self,
        request: TranslationRequest,
        requests: &mut UnboundedReceiver<TranslationRequest>,
    ) -> Result<String, DomainError> {
        if request.texts.is_empty() {
            return Err(DomainError::Validation(
                "at least one text is required".to_string(),
            ));
        }

        worker::transition(&self.state, RequestState::Loading);
        self.emit(TranslationEvent::Loading);

        let handle = Arc::clone(&self.translator);
        let progress_events = self.events.clone();
        let progress_state = self.state.clone();
        let progress = move |progress: LoadProgress| {
            worker::mark_downloading(&progress_state);
            worker::emit(&progress_events, TranslationEvent::from(progress));
        };
        let translator = drive(handle.get_or_create(&progress), requests, ignore_busy).await?;

        worker::transition(&self.state, RequestState::Running);
        let update_events = self.events.clone();
        let pass = tokio::task::spawn_blocking(move || {
            let mut on_update = |partial_text: String| {
                worker::emit(&update_events, TranslationEvent::Update { partial_text });
            };
            translator.translate(&request, &mut on_update)
        });
        drive(pass, requests, ignore_busy)
            .await
            .map_err(|err| DomainError::run_error("translation worker", &err.to_string()))?
            .map_err(|err| match err {
                DomainError::EngineRun(_) => err,
                other => DomainError::EngineRun(other.to_string()),
            })
    }

    fn emit(&self, event: TranslationEvent) {
        worker::emit(&self.events, event);
    }
}

fn ignore_busy(request: TranslationRequest) {
    tracing::warn!(
        texts = request.texts.len(),
        "translation already in flight; submission ignored"
    );
}
