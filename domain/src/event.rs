use serde::{Deserialize, Serialize};

use crate::{LoadProgress, PartialResult, ProcessedSegment};

/// Orchestrator to host. `Result::segments` always carries the full sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranscriptionEvent {
    Downloading {
        file: Option<String>,
        progress: f64,
        loaded: Option<u64>,
        total: Option<u64>,
    },
    Loading,
    PartialResult(PartialResult),
    Result {
        segments: Vec<ProcessedSegment>,
        is_done: bool,
        last_start: u64,
    },
    Done,
    Error {
        message: String,
    },
}

impl TranscriptionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscriptionEvent::Done | TranscriptionEvent::Error { .. })
    }
}

impl From<LoadProgress> for TranscriptionEvent {
    fn from(value: LoadProgress) -> Self {
        TranscriptionEvent::Downloading {
            progress: value.percent(),
            file: value.file,
            loaded: value.loaded,
            total: value.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranslationEvent {
    Downloading {
        file: Option<String>,
        progress: f64,
        loaded: Option<u64>,
        total: Option<u64>,
    },
    Loading,
    Update {
        partial_text: String,
    },
    Complete {
        final_text: String,
    },
    Error {
        message: String,
    },
}

impl TranslationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranslationEvent::Complete { .. } | TranslationEvent::Error { .. }
        )
    }
}

impl From<LoadProgress> for TranslationEvent {
    fn from(value: LoadProgress) -> Self {
        TranslationEvent::Downloading {
            progress: value.percent(),
            file: value.file,
            loaded: value.loaded,
            total: value.total,
        }
    }
}
