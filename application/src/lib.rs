pub mod dto;
pub mod engine_handle;
pub mod error;
pub mod orchestrator;
pub mod tracker;
pub mod translation;
mod worker;

pub use dto::*;
pub use engine_handle::{EngineHandle, TranslatorHandle};
pub use error::*;
pub use orchestrator::{OrchestratorHandle, TranscriptionCommand, TranscriptionOrchestrator};
pub use tracker::{round_seconds, GenerationTracker};
pub use translation::{TranslationHandle, TranslationWorker};
