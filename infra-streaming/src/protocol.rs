use scribe_application::TranscribeAudioRequest;
use scribe_domain::{ProcessedSegment, TranscriptionEvent};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub version: u32,
    #[serde(flatten)]
    pub message: ClientMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Transcribe(TranscribeAudioRequest),
    Cancel,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub version: u32,
    #[serde(flatten)]
    pub message: ServerMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Downloading {
        file: Option<String>,
        progress: f64,
        loaded: Option<u64>,
        total: Option<u64>,
    },
    Loading,
    PartialResult {
        text: String,
        start: u64,
    },
    Result {
        segments: Vec<ProcessedSegment>,
        is_done: bool,
        last_start: u64,
    },
    Done,
    Error {
        message: String,
    },
    Pong,
}

impl From<TranscriptionEvent> for ServerMessage {
    fn from(value: TranscriptionEvent) -> Self {
        match value {
            TranscriptionEvent::Downloading {
                file,
                progress,
                loaded,
                total,
            } => ServerMessage::Downloading {
                file,
                progress,
                loaded,
                total,
            },
            TranscriptionEvent::Loading => ServerMessage::Loading,
            TranscriptionEvent::PartialResult(partial) => ServerMessage::PartialResult {
                text: partial.text,
                start: partial.start,
            },
            TranscriptionEvent::Result {
                segments,
                is_done,
                last_start,
            } => ServerMessage::Result {
                segments,
                is_done,
                last_start,
            },
            TranscriptionEvent::Done => ServerMessage::Done,
            TranscriptionEvent::Error { message } => ServerMessage::Error { message },
        }
    }
}

impl ServerEnvelope {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }
}
