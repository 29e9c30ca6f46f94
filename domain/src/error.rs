use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    #[error("engine run failed: {0}")]
    EngineRun(String),

    #[error("malformed chunk #{index}: start {start}s, end {end:?}s")]
    MalformedChunk {
        index: usize,
        start: f64,
        end: Option<f64>,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("streaming error: {0}")]
    Streaming(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal_error(message: &str) -> Self {
        DomainError::Internal(message.to_string())
    }

    pub fn external_service_error(service: &str, message: &str) -> Self {
        DomainError::EngineInit(format!("{service}: {message}"))
    }

    pub fn run_error(service: &str, message: &str) -> Self {
        DomainError::EngineRun(format!("{service}: {message}"))
    }
}
