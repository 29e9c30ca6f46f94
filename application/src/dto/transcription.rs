use serde::{Deserialize, Serialize};
use validator::Validate;

use scribe_domain::{AudioBuffer, ChunkingParams, ModelConfig, TranscriptionRequest};

use crate::ApplicationError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranscribeAudioRequest {
    #[validate(length(min = 1))]
    pub samples: Vec<f32>,
    #[serde(default)]
    pub model_config: Option<ModelConfig>,
    #[serde(default)]
    #[validate(nested)]
    pub chunking: Option<ChunkingParams>,
}

impl TranscribeAudioRequest {
    pub fn into_request(
        self,
        default_model: &ModelConfig,
    ) -> Result<TranscriptionRequest, ApplicationError> {
        self.validate()?;
        if let Some(model) = &self.model_config {
            if model.model_id.trim().is_empty() {
                return Err(ApplicationError::Validation(
                    "model_id cannot be empty".to_string(),
                ));
            }
        }

        let model_config = self.model_config.unwrap_or_else(|| default_model.clone());
        let request = TranscriptionRequest::new(AudioBuffer::from(self.samples), model_config);
        Ok(match self.chunking {
            Some(chunking) => request.with_chunking(chunking),
            None => request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(samples: Vec<f32>) -> TranscribeAudioRequest {
        TranscribeAudioRequest {
            samples,
            model_config: None,
            chunking: None,
        }
    }

    #[test]
    fn empty_audio_is_rejected() {
        let err = dto(Vec::new())
            .into_request(&ModelConfig::new("base"))
            .expect_err("empty audio must fail");
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[test]
    fn default_model_fills_missing_config() {
        let request = dto(vec![0.0; 16])
            .into_request(&ModelConfig::new("tiny"))
            .expect("valid request");
        assert_eq!(request.model_config.model_id, "tiny");
        assert_eq!(request.audio.len(), 16);
        assert!(request.chunking.is_none());
    }

    #[test]
    fn nested_chunking_is_validated() {
        let mut request = dto(vec![0.0; 16]);
        request.chunking = Some(ChunkingParams {
            partial_update_period: 0,
            ..ChunkingParams::default()
        });
        assert!(request.into_request(&ModelConfig::new("tiny")).is_err());
    }

    #[test]
    fn partial_chunking_json_keeps_defaults() {
        let request: TranscribeAudioRequest = serde_json::from_str(
            r#"{"samples":[0.0,0.5],"chunking":{"stride_length_seconds":2.0}}"#,
        )
        .expect("deserializes");

        let chunking = request.chunking.expect("chunking");
        assert_eq!(chunking.stride_length_seconds, 2.0);
        assert_eq!(chunking.chunk_length_seconds, 30.0);
        assert!(request.model_config.is_none());
    }
}
