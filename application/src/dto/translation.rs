use serde::{Deserialize, Serialize};
use validator::Validate;

use scribe_domain::TranslationRequest;

use crate::ApplicationError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranslateTextRequest {
    #[validate(length(min = 1))]
    pub texts: Vec<String>,
    #[validate(length(min = 1, max = 16))]
    pub source_language: String,
    #[validate(length(min = 1, max = 16))]
    pub target_language: String,
}

impl TranslateTextRequest {
    pub fn into_request(self) -> Result<TranslationRequest, ApplicationError> {
        self.validate()?;
        Ok(TranslationRequest {
            texts: self.texts,
            source_language: self.source_language,
            target_language: self.target_language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(texts: &[&str], source_language: &str) -> TranslateTextRequest {
        TranslateTextRequest {
            texts: texts.iter().map(|text| text.to_string()).collect(),
            source_language: source_language.to_string(),
            target_language: "fr".to_string(),
        }
    }

    #[test]
    fn valid_request_carries_every_field() {
        let request = dto(&["hello", "world"], "en")
            .into_request()
            .expect("valid request");

        assert_eq!(request.texts, vec!["hello".to_string(), "world".to_string()]);
        assert_eq!(request.source_language, "en");
        assert_eq!(request.target_language, "fr");
    }

    #[test]
    fn empty_texts_are_rejected() {
        let err = dto(&[], "en").into_request().expect_err("no texts");
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[test]
    fn language_codes_are_bounded() {
        assert!(dto(&["hi"], "").into_request().is_err());
        assert!(dto(&["hi"], &"x".repeat(17)).into_request().is_err());
        assert!(dto(&["hi"], &"x".repeat(16)).into_request().is_ok());
    }

    #[test]
    fn deserializes_from_json() {
        let request: TranslateTextRequest = serde_json::from_str(
            r#"{"texts":["bonjour"],"source_language":"fr","target_language":"en"}"#,
        )
        .expect("deserializes");

        assert_eq!(request.texts.len(), 1);
        assert!(request.validate().is_ok());
    }
}
