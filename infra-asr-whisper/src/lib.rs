mod download;
#[cfg(feature = "whisper-runtime")]
mod engine;
mod vocabulary;
mod window;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use scribe_domain::{DomainError, EngineLoader, InferenceEngine, ModelConfig, ProgressObserver};

pub use download::{ModelStore, DEFAULT_MODEL_BASE_URL};
#[cfg(feature = "whisper-runtime")]
pub use engine::WhisperEngine;
pub use vocabulary::Vocabulary;
pub use window::{plan_windows, Window};

#[derive(Debug, Clone)]
pub struct WhisperLoaderConfig {
    pub model_dir: PathBuf,
    pub model_base_url: String,
    pub threads: usize,
}

impl Default for WhisperLoaderConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            threads: 4,
        }
    }
}

/// Fetches the ggml file for a model and builds a whisper.cpp engine from it.
pub struct WhisperEngineLoader {
    store: ModelStore,
    threads: usize,
}

impl WhisperEngineLoader {
    pub fn new(config: WhisperLoaderConfig) -> Self {
        Self {
            store: ModelStore::new(config.model_dir, config.model_base_url),
            threads: config.threads.max(1),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    #[cfg(feature = "whisper-runtime")]
    async fn build(
        &self,
        path: PathBuf,
        model: &ModelConfig,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError> {
        let model = model.clone();
        let threads = self.threads;
        let engine = tokio::task::spawn_blocking(move || WhisperEngine::from_file(&path, model, threads))
            .await
            .map_err(|err| DomainError::external_service_error("whisper", &err.to_string()))??;
        Ok(Arc::new(engine))
    }
}

#[async_trait]
impl EngineLoader for WhisperEngineLoader {
    async fn load(
        &self,
        model: &ModelConfig,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError> {
        let model_name = model.resolved_model_name();

        #[cfg(not(feature = "whisper-runtime"))]
        {
            let _ = (progress, self.threads);
            tracing::warn!(model_name = %model_name, "whisper-runtime feature disabled");
            Err(DomainError::EngineInit(
                "compiled without whisper-runtime; rebuild with --features whisper-runtime"
                    .to_string(),
            ))
        }

        #[cfg(feature = "whisper-runtime")]
        {
            let path = self.store.ensure(&model_name, progress).await?;
            tracing::info!(
                model_name = %model_name,
                path = %path.display(),
                threads = self.threads,
                "loading whisper model"
            );
            self.build(path, model).await
        }
    }
}
