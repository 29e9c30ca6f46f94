use std::sync::Arc;

use tokio::sync::OnceCell;

use scribe_domain::{
    DomainError, EngineLoader, InferenceEngine, ModelConfig, ProgressObserver, TranslationEngine,
    TranslationLoader,
};

/// Shared, lazily constructed inference engine.
///
/// The first successful `get_or_create` builds the engine; every later call
/// returns the same instance without reporting progress. A failed construction
/// leaves the handle empty so the next caller starts over.
pub struct EngineHandle {
    loader: Arc<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn InferenceEngine>>,
}

impl EngineHandle {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    pub async fn get_or_create(
        &self,
        model: &ModelConfig,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, DomainError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                tracing::info!(
                    model_id = %model.model_id,
                    model_name = %model.resolved_model_name(),
                    "constructing inference engine"
                );
                self.loader
                    .load(model, progress)
                    .await
                    .map_err(into_init_error)
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

pub struct TranslatorHandle {
    loader: Arc<dyn TranslationLoader>,
    translator: OnceCell<Arc<dyn TranslationEngine>>,
}

impl TranslatorHandle {
    pub fn new(loader: Arc<dyn TranslationLoader>) -> Self {
        Self {
            loader,
            translator: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.translator.initialized()
    }

    pub async fn get_or_create(
        &self,
        progress: ProgressObserver<'_>,
    ) -> Result<Arc<dyn TranslationEngine>, DomainError> {
        let translator = self
            .translator
            .get_or_try_init(|| async {
                tracing::info!("constructing translation engine");
                self.loader.load(progress).await.map_err(into_init_error)
            })
            .await?;
        Ok(Arc::clone(translator))
    }
}

fn into_init_error(error: DomainError) -> DomainError {
    match error {
        DomainError::EngineInit(_) => error,
        other => DomainError::EngineInit(other.to_string()),
    }
}
