use std::sync::Arc;

use anyhow::{anyhow, Error};
use scribe_application::EngineHandle;
use scribe_configuration::{AppConfig, ServerConfig};
use scribe_infra_asr_whisper::{WhisperEngineLoader, WhisperLoaderConfig};
use scribe_infra_streaming::{build_router, run_server, StreamingState};

pub async fn build_and_run(config: AppConfig, server_config: ServerConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run(server_config).await
}

pub struct Application {
    pub config: AppConfig,
    pub state: StreamingState,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        #[cfg(feature = "whisper-runtime")]
        tracing::info!("whisper runtime feature enabled");
        #[cfg(not(feature = "whisper-runtime"))]
        tracing::warn!(
            "service compiled without `whisper-runtime`; every transcription will fail at engine construction"
        );
        #[cfg(feature = "whisper-cuda")]
        tracing::info!("whisper backend: CUDA");
        #[cfg(feature = "whisper-vulkan")]
        tracing::info!("whisper backend: Vulkan");
        #[cfg(feature = "whisper-openblas")]
        tracing::info!("whisper backend: OpenBLAS");
        #[cfg(all(
            feature = "whisper-runtime",
            not(feature = "whisper-cuda"),
            not(feature = "whisper-vulkan"),
            not(feature = "whisper-openblas")
        ))]
        tracing::info!("whisper backend: CPU");

        let engine_config = &config.service.engine;
        config
            .service
            .chunking
            .check()
            .map_err(|err| anyhow!("invalid chunking configuration: {err}"))?;
        if engine_config.default_model.model_id.trim().is_empty() {
            return Err(anyhow!("service.engine.default_model.model_id cannot be empty"));
        }

        tracing::info!(
            model_dir = %engine_config.model_dir,
            default_model = %engine_config.default_model.resolved_model_name(),
            threads = engine_config.threads,
            chunk_length_seconds = config.service.chunking.chunk_length_seconds,
            stride_length_seconds = config.service.chunking.stride_length_seconds,
            "initializing transcription service"
        );

        let loader = WhisperEngineLoader::new(WhisperLoaderConfig {
            model_dir: engine_config.model_dir.clone().into(),
            model_base_url: engine_config.model_base_url.clone(),
            threads: engine_config.threads,
        });
        let state = StreamingState {
            engine: Arc::new(EngineHandle::new(Arc::new(loader))),
            default_model: engine_config.default_model.clone(),
            chunking: config.service.chunking,
            max_message_bytes: config.service.streaming.max_message_bytes,
        };

        Ok(Self { config, state })
    }

    pub async fn run(self, server_config: ServerConfig) -> Result<(), Error> {
        tracing::info!(
            host = %server_config.host,
            port = server_config.port,
            "starting transcription websocket server"
        );

        run_server(build_router(self.state), &server_config.address())
            .await
            .map_err(|err| anyhow!("server startup failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use scribe_domain::ChunkingParams;

    use super::*;

    #[tokio::test]
    async fn default_config_builds_a_lazy_engine() {
        let app = Application::new(AppConfig::default())
            .await
            .expect("app should initialize");

        assert!(!app.state.engine.is_initialized());
        assert_eq!(app.state.default_model.model_id, "base");
        assert_eq!(app.state.chunking, ChunkingParams::default());
        assert_eq!(
            app.state.max_message_bytes,
            app.config.service.streaming.max_message_bytes
        );
    }

    #[tokio::test]
    async fn invalid_chunking_is_rejected_at_startup() {
        let mut config = AppConfig::default();
        config.service.chunking.stride_length_seconds = 20.0;

        let err = match Application::new(config).await {
            Ok(_) => panic!("overlapping strides must be rejected"),
            Err(err) => err,
        };

        assert!(err.to_string().contains("invalid chunking configuration"));
    }
}
