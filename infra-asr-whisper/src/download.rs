use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use scribe_domain::{DomainError, LoadProgress, ProgressObserver};

pub const DEFAULT_MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Progress is reported at most once per this many bytes, plus once at the end.
const PROGRESS_STEP_BYTES: u64 = 1 << 20;

/// Local cache of ggml model files, filled on demand from a remote base URL.
pub struct ModelStore {
    model_dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
}

impl ModelStore {
    pub fn new(model_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            model_dir: model_dir.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn file_name(model_name: &str) -> String {
        format!("ggml-{model_name}.bin")
    }

    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(Self::file_name(model_name))
    }

    /// Returns the cached model path, downloading the file first if needed.
    pub async fn ensure(
        &self,
        model_name: &str,
        progress: ProgressObserver<'_>,
    ) -> Result<PathBuf, DomainError> {
        let file = Self::file_name(model_name);
        let path = self.model_dir.join(&file);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "model already cached");
            return Ok(path);
        }

        progress(LoadProgress::downloading(file.clone()));
        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|err| io_error("create model directory", &self.model_dir, err))?;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), file);
        let partial = self.model_dir.join(format!("{file}.part"));
        tracing::info!(url = %url, path = %path.display(), "downloading model");

        if let Err(err) = self.fetch(&url, &file, &partial, progress).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(error = %cleanup, "no partial download to remove");
            }
            return Err(err);
        }
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|err| io_error("move downloaded model", &path, err))?;
        tracing::info!(path = %path.display(), "model downloaded");
        Ok(path)
    }

    async fn fetch(
        &self,
        url: &str,
        file: &str,
        partial: &Path,
        progress: ProgressObserver<'_>,
    ) -> Result<(), DomainError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| DomainError::external_service_error("model download", &err.to_string()))?;
        let total = response.content_length();

        let mut out = tokio::fs::File::create(partial)
            .await
            .map_err(|err| io_error("create partial download", partial, err))?;
        let mut loaded = 0u64;
        let mut reported = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| DomainError::external_service_error("model download", &err.to_string()))?
        {
            out.write_all(&chunk)
                .await
                .map_err(|err| io_error("write partial download", partial, err))?;
            loaded += chunk.len() as u64;
            if loaded - reported >= PROGRESS_STEP_BYTES {
                reported = loaded;
                progress(LoadProgress::progressing(file, loaded, total));
            }
        }
        out.flush()
            .await
            .map_err(|err| io_error("flush partial download", partial, err))?;

        if let Some(expected) = total {
            if loaded != expected {
                return Err(DomainError::external_service_error(
                    "model download",
                    &format!("received {loaded} of {expected} bytes"),
                ));
            }
        }
        if reported != loaded {
            progress(LoadProgress::progressing(file, loaded, total));
        }
        Ok(())
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> DomainError {
    DomainError::external_service_error(
        "model store",
        &format!("{action} {}: {err}", path.display()),
    )
}
