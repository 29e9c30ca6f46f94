use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use scribe_domain::{ChunkingParams, ModelConfig};

pub type AppConfig = ScribeConfig;

const CONFIG_PREFIX: &str = "SCRIBE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Override { key: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScribeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub chunking: ChunkingParams,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_model_base_url")]
    pub model_base_url: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_model")]
    pub default_model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_base_url: default_model_base_url(),
            threads: default_threads(),
            default_model: default_model(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// Loads the config named by `SCRIBE_CONFIG`, else `config/<RUN_ENV>.toml`.
///
/// A missing file yields the defaults. `SCRIBE_SERVER_HOST`, `SCRIBE_SERVER_PORT`
/// and `SCRIBE_LOGGING_LEVEL` override the file.
pub fn load_config() -> Result<ScribeConfig, ConfigError> {
    let path = env::var(format!("{CONFIG_PREFIX}_CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
            PathBuf::from("config").join(format!("{run_env}.toml"))
        });

    let mut config = if path.is_file() {
        load_config_from(&path)?
    } else {
        ScribeConfig::default()
    };
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<ScribeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(
    config: &mut ScribeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(host) = lookup(&format!("{CONFIG_PREFIX}_SERVER_HOST")) {
        config.server.host = host;
    }
    let port_key = format!("{CONFIG_PREFIX}_SERVER_PORT");
    if let Some(port) = lookup(&port_key) {
        config.server.port = port.parse().map_err(|_| ConfigError::Override {
            key: port_key,
            value: port,
        })?;
    }
    if let Some(level) = lookup(&format!("{CONFIG_PREFIX}_LOGGING_LEVEL")) {
        config.logging.level = level;
    }
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn setup_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(default_log_level()));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_model_base_url() -> String {
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_model() -> ModelConfig {
    ModelConfig::new("base")
}

fn default_max_message_bytes() -> usize {
    64 * 1024 * 1024
}
