//! Configuration module for loading the YAML config file and environment overrides.
//!
//! Precedence, lowest to highest:
//!
//! 1. Compiled-in defaults
//! 2. `config/config.yaml` (or an explicit path), keys `imagen`, `storage`, `server`
//! 3. The API key from `GOOGLE_API_KEY`, `GOOGLE_GENERATIVE_AI_API_KEY`, or
//!    `GEMINI_API_KEY` (first non-empty wins)
//!
//! A loaded [`Config`] is never mutated. [`ConfigStore`] hands out snapshots
//! and replaces the whole record on reload.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conventional location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Environment variables checked for the API key, in priority order.
pub const API_KEY_ENV_VARS: &[&str] = &[
    "GOOGLE_API_KEY",
    "GOOGLE_GENERATIVE_AI_API_KEY",
    "GEMINI_API_KEY",
];

/// Default image generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default Gemini API base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Which backend binding serves tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct HTTP calls to the Gemini API.
    #[default]
    Api,
    /// Subprocess calls to the `imagen` command-line tool.
    Cli,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Api => write!(f, "api"),
            BackendKind::Cli => write!(f, "cli"),
        }
    }
}

/// Image backend settings and request defaults.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagenConfig {
    /// Google API key
    pub api_key: Option<String>,
    /// Model used when a call does not name one
    pub default_model: String,
    /// Aspect ratio used when a call does not name one
    pub default_aspect_ratio: String,
    /// Temperature used when a call does not give one
    pub default_temperature: f64,
    /// Safety filter preset used when a call does not give one
    pub safety_setting: String,
    /// Backend binding
    pub backend: BackendKind,
    /// Base URL for the Gemini API binding
    pub api_base: String,
    /// Executable for the CLI binding
    pub cli_path: String,
    /// Per-invocation timeout for the CLI binding, in seconds
    pub cli_timeout_secs: u64,
}

impl Default for ImagenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_aspect_ratio: "1:1".to_string(),
            default_temperature: 0.7,
            safety_setting: "preset:strict".to_string(),
            backend: BackendKind::Api,
            api_base: DEFAULT_API_BASE.to_string(),
            cli_path: "imagen".to_string(),
            cli_timeout_secs: 120,
        }
    }
}

// Keeps the key out of logs.
impl fmt::Debug for ImagenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagenConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_model", &self.default_model)
            .field("default_aspect_ratio", &self.default_aspect_ratio)
            .field("default_temperature", &self.default_temperature)
            .field("safety_setting", &self.safety_setting)
            .field("backend", &self.backend)
            .field("api_base", &self.api_base)
            .field("cli_path", &self.cli_path)
            .field("cli_timeout_secs", &self.cli_timeout_secs)
            .finish()
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for generated images
    pub output_dir: PathBuf,
    /// Enable S3 storage
    pub use_s3: bool,
    /// S3 bucket name
    pub s3_bucket: Option<String>,
    /// S3 key prefix
    pub s3_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./generated_images"),
            use_s3: false,
            s3_bucket: None,
            s3_prefix: String::new(),
        }
    }
}

/// MCP server identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gemini-imagen-mcp".to_string(),
            version: "0.1.4".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image backend settings
    pub imagen: ImagenConfig,
    /// Storage settings
    pub storage: StorageConfig,
    /// Server identity
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the given file (or [`DEFAULT_CONFIG_PATH`]),
    /// the `.env` file, and the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file exists but cannot be read or parsed,
    /// or if a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Load configuration using `env` to look up environment variables.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
            Self::from_yaml_str(&contents)
                .map_err(|e| ConfigError::parse(path.display().to_string(), e.to_string()))?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Some(api_key) = resolve_api_key(&env) {
            config.imagen.api_key = Some(api_key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text. Missing keys take their defaults.
    ///
    /// An empty document yields the default configuration.
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
    }

    /// Check value ranges that the type system does not cover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.imagen.default_temperature;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::invalid_value(
                "imagen.default_temperature",
                format!("Temperature must be between 0 and 1, got {t}"),
            ));
        }
        if self.imagen.cli_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "imagen.cli_timeout_secs",
                "timeout must be at least one second",
            ));
        }
        Ok(())
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let display = path.display().to_string();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(&display, e))?;
            }
        }

        let yaml = serde_yaml::to_string(self).map_err(|e| ConfigError::parse(&display, e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::io(&display, e))
    }
}

/// Return the first non-empty API key from [`API_KEY_ENV_VARS`].
pub fn resolve_api_key<F>(env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| env(name))
        .find(|value| !value.is_empty())
}

/// Shared, swappable configuration.
///
/// Every reader gets an `Arc<Config>` snapshot that stays valid for the whole
/// call. [`ConfigStore::reload`] builds a new record first and only then swaps
/// the pointer, so a failed reload leaves the current configuration in place.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<Config>>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Wrap an already-loaded configuration.
    ///
    /// `path` is the file [`ConfigStore::reload`] reads; `None` means
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            path,
        }
    }

    /// Load from disk and environment, then wrap.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Config::load(path.as_deref())?;
        Ok(Self::new(config, path))
    }

    /// Current configuration.
    pub async fn snapshot(&self) -> Arc<Config> {
        self.current.read().await.clone()
    }

    /// Replace the configuration wholesale.
    pub async fn replace(&self, config: Config) {
        *self.current.write().await = Arc::new(config);
    }

    /// Rebuild the configuration from disk and environment and swap it in.
    pub async fn reload(&self) -> Result<Arc<Config>, ConfigError> {
        let config = Arc::new(Config::load(self.path.as_deref())?);
        *self.current.write().await = config.clone();
        tracing::info!("Configuration reloaded");
        Ok(config)
    }
}
