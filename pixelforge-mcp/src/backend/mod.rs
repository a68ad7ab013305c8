//! Image backend adapter.
//!
//! [`ImageBackend`] is the one contract handlers talk to. Two bindings
//! implement it:
//!
//! - [`api::GeminiApiBackend`]: direct HTTP calls to the Gemini API
//! - [`cli::ImagenCliBackend`]: subprocess calls to the `imagen` executable
//!
//! Operations never return `Err`. Every failure, including timeouts and I/O
//! errors, is folded into a [`BackendResult`] with `success == false`.
//! The model is part of every job, so a backend instance holds no per-call
//! state and can serve concurrent calls.

pub mod api;
pub mod cli;


use async_trait::async_trait;
use pixelforge_mcp_common::config::{BackendKind, ImagenConfig};
use pixelforge_mcp_common::error::Error;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use api::GeminiApiBackend;
pub use cli::ImagenCliBackend;

/// Error text when a generate or edit call produced no image.
pub const NO_IMAGES_GENERATED: &str = "No images generated";

/// Error text when an analysis call produced no text.
pub const NO_ANALYSIS_GENERATED: &str = "No analysis generated";

/// Prompt used for analysis when the caller gives none.
pub const DEFAULT_ANALYSIS_PROMPT: &str =
    "Describe this image in detail, including objects, colors, composition, and mood.";

/// Decoded image bytes returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Raw image bytes
    pub data: Vec<u8>,
    /// MIME type of the image
    pub mime_type: String,
}

/// Normalized outcome of a backend call.
///
/// `error` is present exactly when `success` is false. The constructors are
/// the only way to build one, which keeps the two in agreement.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    success: bool,
    error: Option<String>,
    /// Human-readable output
    pub output: String,
    /// Images held in memory
    pub images: Vec<GeneratedImage>,
    /// Files written by the backend
    pub image_paths: Vec<PathBuf>,
    /// Backend-specific details
    pub data: Option<Map<String, Value>>,
}

impl BackendResult {
    /// A successful result with the given output text.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            output: output.into(),
            images: Vec::new(),
            image_paths: Vec::new(),
            data: None,
        }
    }

    /// A failed result carrying `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            output: String::new(),
            images: Vec::new(),
            image_paths: Vec::new(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_image(mut self, image: GeneratedImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_paths.push(path.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The error text, or the output for a successful result.
    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.output)
    }
}

impl From<Error> for BackendResult {
    fn from(err: Error) -> Self {
        BackendResult::failure(err.to_string())
    }
}

/// Text-to-image job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateJob {
    pub prompt: String,
    pub output_path: PathBuf,
    pub aspect_ratio: Option<String>,
    pub temperature: Option<f64>,
    pub model: String,
    pub safety_setting: Option<String>,
}

/// Image edit job. The input image is sent as a reference alongside the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct EditJob {
    pub prompt: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub temperature: Option<f64>,
    pub model: String,
}

/// Image analysis job. `prompt: None` means [`DEFAULT_ANALYSIS_PROMPT`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeJob {
    pub image_path: PathBuf,
    pub prompt: Option<String>,
    pub model: String,
}

/// A generative-image capability.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Binding name, for logs and server info.
    fn name(&self) -> &'static str;

    /// Generate an image from a prompt and write it to `job.output_path`.
    async fn generate(&self, job: &GenerateJob) -> BackendResult;

    /// Edit `job.input_path` and write the result to `job.output_path`.
    async fn edit(&self, job: &EditJob) -> BackendResult;

    /// Describe an image.
    async fn analyze(&self, job: &AnalyzeJob) -> BackendResult;

    /// Report the models this backend can use.
    async fn list_models(&self) -> BackendResult;
}

/// Build the binding selected by `imagen.backend`.
///
/// # Errors
/// Fails only for the CLI binding, when the executable is missing, broken,
/// or does not answer `--version` in time.
pub async fn from_config(config: &ImagenConfig) -> Result<Arc<dyn ImageBackend>, Error> {
    match config.backend {
        BackendKind::Api => Ok(Arc::new(GeminiApiBackend::new(
            config.api_base.clone(),
            config.api_key.clone(),
        ))),
        BackendKind::Cli => {
            let backend = ImagenCliBackend::new(
                config.cli_path.clone(),
                Duration::from_secs(config.cli_timeout_secs),
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Shorthand for building a details map.
pub(crate) fn details<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_has_no_error() {
        let result = BackendResult::success("done");
        assert!(result.is_success());
        assert_eq!(result.error(), None);
        assert_eq!(result.message(), "done");
    }

    #[test]
    fn failure_always_has_error() {
        let result = BackendResult::failure(NO_IMAGES_GENERATED);
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("No images generated"));
        assert_eq!(result.message(), "No images generated");
        assert!(result.image_paths.is_empty());
    }

    #[test]
    fn builders_accumulate() {
        let result = BackendResult::success("ok")
            .with_image_path("/tmp/a.png")
            .with_image(GeneratedImage {
                data: vec![1, 2, 3],
                mime_type: "image/png".to_string(),
            })
            .with_data(details([("model", json!("gemini-2.5-flash-image"))]));

        assert_eq!(result.image_paths, vec![PathBuf::from("/tmp/a.png")]);
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.data.unwrap()["model"], "gemini-2.5-flash-image");
    }

    #[test]
    fn errors_fold_into_failures() {
        let result: BackendResult = Error::timeout(5).into();
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("5 seconds"));
    }

    #[tokio::test]
    async fn api_binding_is_the_default() {
        let backend = from_config(&ImagenConfig::default()).await.unwrap();
        assert_eq!(backend.name(), "api");
    }

    #[tokio::test]
    async fn missing_cli_binary_is_fatal() {
        let config = ImagenConfig {
            backend: BackendKind::Cli,
            cli_path: "/nonexistent/imagen-cli-for-tests".to_string(),
            ..ImagenConfig::default()
        };
        let err = from_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("not found"));
    }
}
