//! Request handlers for the image tools.
//!
//! Each handler validates its arguments, derives the output path, calls the
//! backend once, and shapes the [`BackendResult`] into a response record.
//! Handlers never return errors: validation failures, backend failures, and
//! unexpected errors all become `success: false` responses.

use crate::backend::{AnalyzeJob, BackendResult, EditJob, GenerateJob, ImageBackend};
use crate::output::{EDITED_PREFIX, GENERATED_PREFIX, ensure_output_dir, output_path};
use crate::validation::{
    AnalyzeInput, EditInput, GenerateInput, validate_analyze, validate_edit, validate_generate,
};
use pixelforge_mcp_common::config::{Config, ConfigStore};
use pixelforge_mcp_common::error::Error;
use pixelforge_mcp_common::models::{GEMINI_2_5_FLASH_IMAGE, GEMINI_3_PRO_IMAGE_PREVIEW, IMAGE_MODELS};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Note attached to a backend-reported model list.
pub const PER_REQUEST_MODEL_NOTE: &str =
    "Each model can be selected per-request using the 'model' parameter in generate_image()";

/// Note attached to the fallback model list.
pub const FALLBACK_MODELS_NOTE: &str = "Default models - model switching available on every request";

// =============================================================================
// Tool parameters
// =============================================================================

/// Arguments for `generate_image`. Absent optional values take the configured defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Text description of the image to generate
    pub prompt: String,
    /// Custom filename (letters, digits, `_`, `-`, `.`). Auto-generated when omitted;
    /// `.png` is appended when no image extension is given.
    #[serde(default)]
    pub output_filename: Option<String>,
    /// Image dimensions: 1:1, 2:3, 3:2, 3:4, 4:3, 4:5, 5:4, 9:16, 16:9, or 21:9 (default 1:1)
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Creativity level 0.0-1.0, higher is more creative (default 0.7)
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Model to use. "gemini-2.5-flash-image" (default) is fast and good for iterations;
    /// "gemini-3-pro-image-preview" gives the highest quality, legible text, and 2K/4K output.
    /// Models can be switched on every call.
    #[serde(default)]
    pub model: Option<String>,
    /// Content safety filter: preset:strict (default), preset:relaxed, preset:none, or custom
    #[serde(default)]
    pub safety_setting: Option<String>,
}

/// Arguments for `edit_image`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct EditImageParams {
    /// Description of the desired changes
    pub prompt: String,
    /// Path to the image to edit (png, jpg, jpeg, or webp)
    pub input_image_path: String,
    /// Custom filename for the edited image. Auto-generated when omitted.
    #[serde(default)]
    pub output_filename: Option<String>,
    /// Creativity level 0.0-1.0 (default 0.7)
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Arguments for `analyze_image`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct AnalyzeImageParams {
    /// Path to the image to analyze (png, jpg, jpeg, or webp)
    pub image_path: String,
    /// Custom analysis prompt. A general detailed description is requested when omitted.
    #[serde(default)]
    pub prompt: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Response of `generate_image` and `edit_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub success: bool,
    pub message: String,
    /// Absolute path, present only when the file exists after a successful call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size_bytes: Option<u64>,
    /// Backend-specific details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ImageResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            image_path: None,
            image_size_bytes: None,
            details: None,
        }
    }
}

/// Response of `analyze_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalyzeResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            analysis: None,
            image_path: None,
            message: Some(message),
        }
    }
}

/// Response of `list_available_models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub success: bool,
    pub models: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub note: String,
}

/// Response of `get_server_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfoResponse {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub imagen: ImagenSection,
    pub model_switching: ModelSwitching,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    pub output_directory: String,
    pub use_s3: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagenSection {
    pub default_model: String,
    pub default_aspect_ratio: String,
    pub default_temperature: f64,
}

/// How callers pick a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSwitching {
    pub enabled: bool,
    pub method: String,
    pub available_models: usize,
    pub guidance: String,
    pub quick_tips: QuickTips,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickTips {
    pub fast: String,
    pub quality: String,
    pub text_in_images: String,
    pub high_res: String,
}

impl ModelSwitching {
    fn per_request() -> Self {
        let fast = GEMINI_2_5_FLASH_IMAGE.name.to_string();
        let quality = GEMINI_3_PRO_IMAGE_PREVIEW.name.to_string();
        Self {
            enabled: true,
            method: "per_request_parameter".to_string(),
            available_models: IMAGE_MODELS.len(),
            guidance: "Models can be switched on every generate_image() call. Use 'model' parameter \
                       to override default. Call list_available_models() for detailed capabilities."
                .to_string(),
            quick_tips: QuickTips {
                fast,
                quality: quality.clone(),
                text_in_images: quality.clone(),
                high_res: quality,
            },
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Image tool handler.
///
/// Cheap to clone. Each call takes one configuration snapshot and uses it
/// throughout, so a concurrent reload never splits a call across two configs.
#[derive(Clone)]
pub struct ImageHandler {
    config: ConfigStore,
    backend: Arc<dyn ImageBackend>,
}

impl ImageHandler {
    pub fn new(config: ConfigStore, backend: Arc<dyn ImageBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Generate an image from a text prompt.
    #[instrument(level = "info", name = "generate_image", skip_all)]
    pub async fn generate_image(&self, params: GenerateImageParams) -> ImageResponse {
        self.try_generate_image(params)
            .await
            .unwrap_or_else(|e| ImageResponse::failure(failure_message(&e, "generating")))
    }

    async fn try_generate_image(&self, params: GenerateImageParams) -> Result<ImageResponse, Error> {
        let config = self.config.snapshot().await;
        let imagen = &config.imagen;

        let request = validate_generate(&GenerateInput {
            prompt: params.prompt,
            output_filename: params.output_filename,
            aspect_ratio: params
                .aspect_ratio
                .unwrap_or_else(|| imagen.default_aspect_ratio.clone()),
            temperature: params.temperature.unwrap_or(imagen.default_temperature),
            model: params.model,
            safety_setting: params
                .safety_setting
                .unwrap_or_else(|| imagen.safety_setting.clone()),
        })?;

        let output_dir = &config.storage.output_dir;
        let path = output_path(output_dir, request.output_filename.as_ref(), GENERATED_PREFIX);
        ensure_output_dir(output_dir).await?;

        let job = GenerateJob {
            prompt: request.prompt,
            output_path: path.clone(),
            aspect_ratio: Some(request.aspect_ratio),
            temperature: Some(request.temperature),
            model: resolve_model(request.model, &config),
            safety_setting: Some(request.safety_setting),
        };
        info!(model = %job.model, path = %path.display(), "Generating image");

        let result = self.backend.generate(&job).await;
        log_outcome(&result, "Image generated", &path);
        Ok(format_result(&result, &path).await)
    }

    /// Edit an existing image with a text prompt.
    #[instrument(level = "info", name = "edit_image", skip_all)]
    pub async fn edit_image(&self, params: EditImageParams) -> ImageResponse {
        self.try_edit_image(params)
            .await
            .unwrap_or_else(|e| ImageResponse::failure(failure_message(&e, "editing")))
    }

    async fn try_edit_image(&self, params: EditImageParams) -> Result<ImageResponse, Error> {
        let config = self.config.snapshot().await;

        let request = validate_edit(&EditInput {
            prompt: params.prompt,
            input_image_path: params.input_image_path,
            output_filename: params.output_filename,
            temperature: params.temperature.unwrap_or(config.imagen.default_temperature),
        })?;

        let output_dir = &config.storage.output_dir;
        let path = output_path(output_dir, request.output_filename.as_ref(), EDITED_PREFIX);
        ensure_output_dir(output_dir).await?;

        let job = EditJob {
            prompt: request.prompt,
            input_path: PathBuf::from(&request.input_image_path),
            output_path: path.clone(),
            temperature: Some(request.temperature),
            model: resolve_model(None, &config),
        };
        info!(input = %request.input_image_path, path = %path.display(), "Editing image");

        let result = self.backend.edit(&job).await;
        log_outcome(&result, "Image edited", &path);
        Ok(format_result(&result, &path).await)
    }

    /// Describe an image.
    #[instrument(level = "info", name = "analyze_image", skip_all)]
    pub async fn analyze_image(&self, params: AnalyzeImageParams) -> AnalyzeResponse {
        self.try_analyze_image(params)
            .await
            .unwrap_or_else(|e| AnalyzeResponse::failure(failure_message(&e, "analyzing")))
    }

    async fn try_analyze_image(&self, params: AnalyzeImageParams) -> Result<AnalyzeResponse, Error> {
        let config = self.config.snapshot().await;

        let request = validate_analyze(&AnalyzeInput {
            image_path: params.image_path,
            prompt: params.prompt,
        })?;

        let job = AnalyzeJob {
            image_path: PathBuf::from(&request.image_path),
            prompt: request.prompt,
            model: resolve_model(None, &config),
        };
        info!(image = %request.image_path, custom_prompt = job.prompt.is_some(), "Analyzing image");

        let result = self.backend.analyze(&job).await;
        let Some(data) = result.data.as_ref().filter(|_| result.is_success()) else {
            let message = result.error().unwrap_or("Analysis failed").to_string();
            error!(error = %message, "Image analysis failed");
            return Ok(AnalyzeResponse::failure(message));
        };

        let analysis = data
            .get("analysis")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| result.output.clone());

        Ok(AnalyzeResponse {
            success: true,
            analysis: Some(analysis),
            image_path: Some(request.image_path),
            message: None,
        })
    }

    /// List models with their capabilities, falling back to a basic list.
    #[instrument(level = "info", name = "list_models", skip_all)]
    pub async fn list_models(&self) -> ModelsResponse {
        let result = self.backend.list_models().await;

        let data = result
            .data
            .as_ref()
            .filter(|data| result.is_success() && !data.is_empty());

        match data {
            Some(data) => ModelsResponse {
                success: true,
                models: data
                    .get("models")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                recommendation: Some(
                    data.get("recommendation")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_default(),
                ),
                note: PER_REQUEST_MODEL_NOTE.to_string(),
            },
            None => {
                if let Some(err) = result.error() {
                    warn!(error = %err, "Backend model listing failed, using fallback list");
                }
                ModelsResponse {
                    success: true,
                    models: fallback_models(),
                    recommendation: None,
                    note: FALLBACK_MODELS_NOTE.to_string(),
                }
            }
        }
    }

    /// Report configuration and model switching guidance.
    pub async fn server_info(&self) -> ServerInfoResponse {
        let config = self.config.snapshot().await;

        ServerInfoResponse {
            server: ServerSection {
                name: config.server.name.clone(),
                version: config.server.version.clone(),
                log_level: config.server.log_level.clone(),
            },
            storage: StorageSection {
                output_directory: config.storage.output_dir.display().to_string(),
                use_s3: config.storage.use_s3,
            },
            imagen: ImagenSection {
                default_model: config.imagen.default_model.clone(),
                default_aspect_ratio: config.imagen.default_aspect_ratio.clone(),
                default_temperature: config.imagen.default_temperature,
            },
            model_switching: ModelSwitching::per_request(),
        }
    }

    /// Rebuild the configuration from disk and environment and swap it in.
    ///
    /// The backend keeps the credentials it was built with.
    pub async fn reload_config(&self) -> Result<(), Error> {
        self.config.reload().await?;
        Ok(())
    }
}

/// Caller-facing text for an error that escaped a handler.
fn failure_message(err: &Error, verb: &str) -> String {
    match err {
        Error::Validation(message) => {
            warn!(error = %message, "Validation error");
            format!("Invalid input: {}", message)
        }
        other => {
            error!(error = ?other, "Unexpected error while {} image", verb);
            format!("Error {} image: {}", verb, other)
        }
    }
}

/// The call's model, or the configured default. Empty means absent.
fn resolve_model(requested: Option<String>, config: &Config) -> String {
    requested
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| config.imagen.default_model.clone())
}

fn log_outcome(result: &BackendResult, what: &str, path: &Path) {
    if result.is_success() {
        info!(path = %path.display(), "{} successfully", what);
    } else {
        error!(error = %result.message(), "{} failed", what);
    }
}

/// Shape a generate/edit result.
///
/// The file is checked again here: path and size are reported only when the
/// backend succeeded and the file is actually on disk.
async fn format_result(result: &BackendResult, path: &Path) -> ImageResponse {
    let mut response = ImageResponse {
        success: result.is_success(),
        message: result.message().to_string(),
        image_path: None,
        image_size_bytes: None,
        details: result.data.clone().filter(|d| !d.is_empty()),
    };

    if result.is_success() {
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            response.image_path = Some(absolute.to_string_lossy().into_owned());
            response.image_size_bytes = Some(metadata.len());
        }
    }

    response
}

fn fallback_models() -> Vec<Value> {
    vec![
        json!({
            "name": GEMINI_2_5_FLASH_IMAGE.name,
            "description": "Fast model for iterations",
            "default": true,
        }),
        json!({
            "name": GEMINI_3_PRO_IMAGE_PREVIEW.name,
            "description": "High quality model for final outputs",
            "default": false,
        }),
    ]
}
