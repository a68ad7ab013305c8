//! Gemini API binding.
//!
//! Calls `POST {api_base}/models/{model}:generateContent` with the API key in
//! the `x-goog-api-key` header. Images come back as base64 `inlineData` parts.

use super::{
    AnalyzeJob, BackendResult, DEFAULT_ANALYSIS_PROMPT, EditJob, GenerateJob, GeneratedImage,
    ImageBackend, NO_ANALYSIS_GENERATED, NO_IMAGES_GENERATED, details,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use pixelforge_mcp_common::config::API_KEY_ENV_VARS;
use pixelforge_mcp_common::error::Error;
use pixelforge_mcp_common::models::{IMAGE_MODELS, MODEL_RECOMMENDATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Harm categories covered by a safety preset.
const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Map a safety preset to a Gemini block threshold.
pub fn safety_threshold(preset: &str) -> Option<&'static str> {
    match preset {
        "preset:strict" => Some("BLOCK_LOW_AND_ABOVE"),
        "preset:relaxed" => Some("BLOCK_ONLY_HIGH"),
        "preset:none" => Some("BLOCK_NONE"),
        _ => None,
    }
}

/// MIME type for an image path, by extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Gemini API image backend.
#[derive(Debug, Clone)]
pub struct GeminiApiBackend {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiApiBackend {
    /// Create a backend for `api_base`, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base, api_key)
    }

    pub fn with_client(http: reqwest::Client, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Endpoint for `generateContent` on `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    fn api_key(&self) -> Result<&str, Error> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::backend(format!(
                    "API key not configured. Set one of {}",
                    API_KEY_ENV_VARS.join(", ")
                ))
            })
    }

    async fn call(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse, Error> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint(model);
        debug!(endpoint = %endpoint, "Calling Gemini API");

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::api(&endpoint, 0, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(&endpoint, status.as_u16(), body));
        }

        response.json().await.map_err(|e| {
            Error::api(&endpoint, status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    async fn inline_image(path: &Path) -> Result<GeminiPart, Error> {
        let bytes = tokio::fs::read(path).await?;
        Ok(GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: mime_type_for(path).to_string(),
                data: BASE64.encode(bytes),
            },
        })
    }

    async fn write_image(image: &GeneratedImage, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &image.data).await?;
        Ok(())
    }

    async fn try_generate(&self, job: &GenerateJob) -> Result<BackendResult, Error> {
        // Presets without a known threshold mapping are left to the API defaults.
        let safety_settings = match job.safety_setting.as_deref() {
            None => Vec::new(),
            Some(preset) => safety_settings(preset).unwrap_or_else(|| {
                debug!(preset = %preset, "No threshold mapping for safety setting, using API defaults");
                Vec::new()
            }),
        };

        let request = GeminiRequest {
            contents: vec![GeminiContent::user(vec![GeminiPart::Text {
                text: job.prompt.clone(),
            }])],
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                temperature: job.temperature,
                image_config: job.aspect_ratio.clone().map(|aspect_ratio| GeminiImageConfig { aspect_ratio }),
            },
            safety_settings,
        };

        let response = self.call(&job.model, &request).await?;
        let Some(image) = response.first_image()? else {
            return Ok(BackendResult::failure(NO_IMAGES_GENERATED));
        };

        Self::write_image(&image, &job.output_path).await?;
        info!(path = %job.output_path.display(), bytes = image.data.len(), "Saved generated image");

        Ok(
            BackendResult::success(format!("Image generated successfully at {}", job.output_path.display()))
                .with_image(image)
                .with_image_path(&job.output_path)
                .with_data(details([
                    ("model", json!(job.model)),
                    ("aspect_ratio", json!(job.aspect_ratio)),
                    ("temperature", json!(job.temperature)),
                ])),
        )
    }

    async fn try_edit(&self, job: &EditJob) -> Result<BackendResult, Error> {
        let request = GeminiRequest {
            contents: vec![GeminiContent::user(vec![
                Self::inline_image(&job.input_path).await?,
                GeminiPart::Text {
                    text: job.prompt.clone(),
                },
            ])],
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                temperature: job.temperature,
                image_config: None,
            },
            safety_settings: Vec::new(),
        };

        let response = self.call(&job.model, &request).await?;
        let Some(image) = response.first_image()? else {
            return Ok(BackendResult::failure(NO_IMAGES_GENERATED));
        };

        Self::write_image(&image, &job.output_path).await?;
        info!(path = %job.output_path.display(), bytes = image.data.len(), "Saved edited image");

        Ok(
            BackendResult::success(format!("Image edited successfully at {}", job.output_path.display()))
                .with_image(image)
                .with_image_path(&job.output_path)
                .with_data(details([
                    ("model", json!(job.model)),
                    ("temperature", json!(job.temperature)),
                ])),
        )
    }

    async fn try_analyze(&self, job: &AnalyzeJob) -> Result<BackendResult, Error> {
        let prompt = job.prompt.as_deref().unwrap_or(DEFAULT_ANALYSIS_PROMPT);
        let request = GeminiRequest {
            contents: vec![GeminiContent::user(vec![
                Self::inline_image(&job.image_path).await?,
                GeminiPart::Text {
                    text: prompt.to_string(),
                },
            ])],
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string()],
                temperature: None,
                image_config: None,
            },
            safety_settings: Vec::new(),
        };

        let response = self.call(&job.model, &request).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Ok(BackendResult::failure(NO_ANALYSIS_GENERATED));
        }

        let image_path = job.image_path.to_string_lossy().into_owned();
        Ok(BackendResult::success(text.clone()).with_data(details([
            ("analysis", json!(text)),
            ("image_path", json!(image_path)),
        ])))
    }
}

#[async_trait]
impl ImageBackend for GeminiApiBackend {
    fn name(&self) -> &'static str {
        "api"
    }

    #[instrument(level = "info", name = "api_generate", skip_all, fields(model = %job.model))]
    async fn generate(&self, job: &GenerateJob) -> BackendResult {
        self.try_generate(job).await.unwrap_or_else(|e| {
            warn!(error = %e, "Image generation failed");
            e.into()
        })
    }

    #[instrument(level = "info", name = "api_edit", skip_all, fields(model = %job.model))]
    async fn edit(&self, job: &EditJob) -> BackendResult {
        self.try_edit(job).await.unwrap_or_else(|e| {
            warn!(error = %e, "Image editing failed");
            e.into()
        })
    }

    #[instrument(level = "info", name = "api_analyze", skip_all, fields(model = %job.model))]
    async fn analyze(&self, job: &AnalyzeJob) -> BackendResult {
        self.try_analyze(job).await.unwrap_or_else(|e| {
            warn!(error = %e, "Image analysis failed");
            e.into()
        })
    }

    async fn list_models(&self) -> BackendResult {
        BackendResult::success(format!("Found {} available models", IMAGE_MODELS.len())).with_data(details([
            ("models", json!(IMAGE_MODELS)),
            ("recommendation", json!(MODEL_RECOMMENDATION)),
        ]))
    }
}

fn safety_settings(preset: &str) -> Option<Vec<GeminiSafetySetting>> {
    let threshold = safety_threshold(preset)?;
    Some(
        HARM_CATEGORIES
            .iter()
            .map(|category| GeminiSafetySetting {
                category: category.to_string(),
                threshold: threshold.to_string(),
            })
            .collect(),
    )
}

// =============================================================================
// Wire types
// =============================================================================

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<GeminiSafetySetting>,
}

#[derive(Debug, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }
}

/// Request part.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    /// Response modalities (TEXT, IMAGE)
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<GeminiImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiImageConfig {
    pub aspect_ratio: String,
}

#[derive(Debug, Serialize)]
pub struct GeminiSafetySetting {
    pub category: String,
    pub threshold: String,
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponseContent {
    #[serde(default)]
    pub parts: Vec<GeminiResponsePart>,
}

/// Response part. Parts this server does not use are kept as raw JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GeminiResponsePart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

/// Base64 inline data.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiResponsePart> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    /// Decode the first inline image, if any.
    pub fn first_image(&self) -> Result<Option<GeneratedImage>, Error> {
        let Some(inline) = self.parts().find_map(|part| match part {
            GeminiResponsePart::InlineData { inline_data } => Some(inline_data),
            _ => None,
        }) else {
            return Ok(None);
        };

        let data = BASE64
            .decode(&inline.data)
            .map_err(|e| Error::backend(format!("Invalid base64 image data: {}", e)))?;
        Ok(Some(GeneratedImage {
            data,
            mime_type: inline.mime_type.clone(),
        }))
    }

    /// All text parts, concatenated.
    pub fn text(&self) -> String {
        self.parts()
            .filter_map(|part| match part {
                GeminiResponsePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
