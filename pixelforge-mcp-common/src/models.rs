//! Model catalog for the Gemini image models.
//!
//! This module provides static metadata for the image models the server knows
//! about. Model identifiers are still passed through to the backend as-is;
//! the catalog only describes models and backs `list_available_models`.

use serde::Serialize;

/// What a model is good at.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelCapabilities {
    /// Quality of text rendered inside images
    pub text_rendering: &'static str,
    /// Handling of multi-object scenes
    pub complex_scenes: &'static str,
    /// Image editing support
    pub editing: &'static str,
    /// Output resolutions
    pub resolution: &'static str,
    /// Reference image limit, if the model documents one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_inputs: Option<&'static str>,
    /// Whether the model runs a visible reasoning step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_process: Option<bool>,
}

/// Gemini image model definition.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImageModel {
    /// Full model identifier
    pub name: &'static str,
    /// Marketing name
    pub nickname: &'static str,
    /// Relative speed
    pub speed: &'static str,
    /// Relative output quality
    pub quality: &'static str,
    /// Whether this is the compiled-in default model
    pub default: bool,
    /// One-line description
    pub description: &'static str,
    /// Typical use cases
    pub best_for: &'static [&'static str],
    /// Capability ratings
    pub capabilities: ModelCapabilities,
}

/// Gemini 2.5 Flash Image
pub const GEMINI_2_5_FLASH_IMAGE: ImageModel = ImageModel {
    name: "gemini-2.5-flash-image",
    nickname: "Nano Banana",
    speed: "fast",
    quality: "good",
    default: true,
    description: "Optimized for speed and efficiency. Best for high-volume, low-latency tasks.",
    best_for: &[
        "Quick iterations and concept exploration",
        "High-volume batch generation",
        "Simple compositions and designs",
        "When speed matters more than perfection",
    ],
    capabilities: ModelCapabilities {
        text_rendering: "basic",
        complex_scenes: "moderate",
        editing: "basic",
        resolution: "1K",
        reference_inputs: None,
        thinking_process: None,
    },
};

/// Gemini 3 Pro Image (preview)
pub const GEMINI_3_PRO_IMAGE_PREVIEW: ImageModel = ImageModel {
    name: "gemini-3-pro-image-preview",
    nickname: "Gemini 3 Pro Image",
    speed: "moderate",
    quality: "excellent",
    default: false,
    description: "Latest reasoning-enhanced model with advanced composition capabilities.",
    best_for: &[
        "Photorealistic final outputs",
        "Complex multi-object scenes",
        "Legible text rendering in images",
        "Character consistency across images",
        "Multi-turn image editing workflows",
        "High-resolution outputs (2K/4K)",
    ],
    capabilities: ModelCapabilities {
        text_rendering: "excellent",
        complex_scenes: "excellent",
        editing: "advanced",
        resolution: "1K/2K/4K",
        reference_inputs: Some("up to 14 images"),
        thinking_process: Some(true),
    },
};

/// All known image models
pub const IMAGE_MODELS: &[ImageModel] = &[GEMINI_2_5_FLASH_IMAGE, GEMINI_3_PRO_IMAGE_PREVIEW];

/// Model selection advice returned alongside the catalog.
pub const MODEL_RECOMMENDATION: &str =
    "Use gemini-2.5-flash-image for speed, gemini-3-pro-image-preview for quality";
