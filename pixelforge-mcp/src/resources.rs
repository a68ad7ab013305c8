//! MCP Resources for the image server.
//!
//! - `pixelforge://models` - the image model catalog
//! - `pixelforge://aspect_ratios` - aspect ratios accepted by `generate_image`

use crate::validation::ASPECT_RATIOS;
use pixelforge_mcp_common::models::{IMAGE_MODELS, ImageModel, MODEL_RECOMMENDATION};
use serde::Serialize;

pub const MODELS_URI: &str = "pixelforge://models";
pub const ASPECT_RATIOS_URI: &str = "pixelforge://aspect_ratios";

/// Model catalog document.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCatalog {
    pub models: &'static [ImageModel],
    pub recommendation: &'static str,
}

/// One supported aspect ratio.
#[derive(Debug, Clone, Serialize)]
pub struct AspectRatioInfo {
    pub ratio: &'static str,
    /// Landscape, portrait, or square
    pub orientation: &'static str,
}

pub fn model_catalog() -> ModelCatalog {
    ModelCatalog {
        models: IMAGE_MODELS,
        recommendation: MODEL_RECOMMENDATION,
    }
}

pub fn list_aspect_ratios() -> Vec<AspectRatioInfo> {
    ASPECT_RATIOS
        .iter()
        .map(|&ratio| AspectRatioInfo {
            ratio,
            orientation: orientation(ratio),
        })
        .collect()
}

fn orientation(ratio: &str) -> &'static str {
    let parsed = ratio
        .split_once(':')
        .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)));
    match parsed {
        Some((w, h)) if w > h => "landscape",
        Some((w, h)) if w < h => "portrait",
        _ => "square",
    }
}

/// Get models resource as JSON string.
pub fn models_resource_json() -> String {
    serde_json::to_string_pretty(&model_catalog()).unwrap_or_else(|_| "{}".to_string())
}

/// Get aspect ratios resource as JSON string.
pub fn aspect_ratios_resource_json() -> String {
    serde_json::to_string_pretty(&list_aspect_ratios()).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_models_resource_json() {
        let json: Value = serde_json::from_str(&models_resource_json()).unwrap();
        let names: Vec<&str> = json["models"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["name"].as_str())
            .collect();
        assert_eq!(names, ["gemini-2.5-flash-image", "gemini-3-pro-image-preview"]);
        assert_eq!(json["recommendation"], MODEL_RECOMMENDATION);
    }

    #[test]
    fn test_aspect_ratios_cover_validation_set() {
        let ratios = list_aspect_ratios();
        assert_eq!(ratios.len(), ASPECT_RATIOS.len());
        assert!(ratios.iter().all(|r| ASPECT_RATIOS.contains(&r.ratio)));
    }

    #[test]
    fn test_orientation() {
        assert_eq!(orientation("1:1"), "square");
        assert_eq!(orientation("16:9"), "landscape");
        assert_eq!(orientation("21:9"), "landscape");
        assert_eq!(orientation("9:16"), "portrait");
        assert_eq!(orientation("2:3"), "portrait");
    }

    #[test]
    fn test_aspect_ratios_resource_json() {
        let json = aspect_ratios_resource_json();
        assert!(json.starts_with('['));
        assert!(json.contains("\"ratio\": \"4:5\""));
    }
}
