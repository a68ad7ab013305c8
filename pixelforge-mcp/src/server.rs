//! MCP Server implementation for the image server.
//!
//! Exposes the `generate_image`, `edit_image`, `analyze_image`,
//! `list_available_models` and `get_server_info` tools, plus the
//! model catalog and aspect ratio resources.

use crate::handler::{AnalyzeImageParams, EditImageParams, GenerateImageParams, ImageHandler};
use crate::resources::{self, ASPECT_RATIOS_URI, MODELS_URI};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolResult, Content, ListResourcesResult, ReadResourceResult, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};

const GENERATE_IMAGE_DESCRIPTION: &str = "Generate an image from a text prompt using Google Gemini. \
    Choose the model per call: gemini-2.5-flash-image (default) is fast and suited to iterations; \
    gemini-3-pro-image-preview gives the highest quality, legible text in images, and 2K/4K output. \
    Returns the saved file path and size.";

const EDIT_IMAGE_DESCRIPTION: &str = "Edit an existing image with a text prompt describing the changes. \
    Returns the path of the edited copy.";

const ANALYZE_IMAGE_DESCRIPTION: &str = "Analyze an image and describe it in text. \
    Pass a custom prompt to ask a specific question.";

const LIST_MODELS_DESCRIPTION: &str = "List available Gemini image models with their capabilities \
    and guidance on when to use each.";

const SERVER_INFO_DESCRIPTION: &str = "Get server configuration, defaults, and model switching guidance.";

/// Empty argument object for tools that take no parameters.
#[derive(Debug, Default, serde::Deserialize, JsonSchema)]
pub struct NoParams {}

/// MCP Server for Gemini image generation.
#[derive(Clone)]
pub struct PixelForgeServer {
    handler: ImageHandler,
}

impl PixelForgeServer {
    pub fn new(handler: ImageHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &ImageHandler {
        &self.handler
    }

    /// Run one tool by name and return its response serialized as JSON.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<String, McpError> {
        info!(tool = %name, "Calling tool");
        match name {
            "generate_image" => {
                let params: GenerateImageParams = parse_arguments(arguments)?;
                to_json(&self.handler.generate_image(params).await)
            }
            "edit_image" => {
                let params: EditImageParams = parse_arguments(arguments)?;
                to_json(&self.handler.edit_image(params).await)
            }
            "analyze_image" => {
                let params: AnalyzeImageParams = parse_arguments(arguments)?;
                to_json(&self.handler.analyze_image(params).await)
            }
            "list_available_models" => to_json(&self.handler.list_models().await),
            "get_server_info" => to_json(&self.handler.server_info().await),
            _ => Err(McpError::invalid_params(format!("Unknown tool: {}", name), None)),
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<T, McpError> {
    let args = arguments.ok_or_else(|| McpError::invalid_params("Missing parameters", None))?;
    serde_json::from_value(serde_json::Value::Object(args))
        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {}", e), None))
}

fn to_json<T: Serialize>(response: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize response: {}", e), None))
}

fn input_schema<T: JsonSchema>() -> Arc<serde_json::Map<String, serde_json::Value>> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema).unwrap_or_default() {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

fn tool(
    name: &'static str,
    description: &'static str,
    schema: Arc<serde_json::Map<String, serde_json::Value>>,
) -> rmcp::model::Tool {
    rmcp::model::Tool {
        name: Cow::Borrowed(name),
        description: Some(Cow::Borrowed(description)),
        input_schema: schema,
        annotations: None,
        icons: None,
        meta: None,
        output_schema: None,
        title: None,
    }
}

fn json_resource(uri: &str, name: &str, description: &str) -> rmcp::model::Resource {
    rmcp::model::Resource {
        raw: rmcp::model::RawResource {
            uri: uri.to_string(),
            name: name.to_string(),
            title: None,
            description: Some(description.to_string()),
            mime_type: Some("application/json".to_string()),
            size: None,
            icons: None,
            meta: None,
        },
        annotations: None,
    }
}

/// Tools published by [`PixelForgeServer`].
pub fn tools() -> Vec<rmcp::model::Tool> {
    vec![
        tool(
            "generate_image",
            GENERATE_IMAGE_DESCRIPTION,
            input_schema::<GenerateImageParams>(),
        ),
        tool("edit_image", EDIT_IMAGE_DESCRIPTION, input_schema::<EditImageParams>()),
        tool(
            "analyze_image",
            ANALYZE_IMAGE_DESCRIPTION,
            input_schema::<AnalyzeImageParams>(),
        ),
        tool(
            "list_available_models",
            LIST_MODELS_DESCRIPTION,
            input_schema::<NoParams>(),
        ),
        tool("get_server_info", SERVER_INFO_DESCRIPTION, input_schema::<NoParams>()),
    ]
}

impl ServerHandler for PixelForgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Image generation server using Google Gemini. \
                 Use generate_image to create images from text prompts, edit_image to modify \
                 existing images, and analyze_image to describe them. \
                 The model can be switched on every generate_image call; \
                 call list_available_models for guidance."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(rmcp::model::ListToolsResult {
                tools: tools(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let text = self.dispatch(params.name.as_ref(), params.arguments).await?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
    }

    fn list_resources(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing resources");
            Ok(ListResourcesResult {
                resources: vec![
                    json_resource(
                        MODELS_URI,
                        "Available Image Models",
                        "Gemini image models with capabilities and selection guidance",
                    ),
                    json_resource(
                        ASPECT_RATIOS_URI,
                        "Supported Aspect Ratios",
                        "Aspect ratios accepted by generate_image",
                    ),
                ],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        params: rmcp::model::ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = &params.uri;
            debug!(uri = %uri, "Reading resource");

            let content = match uri.as_str() {
                MODELS_URI => resources::models_resource_json(),
                ASPECT_RATIOS_URI => resources::aspect_ratios_resource_json(),
                _ => {
                    return Err(McpError::resource_not_found(
                        format!("Unknown resource: {}", uri),
                        None,
                    ));
                }
            };

            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri.clone())],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AnalyzeJob, BackendResult, EditJob, GenerateJob, ImageBackend};
    use async_trait::async_trait;
    use pixelforge_mcp_common::config::{Config, ConfigStore};
    use serde_json::{Value, json};

    struct UnreachableBackend;

    #[async_trait]
    impl ImageBackend for UnreachableBackend {
        fn name(&self) -> &'static str {
            "unreachable"
        }
        async fn generate(&self, _job: &GenerateJob) -> BackendResult {
            BackendResult::failure("unreachable")
        }
        async fn edit(&self, _job: &EditJob) -> BackendResult {
            BackendResult::failure("unreachable")
        }
        async fn analyze(&self, _job: &AnalyzeJob) -> BackendResult {
            BackendResult::failure("unreachable")
        }
        async fn list_models(&self) -> BackendResult {
            BackendResult::failure("unreachable")
        }
    }

    fn test_server() -> PixelForgeServer {
        let store = ConfigStore::new(Config::default(), None);
        PixelForgeServer::new(ImageHandler::new(store, Arc::new(UnreachableBackend)))
    }

    fn args(value: Value) -> Option<serde_json::Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn test_server_info() {
        let info = test_server().get_info();
        assert!(info.instructions.unwrap().contains("generate_image"));
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn test_tools_published() {
        let names: Vec<String> = tools().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(
            names,
            [
                "generate_image",
                "edit_image",
                "analyze_image",
                "list_available_models",
                "get_server_info"
            ]
        );
    }

    #[test]
    fn test_generate_schema_requires_prompt_only() {
        let tools = tools();
        let schema = &tools[0].input_schema;
        assert_eq!(schema.get("required"), Some(&json!(["prompt"])));
        let properties = schema["properties"].as_object().unwrap();
        for field in ["output_filename", "aspect_ratio", "temperature", "model", "safety_setting"] {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let err = test_server().dispatch("upscale_image", None).await.unwrap_err();
        assert!(err.message.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_arguments() {
        let server = test_server();
        let err = server.dispatch("generate_image", None).await.unwrap_err();
        assert!(err.message.contains("Missing parameters"));

        let err = server
            .dispatch("generate_image", args(json!({ "prompt": 42 })))
            .await
            .unwrap_err();
        assert!(err.message.contains("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_a_tool_result() {
        let text = test_server()
            .dispatch("generate_image", args(json!({ "prompt": "   " })))
            .await
            .unwrap();
        let response: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(response["success"], false);
        assert_eq!(response["message"], "Invalid input: Prompt cannot be empty");
        assert!(response.get("image_path").is_none());
    }

    #[tokio::test]
    async fn test_parameterless_tools_ignore_arguments() {
        let server = test_server();
        let text = server.dispatch("get_server_info", None).await.unwrap();
        let info: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(info["imagen"]["default_model"], "gemini-2.5-flash-image");

        let text = server
            .dispatch("list_available_models", args(json!({})))
            .await
            .unwrap();
        let models: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(models["models"].as_array().unwrap().len(), 2);
    }
}
