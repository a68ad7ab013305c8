//! PixelForge MCP server library.
//!
//! Image generation, editing, and analysis tools backed by Google Gemini,
//! reachable either over the HTTP API or through the `imagen` CLI.

pub mod backend;
pub mod handler;
pub mod output;
pub mod resources;
pub mod server;
pub mod validation;


pub use backend::{BackendResult, ImageBackend};
pub use handler::{
    AnalyzeImageParams, AnalyzeResponse, EditImageParams, GenerateImageParams, ImageHandler,
    ImageResponse, ModelsResponse, ServerInfoResponse,
};
pub use server::PixelForgeServer;
