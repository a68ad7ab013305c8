//! PixelForge MCP Common Library
//!
//! Configuration, error types, model metadata, tracing setup, and the MCP
//! server runner shared by the PixelForge image server.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod tracing;
pub mod transport;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod server_test;

pub use config::{BackendKind, Config, ConfigStore};
pub use error::{ConfigError, Error, Result};
pub use server::{McpServerBuilder, ServerError, shutdown_channel};
pub use transport::{Transport, TransportArgs, TransportMode};
