//! MCP tool server for Cloud Storage.
//!
//! This crate wires the pieces together:
//! - [`tools`]: the tool registry, argument validation and operation handlers
//! - [`dispatcher`]: tool lookup, validation and the result envelope
//! - [`server`]: the MCP methods (`initialize`, `tools/list`, `tools/call`, ...)
//! - [`transport`]: newline-delimited JSON-RPC over stdio
//! - [`config`]: file, environment and flag configuration
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gcs_mcp_core::InMemoryStorage;
//! use gcs_mcp_server::{Dispatcher, HandlerContext, McpServer, ToolRegistry, run_stdio};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = Dispatcher::new(
//!         ToolRegistry::build()?,
//!         HandlerContext::new(Arc::new(InMemoryStorage::new()), 10 * 1024 * 1024),
//!     );
//!     run_stdio(Arc::new(McpServer::new(dispatcher))).await
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod server;
pub mod tools;
pub mod transport;

pub use config::{BackendKind, ConfigError, LogConfig, ServerConfig};
pub use dispatcher::{Dispatcher, ToolRequest, ToolResult};
pub use server::{McpServer, ServerState};
pub use tools::{HandlerContext, RegistryError, ToolKind, ToolRegistry, ValidatedCall};
pub use transport::{run, run_stdio};
