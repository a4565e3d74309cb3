//! Model Context Protocol wire types used by the GCS tool server.
//!
//! Only the slice of MCP the server speaks lives here:
//! - JSON-RPC 2.0 envelopes and error codes
//! - `initialize` handshake and capability advertisement
//! - `tools/list` and `tools/call` payloads
//! - `logging/setLevel` and `notifications/cancelled`
//!
//! # Example
//! ```rust
//! use gcs_mcp_types::{PropertySchema, Tool, ToolInputSchema};
//!
//! let tool = Tool::new("read_object", "Read the contents of an object")
//!     .with_schema(
//!         ToolInputSchema::object()
//!             .property("bucket_name", PropertySchema::string())
//!             .required(["bucket_name"]),
//!     );
//! assert_eq!(tool.name, "read_object");
//! ```

// ============================================================================
// Module declarations
// ============================================================================

mod capabilities;
mod content;
mod initialization;
mod jsonrpc;
mod logging;
mod notifications;
mod tools;

/// MCP method name constants.
pub mod methods;

// ============================================================================
// Protocol Version
// ============================================================================

/// MCP protocol version spoken by the server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// Re-exports
// ============================================================================

pub use capabilities::{ClientCapabilities, LoggingCapability, ServerCapabilities, ToolsCapability};
pub use content::Content;
pub use initialization::{Implementation, InitializeParams, InitializeResult};
pub use jsonrpc::{
    ErrorCode, JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, MessageError, RequestId,
};
pub use logging::{LogLevel, LogMessage, SetLogLevelParams};
pub use notifications::CancelledNotification;
pub use tools::{
    CallToolParams, CallToolResult, ListToolsResult, PropertySchema, Tool, ToolInputSchema,
};
