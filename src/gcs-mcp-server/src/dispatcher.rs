//! Tool dispatch: lookup, validation, one handler call, result envelope.
//!
//! A request moves through `Received -> Validating -> (Rejected |
//! Dispatching) -> (Succeeded | Failed)`. Each transition happens once; there
//! are no retries here.

use gcs_mcp_core::ToolError;
use gcs_mcp_types::{CallToolResult, Tool};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::tools::{self, HandlerContext, ToolRegistry};

/// One tool invocation as the transport hands it over.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Ok(Value),
    Error(ToolError),
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The `{ok, value | error}` envelope.
    pub fn to_envelope(&self) -> Value {
        match self {
            Self::Ok(value) => json!({ "ok": true, "value": value }),
            Self::Error(err) => json!({
                "ok": false,
                "error": { "kind": err.kind, "message": err.message },
            }),
        }
    }

    /// Render as an MCP `tools/call` result.
    pub fn into_call_result(self) -> CallToolResult {
        let envelope = self.to_envelope();
        match self {
            Self::Ok(value) => {
                let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                CallToolResult::success(text, envelope)
            }
            Self::Error(err) => CallToolResult::failure(err.to_string(), envelope),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolResult {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => Self::Error(err),
        }
    }
}

/// Routes tool requests to their handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ToolRegistry,
    ctx: HandlerContext,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, ctx: HandlerContext) -> Self {
        Self { registry, ctx }
    }

    /// Tool definitions for `tools/list`.
    pub fn tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    pub fn max_object_size(&self) -> u64 {
        self.ctx.max_object_size
    }

    /// Resolve one request. Never fails; every error becomes a
    /// [`ToolResult::Error`].
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        let ToolRequest { name, arguments } = request;
        debug!(tool = %name.escape_debug(), "received");

        let Some(descriptor) = self.registry.lookup(&name) else {
            debug!(tool = %name.escape_debug(), kind = "unknown_tool", "rejected");
            return ToolResult::Error(ToolError::unknown_tool(&name));
        };

        debug!(tool = descriptor.kind.name(), "validating");
        let call = match tools::validate(descriptor, arguments) {
            Ok(call) => call,
            Err(err) => {
                debug!(tool = descriptor.kind.name(), reason = %err.message, "rejected");
                return ToolResult::Error(err);
            }
        };

        debug!(tool = descriptor.kind.name(), "dispatching");
        match tools::execute(call, &self.ctx).await {
            Ok(value) => {
                debug!(tool = descriptor.kind.name(), "succeeded");
                ToolResult::Ok(value)
            }
            Err(err) => {
                warn!(tool = descriptor.kind.name(), kind = %err.kind, "failed");
                ToolResult::Error(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_mcp_core::{ErrorKind, InMemoryStorage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            ToolRegistry::build().expect("registry"),
            HandlerContext::new(Arc::new(InMemoryStorage::new()), 1024),
        )
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = dispatcher()
            .dispatch(ToolRequest::new("format_disk", json!({})))
            .await;
        let ToolResult::Error(err) = result else {
            panic!("expected error");
        };
        assert_eq!(err.kind, ErrorKind::UnknownTool);
        assert_eq!(err.message, "no tool named \"format_disk\"");
    }

    #[tokio::test]
    async fn test_envelope_shapes() {
        let ok = ToolResult::Ok(json!({"buckets": []}));
        assert_eq!(
            ok.to_envelope(),
            json!({"ok": true, "value": {"buckets": []}})
        );

        let err = ToolResult::Error(ToolError::invalid_argument("bucket_name: bad"));
        assert_eq!(
            err.to_envelope(),
            json!({"ok": false, "error": {"kind": "invalid_argument", "message": "bucket_name: bad"}})
        );

        let call = err.into_call_result();
        assert!(call.is_error());
        assert_eq!(call.content[0].as_text(), Some("invalid_argument: bucket_name: bad"));
    }

    #[tokio::test]
    async fn test_list_buckets_succeeds_on_empty_store() {
        let result = dispatcher()
            .dispatch(ToolRequest::new("list_buckets", Value::Null))
            .await;
        assert_eq!(result, ToolResult::Ok(json!({"buckets": []})));
    }

    #[tokio::test]
    async fn test_validation_failure_is_invalid_argument() {
        let result = dispatcher()
            .dispatch(ToolRequest::new(
                "create_bucket",
                json!({"bucket_name": "192.168.1.1"}),
            ))
            .await;
        let ToolResult::Error(err) = result else {
            panic!("expected error");
        };
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(err.message.starts_with("bucket_name:"), "{}", err.message);
    }
}
