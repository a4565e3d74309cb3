//! MCP protocol layer: JSON-RPC methods in, responses out.

use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use gcs_mcp_types::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, LogLevel, LogMessage,
    ServerCapabilities, SetLogLevelParams, methods,
};

use crate::dispatcher::{Dispatcher, ToolRequest};

/// Usage hints sent to the client on `initialize`.
const INSTRUCTIONS: &str = "Tools for Cloud Storage buckets and objects. Object paths are \
relative to the bucket root; '.' and '..' segments are rejected. Large listings are paged: \
pass next_page_token back as page_token.";

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No `initialize` yet.
    Uninitialized,
    /// `initialize` answered, waiting for `notifications/initialized`.
    Initializing,
    /// Handshake complete.
    Ready,
}

/// MCP server for the storage tools.
pub struct McpServer {
    info: Implementation,
    capabilities: ServerCapabilities,
    dispatcher: Dispatcher,
    log_level: RwLock<LogLevel>,
    state: RwLock<ServerState>,
    client_info: RwLock<Option<Implementation>>,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            info: Implementation::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            capabilities: ServerCapabilities::default().with_tools().with_logging(),
            dispatcher,
            log_level: RwLock::new(LogLevel::Info),
            state: RwLock::new(ServerState::Uninitialized),
            client_info: RwLock::new(None),
        }
    }

    /// Get server info.
    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Largest object body the tools accept, in bytes.
    pub fn max_object_size(&self) -> u64 {
        self.dispatcher.max_object_size()
    }

    /// Get current state.
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Level requested through `logging/setLevel`.
    pub async fn log_level(&self) -> LogLevel {
        *self.log_level.read().await
    }

    /// Client identity from `initialize`, if it has happened.
    pub async fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().await.clone()
    }

    // ========================================================================
    // Request Handlers
    // ========================================================================

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method.escape_debug(), id = %request.id, "Handling request");

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.params).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_list_tools(),
            methods::TOOLS_CALL => self.handle_call_tool(request.params).await,
            methods::LOGGING_SET_LEVEL => self.handle_set_log_level(request.params).await,
            other => Err(JsonRpcError::method_not_found(&other.escape_debug().to_string())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    /// Handle a JSON-RPC notification.
    ///
    /// `notifications/cancelled` is consumed by the transport, which owns the
    /// in-flight request; here it is only acknowledged.
    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        debug!(method = %notification.method.escape_debug(), "Handling notification");

        match notification.method.as_str() {
            methods::INITIALIZED => {
                *self.state.write().await = ServerState::Ready;
                info!("Client handshake complete");
            }
            methods::CANCELLED => {
                debug!("Cancellation for a request that is no longer in flight");
            }
            _ => {
                warn!(method = %notification.method.escape_debug(), "Unknown notification");
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?
            .unwrap_or_default();

        {
            let mut state = self.state.write().await;
            if *state != ServerState::Uninitialized {
                return Err(JsonRpcError::invalid_request("Server already initialized"));
            }
            *state = ServerState::Initializing;
        }

        info!(
            client = %init_params.client_info.name.escape_debug(),
            version = %init_params.client_info.version.escape_debug(),
            protocol = %init_params.protocol_version.escape_debug(),
            "Client connected"
        );
        *self.client_info.write().await = Some(init_params.client_info);

        let result = InitializeResult {
            protocol_version: gcs_mcp_types::PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let result = ListToolsResult::new(self.dispatcher.tools());
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
        let call_params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;

        let request = ToolRequest::new(
            call_params.name,
            call_params.arguments.unwrap_or(Value::Null),
        );
        let result = self.dispatcher.dispatch(request).await.into_call_result();
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_set_log_level(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
        let level_params: SetLogLevelParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;

        *self.log_level.write().await = level_params.level;
        debug!(level = %level_params.level, "Log level changed");

        Ok(json!({}))
    }

    /// Build a `notifications/message` if `level` passes the client's filter.
    pub async fn log_notification(
        &self,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Option<JsonRpcNotification> {
        if level < self.log_level().await {
            return None;
        }
        let log_message = LogMessage::new(level, self.info.name.clone(), json!({ "message": message.into() }));
        let params = serde_json::to_value(log_message).ok()?;
        Some(JsonRpcNotification::new(methods::LOG_MESSAGE).with_params(params))
    }
}
