//! Method names the server answers or listens for.

// Lifecycle
/// Initialize request.
pub const INITIALIZE: &str = "initialize";
/// Liveness check.
pub const PING: &str = "ping";

// Notifications
/// Client finished the handshake.
pub const INITIALIZED: &str = "notifications/initialized";
/// Client abandoned an in-flight request.
pub const CANCELLED: &str = "notifications/cancelled";
/// Server log message.
pub const LOG_MESSAGE: &str = "notifications/message";

// Tools
/// List tools.
pub const TOOLS_LIST: &str = "tools/list";
/// Invoke a tool.
pub const TOOLS_CALL: &str = "tools/call";

// Logging
/// Set the server log level.
pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
