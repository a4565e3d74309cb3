//! The stable error vocabulary returned to tool callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::credentials::UntrustedConfig;
use crate::identifiers::IdentifierError;
use crate::storage::StorageError;

/// Error kinds surfaced to the calling agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTool,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    NotEmpty,
    PermissionDenied,
    QuotaExceeded,
    TooLarge,
    BackendUnavailable,
    Internal,
}

impl ErrorKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::NotEmpty => "not_empty",
            Self::PermissionDenied => "permission_denied",
            Self::QuotaExceeded => "quota_exceeded",
            Self::TooLarge => "too_large",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call: a kind plus a message safe to show the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The requested tool is not registered.
    pub fn unknown_tool(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownTool,
            format!("no tool named {}", quote_untrusted(name)),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn too_large(size: u64, limit: u64) -> Self {
        Self::new(
            ErrorKind::TooLarge,
            format!("content is {size} bytes; the limit is {limit} bytes"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Map a collaborator failure for the operation on `target`.
    ///
    /// `target` must be built from validated identifiers. Backend detail is
    /// logged here and dropped.
    pub fn from_storage(err: StorageError, target: &str) -> Self {
        match err {
            StorageError::NotFound(_) => {
                Self::new(ErrorKind::NotFound, format!("{target} does not exist"))
            }
            StorageError::AlreadyExists(_) => {
                Self::new(ErrorKind::AlreadyExists, format!("{target} already exists"))
            }
            StorageError::NotEmpty(_) => Self::new(
                ErrorKind::NotEmpty,
                format!("{target} is not empty; pass force=true to delete its contents"),
            ),
            StorageError::PermissionDenied { detail } => {
                warn!(target_name = %target, %detail, "backend denied permission");
                Self::new(
                    ErrorKind::PermissionDenied,
                    format!("permission denied for {target}"),
                )
            }
            StorageError::QuotaExceeded { detail } => {
                warn!(target_name = %target, %detail, "backend quota exceeded");
                Self::new(
                    ErrorKind::QuotaExceeded,
                    format!("quota exceeded while accessing {target}"),
                )
            }
            StorageError::TooLarge { limit: 0, .. } => Self::new(
                ErrorKind::TooLarge,
                format!("{target} exceeds the backend's size limit"),
            ),
            StorageError::TooLarge { size, limit } => Self::new(
                ErrorKind::TooLarge,
                format!("{target} is {size} bytes; the limit is {limit} bytes"),
            ),
            StorageError::InvalidArgument { detail } => {
                warn!(target_name = %target, %detail, "backend rejected request");
                Self::new(
                    ErrorKind::InvalidArgument,
                    format!("the storage backend rejected the request for {target}"),
                )
            }
            StorageError::Unavailable { detail } => {
                warn!(target_name = %target, %detail, "backend unavailable");
                Self::new(
                    ErrorKind::BackendUnavailable,
                    "the storage backend is unavailable; try again later",
                )
            }
            StorageError::Internal { detail } => {
                warn!(target_name = %target, %detail, "backend internal error");
                Self::internal("the storage backend returned an unexpected response")
            }
            StorageError::Misconfigured(what) => {
                warn!(target_name = %target, missing = what, "operation needs configuration");
                Self::internal(format!("the server is not configured with {what}"))
            }
        }
    }
}

impl From<IdentifierError> for ToolError {
    fn from(err: IdentifierError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

impl From<UntrustedConfig> for ToolError {
    fn from(err: UntrustedConfig) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

/// Render caller text for an error message: truncated and escaped so it
/// cannot inject control characters into logs or the reply.
pub fn quote_untrusted(input: &str) -> String {
    const MAX_CHARS: usize = 64;
    let mut quoted: String = input.chars().take(MAX_CHARS).flat_map(char::escape_debug).collect();
    if input.chars().nth(MAX_CHARS).is_some() {
        quoted.push_str("...");
    }
    format!("\"{quoted}\"")
}
