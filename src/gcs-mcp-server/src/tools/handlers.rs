//! Operation handlers. Each one makes exactly one storage call.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use gcs_mcp_core::{ObjectContent, StorageClient, ToolError};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::args::ValidatedCall;

/// What the handlers share: the storage collaborator and the size limit.
#[derive(Clone)]
pub struct HandlerContext {
    pub storage: Arc<dyn StorageClient>,
    /// Largest object body read or written, in bytes.
    pub max_object_size: u64,
}

impl HandlerContext {
    pub fn new(storage: Arc<dyn StorageClient>, max_object_size: u64) -> Self {
        Self {
            storage,
            max_object_size,
        }
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("max_object_size", &self.max_object_size)
            .finish_non_exhaustive()
    }
}

/// Run a validated call.
pub async fn execute(call: ValidatedCall, ctx: &HandlerContext) -> Result<Value, ToolError> {
    let storage = ctx.storage.as_ref();
    match call {
        ValidatedCall::ListBuckets => {
            let buckets = storage
                .list_buckets()
                .await
                .map_err(|e| ToolError::from_storage(e, "the project's buckets"))?;
            Ok(json!({ "buckets": buckets }))
        }
        ValidatedCall::CreateBucket(request) => {
            let target = format!("gs://{}", request.name);
            debug!(bucket = %request.name, location = %request.location, "creating bucket");
            let bucket = storage
                .create_bucket(&request)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            to_json(&bucket)
        }
        ValidatedCall::DeleteBucket { bucket, force } => {
            let target = format!("gs://{bucket}");
            debug!(bucket = %bucket, force, "deleting bucket");
            storage
                .delete_bucket(&bucket, force)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            Ok(json!({}))
        }
        ValidatedCall::GetBucketObjects(request) => {
            let target = format!("gs://{}", request.bucket);
            let page = storage
                .list_objects(&request)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            to_json(&page)
        }
        ValidatedCall::ReadObject { object, version } => {
            let target = object.to_string();
            let content = storage
                .read_object(&object, version, ctx.max_object_size)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            Ok(render_content(content))
        }
        ValidatedCall::UploadObject(request) => {
            let size = request.data.len() as u64;
            if size > ctx.max_object_size {
                return Err(ToolError::too_large(size, ctx.max_object_size));
            }
            let target = request.object.to_string();
            debug!(object = %target, size, "uploading object");
            let summary = storage
                .write_object(request)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            to_json(&summary)
        }
        ValidatedCall::DeleteObject { object, version } => {
            let target = match version {
                Some(generation) => format!("{object}#{}", generation.get()),
                None => object.to_string(),
            };
            storage
                .delete_object(&object, version)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            Ok(json!({}))
        }
        ValidatedCall::CopyObject {
            source,
            destination,
        } => {
            let target = format!("{source} (copy to {destination})");
            let summary = storage
                .copy_object(&source, &destination)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            to_json(&summary)
        }
        ValidatedCall::ListObjectVersions {
            bucket,
            prefix,
            object,
        } => {
            let target = format!("gs://{bucket}");
            let mut versions = storage
                .list_object_versions(&bucket, &prefix)
                .await
                .map_err(|e| ToolError::from_storage(e, &target))?;
            if let Some(object) = object {
                versions.retain(|v| v.name == object.as_str());
            }
            Ok(json!({ "versions": versions }))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::internal(format!("cannot encode result: {e}")))
}

/// UTF-8 bodies are returned as text, anything else as base64.
fn render_content(content: ObjectContent) -> Value {
    let (text, encoding) = match std::str::from_utf8(&content.data) {
        Ok(text) => (text.to_string(), "text"),
        Err(_) => (BASE64.encode(&content.data), "base64"),
    };
    json!({
        "content": text,
        "encoding": encoding,
        "content_type": content.content_type,
        "size": content.size,
        "generation": content.generation,
    })
}
