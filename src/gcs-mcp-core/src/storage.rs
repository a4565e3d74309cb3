//! The storage collaborator contract.
//!
//! Handlers only ever talk to a [`StorageClient`]. Every argument is an
//! already-validated identifier type, so an implementation never sees raw
//! caller input.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identifiers::{
    BucketName, ContentType, Delimiter, Generation, Location, ObjectIdentifier, ObjectPrefix,
    StorageClass,
};

/// Failures reported by a storage collaborator.
///
/// The `detail` fields carry backend text for logging. They are never shown
/// to the caller; see [`crate::ToolError::from_storage`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The named bucket or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A bucket or object with that name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The bucket still holds objects.
    #[error("bucket is not empty: {0}")]
    NotEmpty(String),

    /// Credentials lack the required permission.
    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },

    /// Rate or storage quota hit.
    #[error("quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    /// Object larger than the configured limit.
    #[error("object of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// The backend refused the request as malformed.
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// Network failure, timeout or 5xx.
    #[error("backend unavailable: {detail}")]
    Unavailable { detail: String },

    /// Anything else.
    #[error("internal error: {detail}")]
    Internal { detail: String },

    /// Operation needs configuration the server was started without.
    #[error("server is missing configuration: {0}")]
    Misconfigured(&'static str),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A bucket as reported by `list_buckets` / `create_bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub storage_class: Option<String>,
    pub versioning: bool,
}

/// Live object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub name: String,
    pub bucket: String,
    pub size: u64,
    pub updated: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub md5_hash: Option<String>,
    pub generation: Option<Generation>,
}

/// One generation of an object, live or non-current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectVersion {
    pub name: String,
    pub generation: Generation,
    pub updated: Option<DateTime<Utc>>,
    pub size: u64,
    pub md5_hash: Option<String>,
    pub is_live: bool,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    /// Common prefixes when a delimiter was given.
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Object bytes plus the metadata a reader needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectContent {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub size: u64,
    pub generation: Option<Generation>,
}

/// Arguments for [`StorageClient::create_bucket`].
#[derive(Debug, Clone)]
pub struct CreateBucketRequest {
    pub name: BucketName,
    pub location: Location,
    pub storage_class: StorageClass,
    pub versioning: bool,
}

/// Arguments for [`StorageClient::list_objects`].
#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    pub bucket: BucketName,
    pub prefix: ObjectPrefix,
    pub delimiter: Option<Delimiter>,
    pub max_results: u32,
    /// Opaque token from a previous page. Implementations must treat it as
    /// untrusted and reject anything they did not issue.
    pub page_token: Option<String>,
}

/// Arguments for [`StorageClient::write_object`].
#[derive(Debug, Clone)]
pub struct WriteObjectRequest {
    pub object: ObjectIdentifier,
    pub data: Bytes,
    pub content_type: ContentType,
}

/// Capability-typed storage interface.
///
/// Size limits are enforced by the caller for writes and by the implementation
/// for reads (`max_bytes`), so object content is never buffered past the
/// configured threshold.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Buckets visible to the configured project, sorted by name.
    async fn list_buckets(&self) -> StorageResult<Vec<BucketSummary>>;

    async fn create_bucket(&self, request: &CreateBucketRequest) -> StorageResult<BucketSummary>;

    /// Delete a bucket. With `force`, every object generation is removed
    /// first; without it a bucket holding any generation is `NotEmpty`.
    async fn delete_bucket(&self, bucket: &BucketName, force: bool) -> StorageResult<()>;

    async fn list_objects(&self, request: &ListObjectsRequest) -> StorageResult<ObjectPage>;

    /// Read an object, failing with `TooLarge` instead of buffering more
    /// than `max_bytes`.
    async fn read_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
        max_bytes: u64,
    ) -> StorageResult<ObjectContent>;

    async fn write_object(&self, request: WriteObjectRequest) -> StorageResult<ObjectSummary>;

    async fn delete_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
    ) -> StorageResult<()>;

    /// Copy the live source generation. A missing source leaves the
    /// destination untouched.
    async fn copy_object(
        &self,
        source: &ObjectIdentifier,
        destination: &ObjectIdentifier,
    ) -> StorageResult<ObjectSummary>;

    /// Every generation under `prefix`, sorted by (name, generation).
    async fn list_object_versions(
        &self,
        bucket: &BucketName,
        prefix: &ObjectPrefix,
    ) -> StorageResult<Vec<ObjectVersion>>;
}
