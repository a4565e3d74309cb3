//! Validation boundary and storage contract for the GCS tool server.
//!
//! - [`identifiers`]: bucket, object path, prefix and delimiter validation.
//! - [`credentials`]: credential configuration validation.
//! - [`error`]: the error vocabulary returned to callers.
//! - [`storage`]: the collaborator trait the handlers call.
//! - [`memory`]: an in-process [`StorageClient`].

pub mod credentials;
pub mod error;
pub mod identifiers;
pub mod memory;
pub mod storage;

pub use credentials::{
    CredentialChoice, CredentialLoadError, CredentialPolicy, CredentialSource, ExternalAccount,
    RejectReason, ServiceAccountKey, SubjectTokenFormat, TrustedCredentialConfig, TrustedEndpoint,
    UntrustedConfig,
};
pub use error::{ErrorKind, ToolError};
pub use identifiers::{
    BucketName, ContentType, Delimiter, Generation, IdentifierError, Location, ObjectIdentifier,
    ObjectPath, ObjectPrefix, StorageClass,
};
pub use memory::InMemoryStorage;
pub use storage::{
    BucketSummary, CreateBucketRequest, ListObjectsRequest, ObjectContent, ObjectPage,
    ObjectSummary, ObjectVersion, StorageClient, StorageError, StorageResult, WriteObjectRequest,
};
