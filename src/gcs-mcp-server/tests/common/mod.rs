#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gcs_mcp_core::{
    BucketName, BucketSummary, CreateBucketRequest, Generation, InMemoryStorage,
    ListObjectsRequest, ObjectContent, ObjectIdentifier, ObjectPage, ObjectPrefix, ObjectSummary,
    ObjectVersion, StorageClient, StorageResult, WriteObjectRequest,
};
use gcs_mcp_server::{Dispatcher, HandlerContext, McpServer, ToolRegistry};

/// In-memory storage that counts calls and can be told to hang on
/// `list_buckets`.
#[derive(Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    calls: AtomicUsize,
    hang_on_list: bool,
    version_prefixes: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `list_buckets` never completes.
    pub fn hanging() -> Self {
        Self {
            hang_on_list: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prefixes passed to `list_object_versions`, in call order.
    pub fn version_prefixes(&self) -> Vec<String> {
        self.version_prefixes.lock().expect("lock").clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn list_buckets(&self) -> StorageResult<Vec<BucketSummary>> {
        self.hit();
        if self.hang_on_list {
            std::future::pending::<()>().await;
        }
        self.inner.list_buckets().await
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> StorageResult<BucketSummary> {
        self.hit();
        self.inner.create_bucket(request).await
    }

    async fn delete_bucket(&self, bucket: &BucketName, force: bool) -> StorageResult<()> {
        self.hit();
        self.inner.delete_bucket(bucket, force).await
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> StorageResult<ObjectPage> {
        self.hit();
        self.inner.list_objects(request).await
    }

    async fn read_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
        max_bytes: u64,
    ) -> StorageResult<ObjectContent> {
        self.hit();
        self.inner.read_object(object, generation, max_bytes).await
    }

    async fn write_object(&self, request: WriteObjectRequest) -> StorageResult<ObjectSummary> {
        self.hit();
        self.inner.write_object(request).await
    }

    async fn delete_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
    ) -> StorageResult<()> {
        self.hit();
        self.inner.delete_object(object, generation).await
    }

    async fn copy_object(
        &self,
        source: &ObjectIdentifier,
        destination: &ObjectIdentifier,
    ) -> StorageResult<ObjectSummary> {
        self.hit();
        self.inner.copy_object(source, destination).await
    }

    async fn list_object_versions(
        &self,
        bucket: &BucketName,
        prefix: &ObjectPrefix,
    ) -> StorageResult<Vec<ObjectVersion>> {
        self.hit();
        self.version_prefixes
            .lock()
            .expect("lock")
            .push(prefix.as_str().to_string());
        self.inner.list_object_versions(bucket, prefix).await
    }
}

pub const MAX_OBJECT_SIZE: u64 = 64 * 1024;

pub fn dispatcher(storage: Arc<RecordingStorage>) -> Dispatcher {
    Dispatcher::new(
        ToolRegistry::build().expect("registry"),
        HandlerContext::new(storage, MAX_OBJECT_SIZE),
    )
}

pub fn server(storage: Arc<RecordingStorage>) -> Arc<McpServer> {
    Arc::new(McpServer::new(dispatcher(storage)))
}
