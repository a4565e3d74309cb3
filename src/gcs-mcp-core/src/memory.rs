//! In-process storage collaborator.
//!
//! Backs `--backend memory` and the test suites. Keeps the parts of the
//! backend's behaviour the tools can observe: generations, non-current
//! versions in versioned buckets, delimiter grouping and paging.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::identifiers::{BucketName, Generation, ObjectIdentifier, ObjectPrefix};
use crate::storage::{
    BucketSummary, CreateBucketRequest, ListObjectsRequest, ObjectContent, ObjectPage,
    ObjectSummary, ObjectVersion, StorageClient, StorageError, StorageResult, WriteObjectRequest,
};

#[derive(Debug, Clone)]
struct StoredVersion {
    generation: i64,
    data: Bytes,
    content_type: String,
    updated: DateTime<Utc>,
    md5_hash: String,
}

#[derive(Debug, Default)]
struct ObjectEntry {
    live: Option<StoredVersion>,
    noncurrent: Vec<StoredVersion>,
}

impl ObjectEntry {
    fn is_empty(&self) -> bool {
        self.live.is_none() && self.noncurrent.is_empty()
    }
}

#[derive(Debug)]
struct Bucket {
    summary: BucketSummary,
    objects: BTreeMap<String, ObjectEntry>,
}

#[derive(Debug, Default)]
struct State {
    last_generation: i64,
    buckets: BTreeMap<String, Bucket>,
}

impl State {
    fn bucket(&self, name: &BucketName) -> StorageResult<&Bucket> {
        self.buckets
            .get(name.as_str())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn bucket_mut(&mut self, name: &BucketName) -> StorageResult<&mut Bucket> {
        self.buckets
            .get_mut(name.as_str())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn next_generation(&mut self) -> i64 {
        self.last_generation += 1;
        self.last_generation
    }
}

/// Storage held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summarize(bucket: &str, name: &str, version: &StoredVersion) -> ObjectSummary {
    ObjectSummary {
        name: name.to_string(),
        bucket: bucket.to_string(),
        size: version.data.len() as u64,
        updated: Some(version.updated),
        content_type: Some(version.content_type.clone()),
        md5_hash: Some(version.md5_hash.clone()),
        generation: Some(Generation::new(version.generation)),
    }
}

fn store(bucket: &mut Bucket, name: &str, version: StoredVersion) {
    let versioning = bucket.summary.versioning;
    let entry = bucket.objects.entry(name.to_string()).or_default();
    match entry.live.replace(version) {
        Some(previous) if versioning => entry.noncurrent.push(previous),
        _ => {}
    }
}

/// A listing entry; objects sort before a prefix with the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Object(String),
    Prefix(String),
}

impl Cursor {
    fn key(&self) -> (&str, u8) {
        match self {
            Self::Object(key) => (key, 0),
            Self::Prefix(key) => (key, 1),
        }
    }

    fn encode(&self) -> String {
        let (key, tag) = self.key();
        let tag = if tag == 0 { 'o' } else { 'p' };
        URL_SAFE_NO_PAD.encode(format!("{tag}:{key}"))
    }

    fn decode(token: &str) -> StorageResult<Self> {
        let invalid = || StorageError::InvalidArgument {
            detail: "page_token was not issued by this server".to_string(),
        };
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let text = String::from_utf8(raw).map_err(|_| invalid())?;
        match text.split_once(':') {
            Some(("o", key)) => Ok(Self::Object(key.to_string())),
            Some(("p", key)) => Ok(Self::Prefix(key.to_string())),
            _ => Err(invalid()),
        }
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn list_buckets(&self) -> StorageResult<Vec<BucketSummary>> {
        let state = self.state.read().await;
        Ok(state.buckets.values().map(|b| b.summary.clone()).collect())
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> StorageResult<BucketSummary> {
        let mut state = self.state.write().await;
        if state.buckets.contains_key(request.name.as_str()) {
            return Err(StorageError::AlreadyExists(request.name.to_string()));
        }
        let summary = BucketSummary {
            name: request.name.to_string(),
            created: Some(Utc::now()),
            location: Some(request.location.to_string()),
            storage_class: Some(request.storage_class.to_string()),
            versioning: request.versioning,
        };
        state.buckets.insert(
            request.name.to_string(),
            Bucket {
                summary: summary.clone(),
                objects: BTreeMap::new(),
            },
        );
        debug!(bucket = %request.name, "created bucket");
        Ok(summary)
    }

    async fn delete_bucket(&self, bucket: &BucketName, force: bool) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let held = state.bucket(bucket)?.objects.len();
        if held > 0 && !force {
            return Err(StorageError::NotEmpty(bucket.to_string()));
        }
        state.buckets.remove(bucket.as_str());
        debug!(%bucket, removed_objects = held, "deleted bucket");
        Ok(())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> StorageResult<ObjectPage> {
        let resume = request
            .page_token
            .as_deref()
            .map(Cursor::decode)
            .transpose()?;
        let state = self.state.read().await;
        let bucket = state.bucket(&request.bucket)?;
        let prefix = request.prefix.as_str();

        let mut entries: Vec<(Cursor, Option<ObjectSummary>)> = Vec::new();
        for (name, entry) in bucket.objects.range(prefix.to_string()..) {
            let Some(rest) = name.strip_prefix(prefix) else {
                break;
            };
            let Some(live) = &entry.live else {
                continue;
            };
            let grouped = request
                .delimiter
                .as_ref()
                .and_then(|d| rest.find(d.as_str()).map(|at| at + d.as_str().len()));
            let cursor = match grouped {
                Some(end) => Cursor::Prefix(format!("{prefix}{}", &rest[..end])),
                None => Cursor::Object(name.clone()),
            };
            if resume.as_ref().is_some_and(|r| cursor.key() <= r.key()) {
                continue;
            }
            if entries.last().is_some_and(|(last, _)| *last == cursor) {
                continue;
            }
            let summary = matches!(cursor, Cursor::Object(_))
                .then(|| summarize(bucket.summary.name.as_str(), name, live));
            entries.push((cursor, summary));
        }

        let limit = request.max_results.max(1) as usize;
        let mut page = ObjectPage::default();
        let more = entries.len() > limit;
        entries.truncate(limit);
        if more {
            page.next_page_token = entries.last().map(|(cursor, _)| cursor.encode());
        }
        for (cursor, summary) in entries {
            match (cursor, summary) {
                (_, Some(summary)) => page.objects.push(summary),
                (Cursor::Prefix(prefix), None) => page.prefixes.push(prefix),
                (Cursor::Object(_), None) => {}
            }
        }
        Ok(page)
    }

    async fn read_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
        max_bytes: u64,
    ) -> StorageResult<ObjectContent> {
        let state = self.state.read().await;
        let bucket = state.bucket(&object.bucket)?;
        let not_found = || StorageError::NotFound(object.to_string());
        let entry = bucket.objects.get(object.name.as_str()).ok_or_else(not_found)?;
        let version = match generation {
            None => entry.live.as_ref(),
            Some(g) => entry
                .live
                .iter()
                .chain(entry.noncurrent.iter())
                .find(|v| v.generation == g.get()),
        }
        .ok_or_else(not_found)?;

        let size = version.data.len() as u64;
        if size > max_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        Ok(ObjectContent {
            data: version.data.clone(),
            content_type: Some(version.content_type.clone()),
            size,
            generation: Some(Generation::new(version.generation)),
        })
    }

    async fn write_object(&self, request: WriteObjectRequest) -> StorageResult<ObjectSummary> {
        let mut state = self.state.write().await;
        state.bucket(&request.object.bucket)?;
        let generation = state.next_generation();
        let version = StoredVersion {
            generation,
            md5_hash: STANDARD.encode(md5::compute(&request.data).0),
            data: request.data,
            content_type: request.content_type.to_string(),
            updated: Utc::now(),
        };
        let summary = summarize(
            request.object.bucket.as_str(),
            request.object.name.as_str(),
            &version,
        );
        let bucket = state.bucket_mut(&request.object.bucket)?;
        store(bucket, request.object.name.as_str(), version);
        debug!(object = %request.object, generation, "stored object");
        Ok(summary)
    }

    async fn delete_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let bucket = state.bucket_mut(&object.bucket)?;
        let versioning = bucket.summary.versioning;
        let not_found = || StorageError::NotFound(object.to_string());
        let entry = bucket
            .objects
            .get_mut(object.name.as_str())
            .ok_or_else(not_found)?;

        match generation {
            None => {
                let live = entry.live.take().ok_or_else(not_found)?;
                if versioning {
                    entry.noncurrent.push(live);
                }
            }
            Some(g) if entry.live.as_ref().is_some_and(|v| v.generation == g.get()) => {
                entry.live = None;
            }
            Some(g) => {
                let before = entry.noncurrent.len();
                entry.noncurrent.retain(|v| v.generation != g.get());
                if entry.noncurrent.len() == before {
                    return Err(not_found());
                }
            }
        }
        if entry.is_empty() {
            bucket.objects.remove(object.name.as_str());
        }
        Ok(())
    }

    async fn copy_object(
        &self,
        source: &ObjectIdentifier,
        destination: &ObjectIdentifier,
    ) -> StorageResult<ObjectSummary> {
        let mut state = self.state.write().await;
        let copied = state
            .bucket(&source.bucket)?
            .objects
            .get(source.name.as_str())
            .and_then(|entry| entry.live.clone())
            .ok_or_else(|| StorageError::NotFound(source.to_string()))?;
        state.bucket(&destination.bucket)?;

        let version = StoredVersion {
            generation: state.next_generation(),
            updated: Utc::now(),
            ..copied
        };
        let summary = summarize(
            destination.bucket.as_str(),
            destination.name.as_str(),
            &version,
        );
        store(
            state.bucket_mut(&destination.bucket)?,
            destination.name.as_str(),
            version,
        );
        Ok(summary)
    }

    async fn list_object_versions(
        &self,
        bucket: &BucketName,
        prefix: &ObjectPrefix,
    ) -> StorageResult<Vec<ObjectVersion>> {
        let state = self.state.read().await;
        let stored = state.bucket(bucket)?;
        let mut versions: Vec<ObjectVersion> = stored
            .objects
            .range(prefix.as_str().to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix.as_str()))
            .flat_map(|(name, entry)| {
                let live = entry.live.iter().map(|v| (v, true));
                let old = entry.noncurrent.iter().map(|v| (v, false));
                live.chain(old).map(move |(v, is_live)| ObjectVersion {
                    name: name.clone(),
                    generation: Generation::new(v.generation),
                    updated: Some(v.updated),
                    size: v.data.len() as u64,
                    md5_hash: Some(v.md5_hash.clone()),
                    is_live,
                })
            })
            .collect();
        versions.sort_by(|a, b| (&a.name, a.generation).cmp(&(&b.name, b.generation)));
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{ContentType, Delimiter, Location, StorageClass};
    use pretty_assertions::assert_eq;

    fn bucket(name: &str) -> BucketName {
        BucketName::parse(name).expect("bucket")
    }

    fn id(bucket: &str, name: &str) -> ObjectIdentifier {
        ObjectIdentifier::parse(bucket, name).expect("identifier")
    }

    async fn storage_with(buckets: &[(&str, bool)]) -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        for (name, versioning) in buckets {
            storage
                .create_bucket(&CreateBucketRequest {
                    name: bucket(name),
                    location: Location::parse("US").expect("location"),
                    storage_class: StorageClass::Standard,
                    versioning: *versioning,
                })
                .await
                .expect("create bucket");
        }
        storage
    }

    async fn put(storage: &InMemoryStorage, bucket: &str, name: &str, body: &str) -> ObjectSummary {
        storage
            .write_object(WriteObjectRequest {
                object: id(bucket, name),
                data: Bytes::from(body.to_string()),
                content_type: ContentType::default(),
            })
            .await
            .expect("write")
    }

    fn listing(bucket_name: &str, delimiter: Option<&str>, max_results: u32) -> ListObjectsRequest {
        ListObjectsRequest {
            bucket: bucket(bucket_name),
            prefix: ObjectPrefix::empty(),
            delimiter: delimiter.map(|d| Delimiter::parse(d).expect("delimiter")),
            max_results,
            page_token: None,
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        let written = put(&storage, "bucket-a", "a/b.txt", "hello").await;
        assert_eq!(written.size, 5);
        assert_eq!(written.md5_hash.as_deref(), Some("XUFAKrxLKna5cZ2REBfFkg=="));

        let content = storage
            .read_object(&id("bucket-a", "a/b.txt"), None, 1024)
            .await
            .expect("read");
        assert_eq!(content.data, Bytes::from_static(b"hello"));
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_read_respects_limit() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        put(&storage, "bucket-a", "big", "0123456789").await;
        let err = storage
            .read_object(&id("bucket-a", "big"), None, 4)
            .await
            .expect_err("too large");
        assert!(matches!(err, StorageError::TooLarge { size: 10, limit: 4 }));
    }

    #[tokio::test]
    async fn test_create_existing_bucket_fails() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        let err = storage
            .create_bucket(&CreateBucketRequest {
                name: bucket("bucket-a"),
                location: Location::parse("EU").expect("location"),
                storage_class: StorageClass::Nearline,
                versioning: false,
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_bucket_force_semantics() {
        let storage = storage_with(&[("bucket-a", true)]).await;
        put(&storage, "bucket-a", "x", "1").await;
        storage
            .delete_object(&id("bucket-a", "x"), None)
            .await
            .expect("soft delete");

        // Only a non-current version remains.
        let err = storage
            .delete_bucket(&bucket("bucket-a"), false)
            .await
            .expect_err("not empty");
        assert!(matches!(err, StorageError::NotEmpty(_)));

        storage
            .delete_bucket(&bucket("bucket-a"), true)
            .await
            .expect("forced");
        let err = storage
            .list_objects(&listing("bucket-a", None, 10))
            .await
            .expect_err("gone");
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_versioned_overwrite_keeps_history() {
        let storage = storage_with(&[("bucket-v", true), ("bucket-p", false)]).await;
        let first = put(&storage, "bucket-v", "doc", "one").await;
        put(&storage, "bucket-v", "doc", "two").await;
        put(&storage, "bucket-p", "doc", "one").await;
        put(&storage, "bucket-p", "doc", "two").await;

        let versions = storage
            .list_object_versions(&bucket("bucket-v"), &ObjectPrefix::empty())
            .await
            .expect("versions");
        assert_eq!(versions.len(), 2);
        assert!(!versions[0].is_live);
        assert!(versions[1].is_live);

        let old = storage
            .read_object(&id("bucket-v", "doc"), first.generation, 1024)
            .await
            .expect("old generation");
        assert_eq!(old.data, Bytes::from_static(b"one"));

        let plain = storage
            .list_object_versions(&bucket("bucket-p"), &ObjectPrefix::empty())
            .await
            .expect("versions");
        assert_eq!(plain.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_specific_generation() {
        let storage = storage_with(&[("bucket-v", true)]).await;
        let first = put(&storage, "bucket-v", "doc", "one").await;
        put(&storage, "bucket-v", "doc", "two").await;
        storage
            .delete_object(&id("bucket-v", "doc"), first.generation)
            .await
            .expect("delete old generation");
        let err = storage
            .delete_object(&id("bucket-v", "doc"), first.generation)
            .await
            .expect_err("already gone");
        assert!(matches!(err, StorageError::NotFound(_)));
        let live = storage
            .read_object(&id("bucket-v", "doc"), None, 1024)
            .await
            .expect("live survives");
        assert_eq!(live.data, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_copy_missing_source_leaves_destination() {
        let storage = storage_with(&[("bucket-a", false), ("bucket-b", false)]).await;
        put(&storage, "bucket-b", "y.txt", "keep").await;
        let err = storage
            .copy_object(&id("bucket-a", "x.txt"), &id("bucket-b", "y.txt"))
            .await
            .expect_err("missing source");
        assert!(matches!(err, StorageError::NotFound(_)));
        let dest = storage
            .read_object(&id("bucket-b", "y.txt"), None, 1024)
            .await
            .expect("untouched");
        assert_eq!(dest.data, Bytes::from_static(b"keep"));
    }

    #[tokio::test]
    async fn test_copy_to_missing_bucket_fails() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        put(&storage, "bucket-a", "x.txt", "data").await;
        let err = storage
            .copy_object(&id("bucket-a", "x.txt"), &id("bucket-z", "y.txt"))
            .await
            .expect_err("missing destination bucket");
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delimiter_grouping_and_paging() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        for name in ["a/1", "a/2", "a0", "b/c/d", "c"] {
            put(&storage, "bucket-a", name, "x").await;
        }

        let page = storage
            .list_objects(&listing("bucket-a", Some("/"), 1000))
            .await
            .expect("list");
        let names: Vec<_> = page.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a0", "c"]);
        assert_eq!(page.prefixes, vec!["a/".to_string(), "b/".to_string()]);
        assert_eq!(page.next_page_token, None);

        let mut request = listing("bucket-a", Some("/"), 2);
        let mut seen_objects = Vec::new();
        let mut seen_prefixes = Vec::new();
        loop {
            let page = storage.list_objects(&request).await.expect("page");
            seen_objects.extend(page.objects.into_iter().map(|o| o.name));
            seen_prefixes.extend(page.prefixes);
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }
        assert_eq!(seen_objects, vec!["a0".to_string(), "c".to_string()]);
        assert_eq!(seen_prefixes, vec!["a/".to_string(), "b/".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_foreign_page_token() {
        let storage = storage_with(&[("bucket-a", false)]).await;
        let mut request = listing("bucket-a", None, 10);
        request.page_token = Some("not-a-token!".to_string());
        let err = storage.list_objects(&request).await.expect_err("bad token");
        assert!(matches!(err, StorageError::InvalidArgument { .. }));
    }
}
