//! Cloud Storage JSON API collaborator.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use gcs_mcp_core::{
    BucketName, BucketSummary, CreateBucketRequest, Generation, ListObjectsRequest,
    ObjectContent, ObjectIdentifier, ObjectPage, ObjectPrefix, ObjectSummary, ObjectVersion,
    StorageClient, StorageError, StorageResult, WriteObjectRequest,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::TokenProvider;

/// Public Cloud Storage endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Longest backend error body kept for logging.
const MAX_ERROR_DETAIL: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketResource {
    name: String,
    #[serde(default)]
    time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    storage_class: Option<String>,
    #[serde(default)]
    versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    bucket: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    md5_hash: Option<String>,
    #[serde(default)]
    generation: Option<String>,
    #[serde(default)]
    time_deleted: Option<DateTime<Utc>>,
}

impl ObjectResource {
    fn size(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    fn generation(&self) -> Option<Generation> {
        self.generation
            .as_deref()
            .and_then(|g| Generation::parse(g).ok())
    }

    fn into_summary(self) -> ObjectSummary {
        ObjectSummary {
            size: self.size(),
            generation: self.generation(),
            name: self.name,
            bucket: self.bucket,
            updated: self.updated,
            content_type: self.content_type,
            md5_hash: self.md5_hash,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    done: bool,
    #[serde(default)]
    rewrite_token: Option<String>,
    #[serde(default)]
    resource: Option<ObjectResource>,
}

impl From<BucketResource> for BucketSummary {
    fn from(bucket: BucketResource) -> Self {
        Self {
            name: bucket.name,
            created: bucket.time_created,
            location: bucket.location,
            storage_class: bucket.storage_class,
            versioning: bucket.versioning.is_some_and(|v| v.enabled),
        }
    }
}

/// Which call produced an HTTP failure; 409 means different things.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Default,
    DeleteBucket,
}

/// A [`StorageClient`] backed by the Cloud Storage JSON API.
pub struct GcsStorage {
    http: reqwest::Client,
    tokens: TokenProvider,
    endpoint: String,
    project_id: Option<String>,
}

impl std::fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorage")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl GcsStorage {
    /// Create a client. `endpoint` defaults to [`DEFAULT_ENDPOINT`].
    pub fn new(
        http: reqwest::Client,
        tokens: TokenProvider,
        endpoint: Option<&str>,
        project_id: Option<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            project_id,
        }
    }

    fn project(&self) -> StorageResult<&str> {
        self.project_id
            .as_deref()
            .ok_or(StorageError::Misconfigured("a project id"))
    }

    fn bucket_url(&self, bucket: &BucketName) -> String {
        format!(
            "{}/storage/v1/b/{}",
            self.endpoint,
            urlencoding::encode(bucket.as_str())
        )
    }

    fn object_url(&self, object: &ObjectIdentifier) -> String {
        format!(
            "{}/o/{}",
            self.bucket_url(&object.bucket),
            urlencoding::encode(object.name.as_str())
        )
    }

    async fn send(&self, request: RequestBuilder, target: &str, call: Call) -> StorageResult<Response> {
        let request = match self.tokens.authorization().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(response, target, call).await)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> StorageResult<T> {
        response.json().await.map_err(|e| {
            if e.is_decode() {
                StorageError::Internal {
                    detail: format!("unexpected response body: {e}"),
                }
            } else {
                transport_error(e)
            }
        })
    }

    async fn object_metadata(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
    ) -> StorageResult<ObjectResource> {
        let mut request = self.http.get(self.object_url(object));
        if let Some(g) = generation {
            request = request.query(&[("generation", g.get().to_string())]);
        }
        let response = self.send(request, &object.to_string(), Call::Default).await?;
        Self::json(response).await
    }

    /// Every generation under `prefix`, following page tokens.
    async fn all_versions(
        &self,
        bucket: &BucketName,
        prefix: &ObjectPrefix,
    ) -> StorageResult<Vec<ObjectResource>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("versions", "true".to_string())];
            if !prefix.is_empty() {
                query.push(("prefix", prefix.to_string()));
            }
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let request = self
                .http
                .get(format!("{}/o", self.bucket_url(bucket)))
                .query(&query);
            let page: ObjectList = Self::json(self.send(request, bucket.as_str(), Call::Default).await?).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(items),
            }
        }
    }
}

fn transport_error(err: reqwest::Error) -> StorageError {
    StorageError::Unavailable {
        detail: err.to_string(),
    }
}

async fn status_error(response: Response, target: &str, call: Call) -> StorageError {
    let status = response.status();
    let mut detail = response.text().await.unwrap_or_default();
    if detail.len() > MAX_ERROR_DETAIL {
        let mut cut = MAX_ERROR_DETAIL;
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    let detail = format!("HTTP {}: {detail}", status.as_u16());
    debug!(target_name = %target, status = status.as_u16(), "storage request failed");

    match status {
        StatusCode::BAD_REQUEST => StorageError::InvalidArgument { detail },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::PermissionDenied { detail }
        }
        StatusCode::NOT_FOUND => StorageError::NotFound(target.to_string()),
        StatusCode::CONFLICT if call == Call::DeleteBucket => {
            StorageError::NotEmpty(target.to_string())
        }
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            StorageError::AlreadyExists(target.to_string())
        }
        StatusCode::PAYLOAD_TOO_LARGE => StorageError::TooLarge {
            size: 0,
            limit: 0,
        },
        StatusCode::TOO_MANY_REQUESTS => StorageError::QuotaExceeded { detail },
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            StorageError::Unavailable { detail }
        }
        _ => StorageError::Internal { detail },
    }
}

#[async_trait]
impl StorageClient for GcsStorage {
    async fn list_buckets(&self) -> StorageResult<Vec<BucketSummary>> {
        let project = self.project()?;
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("project", project.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let request = self
                .http
                .get(format!("{}/storage/v1/b", self.endpoint))
                .query(&query);
            let page: BucketList = Self::json(self.send(request, project, Call::Default).await?).await?;
            buckets.extend(page.items.into_iter().map(BucketSummary::from));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> StorageResult<BucketSummary> {
        let project = self.project()?;
        let body = serde_json::json!({
            "name": request.name.as_str(),
            "location": request.location.as_str(),
            "storageClass": request.storage_class.as_str(),
            "versioning": { "enabled": request.versioning },
        });
        let http = self
            .http
            .post(format!("{}/storage/v1/b", self.endpoint))
            .query(&[("project", project)])
            .json(&body);
        let created: BucketResource =
            Self::json(self.send(http, request.name.as_str(), Call::Default).await?).await?;
        debug!(bucket = %request.name, "created bucket");
        Ok(created.into())
    }

    async fn delete_bucket(&self, bucket: &BucketName, force: bool) -> StorageResult<()> {
        if force {
            let versions = self.all_versions(bucket, &ObjectPrefix::empty()).await?;
            debug!(%bucket, generations = versions.len(), "emptying bucket before delete");
            for version in versions {
                let Ok(object) = ObjectIdentifier::parse(bucket.as_str(), &version.name) else {
                    warn!(%bucket, "skipping object with a name the validator rejects");
                    continue;
                };
                match self.delete_object(&object, version.generation()).await {
                    Ok(()) | Err(StorageError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        let request = self.http.delete(self.bucket_url(bucket));
        self.send(request, bucket.as_str(), Call::DeleteBucket)
            .await?;
        Ok(())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> StorageResult<ObjectPage> {
        let mut query = vec![("maxResults", request.max_results.to_string())];
        if !request.prefix.is_empty() {
            query.push(("prefix", request.prefix.to_string()));
        }
        if let Some(delimiter) = &request.delimiter {
            query.push(("delimiter", delimiter.to_string()));
        }
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        let http = self
            .http
            .get(format!("{}/o", self.bucket_url(&request.bucket)))
            .query(&query);
        let page: ObjectList =
            Self::json(self.send(http, request.bucket.as_str(), Call::Default).await?).await?;
        Ok(ObjectPage {
            objects: page.items.into_iter().map(ObjectResource::into_summary).collect(),
            prefixes: page.prefixes,
            next_page_token: page.next_page_token,
        })
    }

    async fn read_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
        max_bytes: u64,
    ) -> StorageResult<ObjectContent> {
        let metadata = self.object_metadata(object, generation).await?;
        let size = metadata.size();
        if size > max_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        // Pin the generation the size check saw.
        let pinned = metadata.generation().or(generation);
        let mut query = vec![("alt", "media".to_string())];
        if let Some(g) = pinned {
            query.push(("generation", g.get().to_string()));
        }
        let request = self.http.get(self.object_url(object)).query(&query);
        let mut response = self.send(request, &object.to_string(), Call::Default).await?;

        let mut data = BytesMut::with_capacity(usize::try_from(size).unwrap_or_default());
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            let total = (data.len() + chunk.len()) as u64;
            if total > max_bytes {
                return Err(StorageError::TooLarge {
                    size: total,
                    limit: max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }
        let data: Bytes = data.freeze();
        Ok(ObjectContent {
            size: data.len() as u64,
            data,
            content_type: metadata.content_type,
            generation: pinned,
        })
    }

    async fn write_object(&self, request: WriteObjectRequest) -> StorageResult<ObjectSummary> {
        let target = request.object.to_string();
        let http = self
            .http
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.endpoint,
                urlencoding::encode(request.object.bucket.as_str())
            ))
            .query(&[
                ("uploadType", "media"),
                ("name", request.object.name.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, request.content_type.as_str())
            .body(request.data);
        let stored: ObjectResource = Self::json(self.send(http, &target, Call::Default).await?).await?;
        Ok(stored.into_summary())
    }

    async fn delete_object(
        &self,
        object: &ObjectIdentifier,
        generation: Option<Generation>,
    ) -> StorageResult<()> {
        let mut request = self.http.delete(self.object_url(object));
        if let Some(g) = generation {
            request = request.query(&[("generation", g.get().to_string())]);
        }
        self.send(request, &object.to_string(), Call::Default)
            .await?;
        Ok(())
    }

    async fn copy_object(
        &self,
        source: &ObjectIdentifier,
        destination: &ObjectIdentifier,
    ) -> StorageResult<ObjectSummary> {
        let url = format!(
            "{}/rewriteTo/b/{}/o/{}",
            self.object_url(source),
            urlencoding::encode(destination.bucket.as_str()),
            urlencoding::encode(destination.name.as_str())
        );
        let mut rewrite_token: Option<String> = None;
        loop {
            let mut request = self.http.post(&url).json(&serde_json::json!({}));
            if let Some(token) = &rewrite_token {
                request = request.query(&[("rewriteToken", token.as_str())]);
            }
            let response = self.send(request, &source.to_string(), Call::Default).await?;
            let step: RewriteResponse = Self::json(response).await?;
            if step.done {
                return step.resource.map(ObjectResource::into_summary).ok_or(
                    StorageError::Internal {
                        detail: "rewrite finished without a resource".to_string(),
                    },
                );
            }
            rewrite_token = Some(step.rewrite_token.ok_or(StorageError::Internal {
                detail: "unfinished rewrite without a token".to_string(),
            })?);
            debug!(%source, %destination, "rewrite in progress");
        }
    }

    async fn list_object_versions(
        &self,
        bucket: &BucketName,
        prefix: &ObjectPrefix,
    ) -> StorageResult<Vec<ObjectVersion>> {
        let mut versions: Vec<ObjectVersion> = self
            .all_versions(bucket, prefix)
            .await?
            .into_iter()
            .filter_map(|item| {
                Some(ObjectVersion {
                    generation: item.generation()?,
                    size: item.size(),
                    is_live: item.time_deleted.is_none(),
                    name: item.name,
                    updated: item.updated,
                    md5_hash: item.md5_hash,
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
    use gcs_mcp_core::{ContentType, Location, StorageClass};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage(server: &MockServer) -> GcsStorage {
        let http = reqwest::Client::new();
        let tokens = TokenProvider::fixed(SecretString::from("test-token".to_string()), http.clone());
        GcsStorage::new(http, tokens, Some(&server.uri()), Some("demo".to_string()))
    }

    fn id(bucket: &str, name: &str) -> ObjectIdentifier {
        ObjectIdentifier::parse(bucket, name).expect("identifier")
    }

    fn object_json(name: &str, size: u64, generation: i64) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "bucket": "bucket-a",
            "size": size.to_string(),
            "generation": generation.to_string(),
            "contentType": "text/plain",
            "md5Hash": "XUFAKrxLKna5cZ2REBfFkg==",
            "updated": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_buckets_follows_pages_and_sorts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "demo"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "alpha"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "zulu", "location": "US", "storageClass": "STANDARD",
                           "versioning": {"enabled": true}}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let buckets = storage(&server).list_buckets().await.expect("list");
        let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zulu"]);
        assert!(buckets[1].versioning);
    }

    #[tokio::test]
    async fn test_list_buckets_requires_project() {
        let server = MockServer::start().await;
        let http = reqwest::Client::new();
        let tokens = TokenProvider::fixed(SecretString::from("t".to_string()), http.clone());
        let storage = GcsStorage::new(http, tokens, Some(&server.uri()), None);
        let err = storage.list_buckets().await.expect_err("no project");
        assert!(matches!(err, StorageError::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_anonymous_requests_carry_no_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let storage = GcsStorage::new(
            http.clone(),
            TokenProvider::anonymous(http),
            Some(&server.uri()),
            Some("demo".to_string()),
        );
        assert!(storage.list_buckets().await.expect("list").is_empty());

        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_create_bucket_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/b"))
            .and(body_json(serde_json::json!({
                "name": "bucket-a",
                "location": "US",
                "storageClass": "STANDARD",
                "versioning": {"enabled": false}
            })))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = storage(&server)
            .create_bucket(&CreateBucketRequest {
                name: BucketName::parse("bucket-a").expect("bucket"),
                location: Location::parse("us").expect("location"),
                storage_class: StorageClass::Standard,
                versioning: false,
            })
            .await
            .expect_err("conflict");
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_non_empty_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/bucket-a"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        let err = storage(&server)
            .delete_bucket(&BucketName::parse("bucket-a").expect("bucket"), false)
            .await
            .expect_err("not empty");
        assert!(matches!(err, StorageError::NotEmpty(_)));
    }

    #[tokio::test]
    async fn test_force_delete_removes_every_generation() {
        let server = MockServer::start().await;
        let mut old = object_json("a/b.txt", 5, 1);
        old["timeDeleted"] = serde_json::json!("2024-05-02T10:00:00Z");
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o"))
            .and(query_param("versions", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [old, object_json("a/b.txt", 5, 2)]
            })))
            .mount(&server)
            .await;
        for generation in ["1", "2"] {
            Mock::given(method("DELETE"))
                .and(path("/storage/v1/b/bucket-a/o/a%2Fb.txt"))
                .and(query_param("generation", generation))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/bucket-a"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        storage(&server)
            .delete_bucket(&BucketName::parse("bucket-a").expect("bucket"), true)
            .await
            .expect("forced delete");
    }

    #[tokio::test]
    async fn test_read_object_encodes_name_and_pins_generation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o/a%2Fb.txt"))
            .and(query_param("alt", "media"))
            .and(query_param("generation", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o/a%2Fb.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_json("a/b.txt", 5, 7)))
            .mount(&server)
            .await;

        let content = storage(&server)
            .read_object(&id("bucket-a", "a/b.txt"), None, 1024)
            .await
            .expect("read");
        assert_eq!(content.data, Bytes::from_static(b"hello"));
        assert_eq!(content.generation, Some(Generation::new(7)));
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_read_object_too_large_skips_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_json("big.bin", 64, 3)))
            .mount(&server)
            .await;

        let err = storage(&server)
            .read_object(&id("bucket-a", "big.bin"), None, 16)
            .await
            .expect_err("too large");
        assert!(matches!(err, StorageError::TooLarge { size: 64, limit: 16 }));
    }

    #[tokio::test]
    async fn test_read_object_stops_when_body_exceeds_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;
        // Metadata understates the size.
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o/liar.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_json("liar.bin", 4, 3)))
            .mount(&server)
            .await;

        let err = storage(&server)
            .read_object(&id("bucket-a", "liar.bin"), None, 16)
            .await
            .expect_err("too large");
        assert!(matches!(err, StorageError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
            .mount(&server)
            .await;
        let err = storage(&server)
            .read_object(&id("bucket-a", "nope.txt"), None, 1024)
            .await
            .expect_err("missing");
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (400, "invalid_argument"),
            (401, "permission_denied"),
            (403, "permission_denied"),
            (413, "too_large"),
            (429, "quota_exceeded"),
            (500, "backend_unavailable"),
            (503, "backend_unavailable"),
        ];
        for (status, kind) in cases {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
            let err = storage(&server)
                .delete_object(&id("bucket-a", "x"), None)
                .await
                .expect_err("mapped failure");
            let mapped = gcs_mcp_core::ToolError::from_storage(err, "gs://bucket-a/x");
            assert_eq!(mapped.kind.as_str(), kind, "HTTP {status}");
        }
    }

    #[tokio::test]
    async fn test_upload_uses_media_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/bucket-a/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "a/b.txt"))
            .and(header("content-type", "text/markdown"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_json("a/b.txt", 5, 9)))
            .mount(&server)
            .await;

        let summary = storage(&server)
            .write_object(WriteObjectRequest {
                object: id("bucket-a", "a/b.txt"),
                data: Bytes::from_static(b"hello"),
                content_type: ContentType::parse("text/markdown").expect("content type"),
            })
            .await
            .expect("upload");
        assert_eq!(summary.size, 5);
        assert_eq!(summary.generation, Some(Generation::new(9)));
    }

    #[tokio::test]
    async fn test_copy_follows_rewrite_token() {
        let server = MockServer::start().await;
        let rewrite_path = "/storage/v1/b/bucket-a/o/x.txt/rewriteTo/b/bucket-b/o/y.txt";
        Mock::given(method("POST"))
            .and(path(rewrite_path))
            .and(query_param("rewriteToken", "step-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": true,
                "resource": object_json("y.txt", 5, 11)
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(rewrite_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": false,
                "rewriteToken": "step-1"
            })))
            .mount(&server)
            .await;

        let summary = storage(&server)
            .copy_object(&id("bucket-a", "x.txt"), &id("bucket-b", "y.txt"))
            .await
            .expect("copy");
        assert_eq!(summary.name, "y.txt");
    }

    #[tokio::test]
    async fn test_versions_mark_live_generation() {
        let server = MockServer::start().await;
        let mut old = object_json("doc", 3, 1);
        old["timeDeleted"] = serde_json::json!("2024-05-02T10:00:00Z");
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bucket-a/o"))
            .and(query_param("versions", "true"))
            .and(query_param("prefix", "do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [object_json("doc", 3, 2), old]
            })))
            .mount(&server)
            .await;

        let versions = storage(&server)
            .list_object_versions(
                &BucketName::parse("bucket-a").expect("bucket"),
                &ObjectPrefix::parse("do").expect("prefix"),
            )
            .await
            .expect("versions");
        let flags: Vec<_> = versions.iter().map(|v| (v.generation.get(), v.is_live)).collect();
        assert_eq!(flags, vec![(1, false), (2, true)]);
    }
}
