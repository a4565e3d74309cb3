//! Tool registry: the closed set of tools, their argument schemas and the
//! typed handlers behind them.
//!
//! Every tool is a [`ToolKind`] variant. The registry is assembled once by
//! [`ToolRegistry::build`] and never changes afterwards, so lookups need no
//! locking.

pub mod args;
pub mod handlers;

use std::collections::HashMap;

use gcs_mcp_core::StorageClass;
use gcs_mcp_core::identifiers::{MAX_BUCKET_NAME_LEN, MAX_OBJECT_NAME_BYTES, MIN_BUCKET_NAME_LEN};
use gcs_mcp_types::{PropertySchema, Tool, ToolInputSchema};

pub use args::{ValidatedCall, validate};
pub use handlers::{HandlerContext, execute};

/// Largest page `get_bucket_objects` returns.
pub const MAX_LIST_RESULTS: u32 = 1000;

/// Every tool the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    GetBucketObjects,
    ReadObject,
    UploadObject,
    DeleteObject,
    CopyObject,
    ListObjectVersions,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::ListBuckets,
        ToolKind::CreateBucket,
        ToolKind::DeleteBucket,
        ToolKind::GetBucketObjects,
        ToolKind::ReadObject,
        ToolKind::UploadObject,
        ToolKind::DeleteObject,
        ToolKind::CopyObject,
        ToolKind::ListObjectVersions,
    ];

    /// Name the client calls the tool by.
    pub fn name(self) -> &'static str {
        match self {
            Self::ListBuckets => "list_buckets",
            Self::CreateBucket => "create_bucket",
            Self::DeleteBucket => "delete_bucket",
            Self::GetBucketObjects => "get_bucket_objects",
            Self::ReadObject => "read_object",
            Self::UploadObject => "upload_object",
            Self::DeleteObject => "delete_object",
            Self::CopyObject => "copy_object",
            Self::ListObjectVersions => "list_object_versions",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::ListBuckets => "List the buckets in the configured project.",
            Self::CreateBucket => "Create a bucket.",
            Self::DeleteBucket => {
                "Delete a bucket. Fails on a non-empty bucket unless force is set, \
                 in which case every object version is deleted first."
            }
            Self::GetBucketObjects => {
                "List objects in a bucket, one page at a time. Pass next_page_token \
                 back as page_token to continue."
            }
            Self::ReadObject => {
                "Read an object. UTF-8 content is returned as text, anything else as base64."
            }
            Self::UploadObject => "Create or overwrite an object.",
            Self::DeleteObject => "Delete an object, or one version of it.",
            Self::CopyObject => "Copy an object to another location.",
            Self::ListObjectVersions => "List live and non-current versions of objects.",
        }
    }

    fn schema(self) -> ToolInputSchema {
        match self {
            Self::ListBuckets => ToolInputSchema::object(),
            Self::CreateBucket => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property(
                    "location",
                    PropertySchema::string()
                        .description("Bucket location, e.g. US or EUROPE-WEST1")
                        .default_value("US")
                        .length(2, 64),
                )
                .property(
                    "storage_class",
                    PropertySchema::string()
                        .default_value("STANDARD")
                        .enum_values(StorageClass::ALL.iter().map(|c| c.as_str())),
                )
                .property(
                    "versioning",
                    PropertySchema::boolean()
                        .description("Keep non-current object versions")
                        .default_value(false),
                )
                .required(["bucket_name"]),
            Self::DeleteBucket => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property(
                    "force",
                    PropertySchema::boolean()
                        .description("Delete every object version before the bucket")
                        .default_value(false),
                )
                .required(["bucket_name"]),
            Self::GetBucketObjects => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property("prefix", prefix_property())
                .property(
                    "delimiter",
                    PropertySchema::string()
                        .description("Groups names sharing a prefix up to this string")
                        .default_value("/")
                        .length(1, 16),
                )
                .property(
                    "max_results",
                    PropertySchema::integer()
                        .default_value(MAX_LIST_RESULTS)
                        .range(1, u64::from(MAX_LIST_RESULTS)),
                )
                .property(
                    "page_token",
                    PropertySchema::string().description("Token from a previous page"),
                )
                .required(["bucket_name"]),
            Self::ReadObject => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property("object_path", object_property())
                .property("version", version_property())
                .required(["bucket_name", "object_path"]),
            Self::UploadObject => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property("object_path", object_property())
                .property("content", PropertySchema::string().description("Object body"))
                .property(
                    "content_type",
                    PropertySchema::string().default_value("text/plain").length(3, 255),
                )
                .property(
                    "encoding",
                    PropertySchema::string()
                        .description("How content is encoded")
                        .default_value("text")
                        .enum_values(["text", "base64"]),
                )
                .required(["bucket_name", "object_path", "content"]),
            Self::DeleteObject => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property("object_path", object_property())
                .property("version", version_property())
                .required(["bucket_name", "object_path"]),
            Self::CopyObject => ToolInputSchema::object()
                .property("source_bucket", bucket_property())
                .property("source_object", object_property())
                .property("destination_bucket", bucket_property())
                .property("destination_object", object_property())
                .required([
                    "source_bucket",
                    "source_object",
                    "destination_bucket",
                    "destination_object",
                ]),
            Self::ListObjectVersions => ToolInputSchema::object()
                .property("bucket_name", bucket_property())
                .property("prefix", prefix_property())
                .property(
                    "object_path",
                    object_property().description("Only versions of exactly this object"),
                )
                .required(["bucket_name"]),
        }
    }
}

fn bucket_property() -> PropertySchema {
    PropertySchema::string()
        .description("Bucket name")
        .length(MIN_BUCKET_NAME_LEN as u64, MAX_BUCKET_NAME_LEN as u64)
}

fn object_property() -> PropertySchema {
    PropertySchema::string()
        .description("Object path inside the bucket")
        .length(1, MAX_OBJECT_NAME_BYTES as u64)
}

fn prefix_property() -> PropertySchema {
    PropertySchema::string()
        .description("Only names starting with this prefix")
        .default_value("")
}

fn version_property() -> PropertySchema {
    PropertySchema::string_or_integer().description("Object generation; defaults to the live version")
}

/// One registered tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub tool: Tool,
}

/// Registry construction failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool {0} is registered twice")]
    Duplicate(&'static str),
}

/// Name to tool mapping, read-only once built.
#[derive(Debug)]
pub struct ToolRegistry {
    by_name: HashMap<&'static str, ToolDescriptor>,
    /// Registration order, for `tools/list`.
    order: Vec<&'static str>,
}

impl ToolRegistry {
    /// Register every [`ToolKind`].
    pub fn build() -> Result<Self, RegistryError> {
        Self::with_tools(ToolKind::ALL)
    }

    /// Register the given tools, rejecting duplicate names.
    pub fn with_tools(kinds: impl IntoIterator<Item = ToolKind>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::new();
        let mut order = Vec::new();
        for kind in kinds {
            let name = kind.name();
            let descriptor = ToolDescriptor {
                kind,
                tool: Tool::new(name, kind.description()).with_schema(kind.schema()),
            };
            if by_name.insert(name, descriptor).is_some() {
                return Err(RegistryError::Duplicate(name));
            }
            order.push(name);
        }
        Ok(Self { by_name, order })
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name)
    }

    /// Tool definitions in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .map(|d| d.tool.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_holds_every_tool() {
        let registry = ToolRegistry::build().expect("build");
        assert_eq!(registry.len(), ToolKind::ALL.len());
        for kind in ToolKind::ALL {
            let descriptor = registry.lookup(kind.name()).expect("registered");
            assert_eq!(descriptor.kind, kind);
            assert!(!descriptor.tool.input_schema.additional_properties);
        }
        assert!(registry.lookup("run_shell").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let err = ToolRegistry::with_tools([ToolKind::ReadObject, ToolKind::ReadObject])
            .expect_err("duplicate");
        assert!(matches!(err, RegistryError::Duplicate("read_object")));
    }

    #[test]
    fn test_tools_listed_in_registration_order() {
        let names: Vec<String> = ToolRegistry::build()
            .expect("build")
            .tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("list_buckets"));
        assert_eq!(names.last().map(String::as_str), Some("list_object_versions"));
    }

    #[test]
    fn test_required_arguments_are_declared() {
        for kind in ToolKind::ALL {
            let schema = kind.schema();
            for required in &schema.required {
                assert!(schema.declares(required), "{}: {required}", kind.name());
            }
        }
    }
}
