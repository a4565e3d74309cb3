//! Argument validation: raw JSON arguments in, a [`ValidatedCall`] out.
//!
//! Nothing in here touches storage. Every identifier goes through the
//! `gcs_mcp_core` validators, and an argument error names the offending
//! argument so the caller can fix it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use gcs_mcp_core::error::quote_untrusted;
use gcs_mcp_core::{
    BucketName, ContentType, CreateBucketRequest, Delimiter, Generation, IdentifierError,
    ListObjectsRequest, Location, ObjectIdentifier, ObjectPath, ObjectPrefix, StorageClass,
    ToolError, WriteObjectRequest,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{MAX_LIST_RESULTS, ToolDescriptor, ToolKind};

/// A tool call whose arguments have all been validated.
#[derive(Debug, Clone)]
pub enum ValidatedCall {
    ListBuckets,
    CreateBucket(CreateBucketRequest),
    DeleteBucket {
        bucket: BucketName,
        force: bool,
    },
    GetBucketObjects(ListObjectsRequest),
    ReadObject {
        object: ObjectIdentifier,
        version: Option<Generation>,
    },
    UploadObject(WriteObjectRequest),
    DeleteObject {
        object: ObjectIdentifier,
        version: Option<Generation>,
    },
    CopyObject {
        source: ObjectIdentifier,
        destination: ObjectIdentifier,
    },
    ListObjectVersions {
        bucket: BucketName,
        prefix: ObjectPrefix,
        object: Option<ObjectPath>,
    },
}

impl ValidatedCall {
    /// The tool this call invokes.
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ListBuckets => ToolKind::ListBuckets,
            Self::CreateBucket(_) => ToolKind::CreateBucket,
            Self::DeleteBucket { .. } => ToolKind::DeleteBucket,
            Self::GetBucketObjects(_) => ToolKind::GetBucketObjects,
            Self::ReadObject { .. } => ToolKind::ReadObject,
            Self::UploadObject(_) => ToolKind::UploadObject,
            Self::DeleteObject { .. } => ToolKind::DeleteObject,
            Self::CopyObject { .. } => ToolKind::CopyObject,
            Self::ListObjectVersions { .. } => ToolKind::ListObjectVersions,
        }
    }
}

// ============================================================================
// Raw argument shapes
// ============================================================================

/// A generation given either as a JSON number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionArg {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateBucketArgs {
    bucket_name: String,
    #[serde(default = "default_location")]
    location: String,
    #[serde(default = "default_storage_class")]
    storage_class: String,
    #[serde(default)]
    versioning: bool,
}

fn default_location() -> String {
    "US".to_string()
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteBucketArgs {
    bucket_name: String,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetBucketObjectsArgs {
    bucket_name: String,
    #[serde(default)]
    prefix: String,
    #[serde(default = "default_delimiter")]
    delimiter: String,
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default)]
    page_token: Option<String>,
}

fn default_delimiter() -> String {
    "/".to_string()
}

fn default_max_results() -> u32 {
    MAX_LIST_RESULTS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectArgs {
    bucket_name: String,
    object_path: String,
    #[serde(default)]
    version: Option<VersionArg>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ContentEncoding {
    Text,
    Base64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadObjectArgs {
    bucket_name: String,
    object_path: String,
    content: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default = "default_encoding")]
    encoding: ContentEncoding,
}

fn default_encoding() -> ContentEncoding {
    ContentEncoding::Text
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CopyObjectArgs {
    source_bucket: String,
    source_object: String,
    destination_bucket: String,
    destination_object: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListObjectVersionsArgs {
    bucket_name: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    object_path: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

/// Validate `arguments` against the tool's schema and the identifier rules.
///
/// `null` is treated as an empty argument object.
pub fn validate(descriptor: &ToolDescriptor, arguments: Value) -> Result<ValidatedCall, ToolError> {
    let object = match arguments {
        Value::Null => Map::new(),
        Value::Object(object) => object,
        _ => return Err(ToolError::invalid_argument("arguments must be a JSON object")),
    };

    if let Some(unknown) = object
        .keys()
        .find(|key| !descriptor.tool.input_schema.declares(key))
    {
        return Err(ToolError::invalid_argument(format!(
            "unknown argument {}",
            quote_untrusted(unknown)
        )));
    }

    let arguments = Value::Object(object);
    match descriptor.kind {
        ToolKind::ListBuckets => {
            let NoArgs {} = decode(arguments)?;
            Ok(ValidatedCall::ListBuckets)
        }
        ToolKind::CreateBucket => {
            let args: CreateBucketArgs = decode(arguments)?;
            Ok(ValidatedCall::CreateBucket(CreateBucketRequest {
                name: field("bucket_name", BucketName::parse(&args.bucket_name))?,
                location: field("location", Location::parse(&args.location))?,
                storage_class: field("storage_class", args.storage_class.parse::<StorageClass>())?,
                versioning: args.versioning,
            }))
        }
        ToolKind::DeleteBucket => {
            let args: DeleteBucketArgs = decode(arguments)?;
            Ok(ValidatedCall::DeleteBucket {
                bucket: field("bucket_name", BucketName::parse(&args.bucket_name))?,
                force: args.force,
            })
        }
        ToolKind::GetBucketObjects => {
            let args: GetBucketObjectsArgs = decode(arguments)?;
            if !(1..=MAX_LIST_RESULTS).contains(&args.max_results) {
                return Err(ToolError::invalid_argument(format!(
                    "max_results must be between 1 and {MAX_LIST_RESULTS}"
                )));
            }
            let delimiter = match args.delimiter.as_str() {
                "" => None,
                raw => Some(field("delimiter", Delimiter::parse(raw))?),
            };
            let page_token = match args.page_token {
                Some(token) if token.is_empty() => None,
                Some(token) if token.len() > 1024 || token.chars().any(char::is_control) => {
                    return Err(ToolError::invalid_argument("page_token is malformed"));
                }
                other => other,
            };
            Ok(ValidatedCall::GetBucketObjects(ListObjectsRequest {
                bucket: field("bucket_name", BucketName::parse(&args.bucket_name))?,
                prefix: field("prefix", ObjectPrefix::parse(&args.prefix))?,
                delimiter,
                max_results: args.max_results,
                page_token,
            }))
        }
        ToolKind::ReadObject | ToolKind::DeleteObject => {
            let args: ObjectArgs = decode(arguments)?;
            let object = object_identifier(
                ("bucket_name", &args.bucket_name),
                ("object_path", &args.object_path),
            )?;
            let version = args.version.map(parse_version).transpose()?;
            Ok(if descriptor.kind == ToolKind::ReadObject {
                ValidatedCall::ReadObject { object, version }
            } else {
                ValidatedCall::DeleteObject { object, version }
            })
        }
        ToolKind::UploadObject => {
            let args: UploadObjectArgs = decode(arguments)?;
            let object = object_identifier(
                ("bucket_name", &args.bucket_name),
                ("object_path", &args.object_path),
            )?;
            let content_type = match args.content_type.as_deref() {
                None => ContentType::default(),
                Some(raw) => field("content_type", ContentType::parse(raw))?,
            };
            let data = match args.encoding {
                ContentEncoding::Text => Bytes::from(args.content),
                ContentEncoding::Base64 => BASE64
                    .decode(args.content.trim())
                    .map(Bytes::from)
                    .map_err(|_| ToolError::invalid_argument("content is not valid base64"))?,
            };
            Ok(ValidatedCall::UploadObject(WriteObjectRequest {
                object,
                data,
                content_type,
            }))
        }
        ToolKind::CopyObject => {
            let args: CopyObjectArgs = decode(arguments)?;
            Ok(ValidatedCall::CopyObject {
                source: object_identifier(
                    ("source_bucket", &args.source_bucket),
                    ("source_object", &args.source_object),
                )?,
                destination: object_identifier(
                    ("destination_bucket", &args.destination_bucket),
                    ("destination_object", &args.destination_object),
                )?,
            })
        }
        ToolKind::ListObjectVersions => {
            let args: ListObjectVersionsArgs = decode(arguments)?;
            let bucket = field("bucket_name", BucketName::parse(&args.bucket_name))?;
            let mut prefix = field("prefix", ObjectPrefix::parse(&args.prefix))?;
            let object = args
                .object_path
                .as_deref()
                .map(|path| field("object_path", ObjectPath::parse(path)))
                .transpose()?;
            // An exact object narrows the listing to its own name.
            if let Some(object) = &object {
                if !object.as_str().starts_with(prefix.as_str()) {
                    return Err(ToolError::invalid_argument(
                        "prefix: object_path does not start with prefix",
                    ));
                }
                prefix = field("object_path", ObjectPrefix::parse(object.as_str()))?;
            }
            Ok(ValidatedCall::ListObjectVersions {
                bucket,
                prefix,
                object,
            })
        }
    }
}

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|err| {
        let detail: String = err.to_string().chars().flat_map(char::escape_debug).take(200).collect();
        ToolError::invalid_argument(format!("invalid arguments: {detail}"))
    })
}

/// Attach the argument name to an identifier error.
fn field<T>(name: &str, result: Result<T, IdentifierError>) -> Result<T, ToolError> {
    result.map_err(|err| ToolError::invalid_argument(format!("{name}: {err}")))
}

fn object_identifier(
    (bucket_arg, bucket): (&str, &str),
    (object_arg, object): (&str, &str),
) -> Result<ObjectIdentifier, ToolError> {
    Ok(ObjectIdentifier {
        bucket: field(bucket_arg, BucketName::parse(bucket))?,
        name: field(object_arg, ObjectPath::parse(object))?,
    })
}

fn parse_version(version: VersionArg) -> Result<Generation, ToolError> {
    let parsed = match version {
        VersionArg::Number(n) => Generation::parse(&n.to_string()),
        VersionArg::Text(s) => Generation::parse(s.trim()),
    };
    field("version", parsed)
}
