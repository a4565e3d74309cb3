//! Credential configuration validation.
//!
//! A credential document tells the backend how to obtain access tokens. An
//! `external_account` document can name a URL to fetch a subject token from
//! or an executable to run, so loading an unchecked document is equivalent to
//! letting its author make requests or run programs as this process.
//!
//! [`validate`] accepts only the shapes listed below and turns them into a
//! [`TrustedCredentialConfig`]; every other document is an [`UntrustedConfig`].
//!
//! - `service_account` keys whose `token_uri` is a trusted token endpoint.
//! - `external_account` documents whose `token_url` and impersonation URL are
//!   trusted, with exactly one `credential_source` of `url` (trusted endpoint),
//!   `file` (under an allowed directory) or `executable` (allow-listed program).

use std::fmt;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::quote_untrusted;

/// Largest credential document read from disk.
pub const MAX_DOCUMENT_BYTES: usize = 64 * 1024;

/// Token endpoint a service-account key uses when it names none.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_TRUSTED_URLS: [&str; 3] = [
    "http://169.254.169.254/",
    "http://metadata.google.internal/",
    "http://[fd00:ec2::254]/",
];
const DEFAULT_TRUSTED_TOKEN_URLS: [&str; 2] = [DEFAULT_TOKEN_URI, "https://sts.googleapis.com/"];
const DEFAULT_TRUSTED_IMPERSONATION_URLS: [&str; 1] = ["https://iamcredentials.googleapis.com/"];

const SERVICE_ACCOUNT_KEYS: &[&str] = &[
    "type",
    "project_id",
    "private_key_id",
    "private_key",
    "client_email",
    "client_id",
    "auth_uri",
    "token_uri",
    "auth_provider_x509_cert_url",
    "client_x509_cert_url",
    "universe_domain",
];

const EXTERNAL_ACCOUNT_KEYS: &[&str] = &[
    "type",
    "audience",
    "subject_token_type",
    "token_url",
    "service_account_impersonation_url",
    "service_account_impersonation",
    "credential_source",
    "quota_project_id",
    "workforce_pool_user_project",
    "universe_domain",
];

const URL_SOURCE_KEYS: &[&str] = &["url", "headers", "format"];
const FILE_SOURCE_KEYS: &[&str] = &["file", "format"];
const EXECUTABLE_SOURCE_KEYS: &[&str] = &["executable"];
const EXECUTABLE_KEYS: &[&str] = &["command", "timeout_millis"];
const FORMAT_KEYS: &[&str] = &["type", "subject_token_field_name"];

const MIN_EXECUTABLE_TIMEOUT_MS: u64 = 5_000;
const MAX_EXECUTABLE_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_EXECUTABLE_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Rejections
// ============================================================================

/// A credential document that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("credential configuration rejected: {reason}")]
pub struct UntrustedConfig {
    pub reason: RejectReason,
}

impl From<RejectReason> for UntrustedConfig {
    fn from(reason: RejectReason) -> Self {
        Self { reason }
    }
}

/// Why a credential document was rejected. Messages never echo key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("document is not valid JSON")]
    NotJson,

    #[error("document exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("document has no \"type\" field")]
    MissingType,

    #[error("credential type {0} is not accepted")]
    UnsupportedType(String),

    #[error("document carries service-account key fields but its type is not \"service_account\"")]
    TypeMismatch,

    #[error("unexpected field {0}")]
    UnknownField(String),

    #[error("field \"{0}\" is missing")]
    MissingField(&'static str),

    #[error("field \"{0}\" is malformed")]
    Malformed(&'static str),

    #[error("field \"{0}\" names an untrusted endpoint")]
    UntrustedEndpoint(&'static str),

    #[error("credential_source must contain exactly one of url, file or executable")]
    AmbiguousSource,

    #[error("executable {0} is not on the allow-list")]
    ExecutableNotAllowed(String),

    #[error("executable timeout must be between 5 and 120 seconds")]
    ExecutableTimeout,

    #[error("credential file {0} is outside the allowed directories")]
    FileNotAllowed(String),
}

// ============================================================================
// Policy
// ============================================================================

/// A URL pattern: scheme, exact host, port and path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TrustedEndpoint {
    scheme: String,
    host: String,
    port: Option<u16>,
    path_prefix: String,
}

impl TrustedEndpoint {
    /// Whether `url` falls under this pattern.
    pub fn matches(&self, url: &Url) -> bool {
        if !url.username().is_empty() || url.password().is_some() {
            return false;
        }
        if url.scheme() != self.scheme
            || url.host_str() != Some(self.host.as_str())
            || url.port_or_known_default() != self.port
        {
            return false;
        }
        let path = url.path();
        path == self.path_prefix
            || (self.path_prefix.ends_with('/') && path.starts_with(&self.path_prefix))
            || path
                .strip_prefix(self.path_prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl FromStr for TrustedEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| format!("invalid trusted endpoint {s:?}: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("trusted endpoint {s:?} must use http or https"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(format!("trusted endpoint {s:?} must not carry credentials"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| format!("trusted endpoint {s:?} has no host"))?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port: url.port_or_known_default(),
            path_prefix: url.path().to_string(),
        })
    }
}

impl TryFrom<String> for TrustedEndpoint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TrustedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        f.write_str(&self.path_prefix)
    }
}

/// Operator-controlled allow-lists applied to every credential document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialPolicy {
    /// Where a `url` credential source may fetch a subject token.
    pub trusted_urls: Vec<TrustedEndpoint>,
    /// Service-account `token_uri` and external-account `token_url`.
    pub trusted_token_urls: Vec<TrustedEndpoint>,
    /// External-account `service_account_impersonation_url`.
    pub trusted_impersonation_urls: Vec<TrustedEndpoint>,
    /// Programs an `executable` source may run, as absolute paths.
    pub allowed_executables: Vec<PathBuf>,
    /// Directories a `file` source may read from.
    pub allowed_credential_files: Vec<PathBuf>,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            trusted_urls: endpoints(&DEFAULT_TRUSTED_URLS),
            trusted_token_urls: endpoints(&DEFAULT_TRUSTED_TOKEN_URLS),
            trusted_impersonation_urls: endpoints(&DEFAULT_TRUSTED_IMPERSONATION_URLS),
            allowed_executables: Vec::new(),
            allowed_credential_files: Vec::new(),
        }
    }
}

fn endpoints(patterns: &[&str]) -> Vec<TrustedEndpoint> {
    patterns.iter().filter_map(|p| p.parse().ok()).collect()
}

fn is_trusted(list: &[TrustedEndpoint], url: &Url) -> bool {
    list.iter().any(|endpoint| endpoint.matches(url))
}

// ============================================================================
// Trusted configuration
// ============================================================================

/// Where client construction gets its credentials from.
#[derive(Debug)]
pub enum CredentialChoice {
    /// Ambient platform credentials (metadata server, environment token).
    PlatformDefault,
    /// A validated credential document.
    Explicit(TrustedCredentialConfig),
}

/// A credential document that passed [`validate`].
#[derive(Debug)]
pub enum TrustedCredentialConfig {
    ServiceAccountKey(ServiceAccountKey),
    ExternalAccount(ExternalAccount),
}

#[derive(Debug)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    pub private_key_id: Option<String>,
    pub project_id: Option<String>,
    pub token_uri: Url,
}

#[derive(Debug)]
pub struct ExternalAccount {
    pub audience: String,
    pub subject_token_type: String,
    pub token_url: Url,
    pub service_account_impersonation_url: Option<Url>,
    pub credential_source: CredentialSource,
    pub quota_project_id: Option<String>,
}

/// Where an external account reads its subject token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Url {
        url: Url,
        headers: Vec<(String, String)>,
        format: SubjectTokenFormat,
    },
    File {
        path: PathBuf,
        format: SubjectTokenFormat,
    },
    /// An allow-listed program; its stdout is the executable-response JSON.
    Executable {
        program: PathBuf,
        args: Vec<String>,
        timeout: Duration,
    },
}

/// How to pull the subject token out of a url or file source response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubjectTokenFormat {
    #[default]
    Text,
    Json { field: String },
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a credential document against `policy`. The input is not
/// modified.
pub fn validate(
    doc: &Value,
    policy: &CredentialPolicy,
) -> Result<TrustedCredentialConfig, UntrustedConfig> {
    let obj = doc.as_object().ok_or(RejectReason::NotAnObject)?;
    match obj.get("type") {
        Some(Value::String(kind)) if kind == "service_account" => {
            validate_service_account(obj, policy).map(TrustedCredentialConfig::ServiceAccountKey)
        }
        Some(Value::String(kind)) if kind == "external_account" => {
            if obj.contains_key("private_key") || obj.contains_key("client_email") {
                return Err(RejectReason::TypeMismatch.into());
            }
            validate_external_account(obj, policy).map(TrustedCredentialConfig::ExternalAccount)
        }
        _ if obj.contains_key("private_key") || obj.contains_key("client_email") => {
            Err(RejectReason::TypeMismatch.into())
        }
        Some(Value::String(kind)) => Err(RejectReason::UnsupportedType(quote_untrusted(kind)).into()),
        Some(_) => Err(RejectReason::Malformed("type").into()),
        None => Err(RejectReason::MissingType.into()),
    }
}

/// Parse raw bytes into a JSON document, enforcing the size cap.
pub fn parse_document(bytes: &[u8]) -> Result<Value, UntrustedConfig> {
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(RejectReason::TooLarge {
            max: MAX_DOCUMENT_BYTES,
        }
        .into());
    }
    serde_json::from_slice(bytes).map_err(|_| RejectReason::NotJson.into())
}

fn validate_service_account(
    obj: &Map<String, Value>,
    policy: &CredentialPolicy,
) -> Result<ServiceAccountKey, UntrustedConfig> {
    only_keys(obj, SERVICE_ACCOUNT_KEYS)?;
    for key in [
        "client_id",
        "auth_uri",
        "auth_provider_x509_cert_url",
        "client_x509_cert_url",
    ] {
        if obj.get(key).is_some_and(|v| !v.is_string()) {
            return Err(RejectReason::Malformed(key).into());
        }
    }
    check_universe_domain(obj)?;

    let client_email = required_str(obj, "client_email")?;
    if !client_email.contains('@') || client_email.chars().any(char::is_control) {
        return Err(RejectReason::Malformed("client_email").into());
    }
    let private_key = required_str(obj, "private_key")?;
    if !private_key.trim_start().starts_with("-----BEGIN ")
        || !private_key.contains("PRIVATE KEY-----")
    {
        return Err(RejectReason::Malformed("private_key").into());
    }
    let token_uri = match optional_str(obj, "token_uri")? {
        Some(raw) => trusted_url(raw, "token_uri", &policy.trusted_token_urls)?,
        None => Url::parse(DEFAULT_TOKEN_URI).map_err(|_| RejectReason::Malformed("token_uri"))?,
    };

    Ok(ServiceAccountKey {
        client_email: client_email.to_string(),
        private_key: SecretString::from(private_key.to_string()),
        private_key_id: optional_str(obj, "private_key_id")?.map(str::to_string),
        project_id: optional_str(obj, "project_id")?.map(str::to_string),
        token_uri,
    })
}

fn validate_external_account(
    obj: &Map<String, Value>,
    policy: &CredentialPolicy,
) -> Result<ExternalAccount, UntrustedConfig> {
    only_keys(obj, EXTERNAL_ACCOUNT_KEYS)?;
    check_universe_domain(obj)?;
    if obj
        .get("service_account_impersonation")
        .is_some_and(|v| !v.is_object())
    {
        return Err(RejectReason::Malformed("service_account_impersonation").into());
    }
    if obj
        .get("workforce_pool_user_project")
        .is_some_and(|v| !v.is_string())
    {
        return Err(RejectReason::Malformed("workforce_pool_user_project").into());
    }

    let audience = required_str(obj, "audience")?;
    let subject_token_type = required_str(obj, "subject_token_type")?;
    let token_url = trusted_url(
        required_str(obj, "token_url")?,
        "token_url",
        &policy.trusted_token_urls,
    )?;
    let service_account_impersonation_url = optional_str(obj, "service_account_impersonation_url")?
        .map(|raw| {
            trusted_url(
                raw,
                "service_account_impersonation_url",
                &policy.trusted_impersonation_urls,
            )
        })
        .transpose()?;

    let source = match obj.get("credential_source") {
        Some(Value::Object(source)) => source,
        Some(_) => return Err(RejectReason::Malformed("credential_source").into()),
        None => return Err(RejectReason::MissingField("credential_source").into()),
    };
    let credential_source = validate_source(source, policy)?;

    Ok(ExternalAccount {
        audience: audience.to_string(),
        subject_token_type: subject_token_type.to_string(),
        token_url,
        service_account_impersonation_url,
        credential_source,
        quota_project_id: optional_str(obj, "quota_project_id")?.map(str::to_string),
    })
}

fn validate_source(
    source: &Map<String, Value>,
    policy: &CredentialPolicy,
) -> Result<CredentialSource, UntrustedConfig> {
    let present = ["url", "file", "executable"]
        .into_iter()
        .filter(|k| source.contains_key(*k))
        .count();
    if present != 1 {
        return Err(RejectReason::AmbiguousSource.into());
    }

    if source.contains_key("url") {
        only_keys(source, URL_SOURCE_KEYS)?;
        let url = trusted_url(
            required_str(source, "url")?,
            "credential_source.url",
            &policy.trusted_urls,
        )?;
        let headers = match source.get("headers") {
            None => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| match value.as_str() {
                    Some(v) if is_header_safe(name) && is_header_safe(v) => {
                        Ok((name.clone(), v.to_string()))
                    }
                    _ => Err(RejectReason::Malformed("credential_source.headers")),
                })
                .collect::<Result<Vec<_>, RejectReason>>()?,
            Some(_) => return Err(RejectReason::Malformed("credential_source.headers").into()),
        };
        return Ok(CredentialSource::Url {
            url,
            headers,
            format: validate_format(source)?,
        });
    }

    if source.contains_key("file") {
        only_keys(source, FILE_SOURCE_KEYS)?;
        let raw = required_str(source, "file")?;
        let path = PathBuf::from(raw);
        let clean = path.is_absolute()
            && path
                .components()
                .all(|c| !matches!(c, Component::ParentDir | Component::CurDir));
        if !clean {
            return Err(RejectReason::Malformed("credential_source.file").into());
        }
        if !policy
            .allowed_credential_files
            .iter()
            .any(|allowed| path.starts_with(allowed))
        {
            return Err(RejectReason::FileNotAllowed(quote_untrusted(raw)).into());
        }
        return Ok(CredentialSource::File {
            path,
            format: validate_format(source)?,
        });
    }

    only_keys(source, EXECUTABLE_SOURCE_KEYS)?;
    let executable = match source.get("executable") {
        Some(Value::Object(executable)) => executable,
        _ => return Err(RejectReason::Malformed("credential_source.executable").into()),
    };
    only_keys(executable, EXECUTABLE_KEYS)?;
    let command = required_str(executable, "command")?;
    let mut argv = shlex::split(command)
        .filter(|argv| !argv.is_empty())
        .ok_or(RejectReason::Malformed("credential_source.executable.command"))?
        .into_iter();
    let program = PathBuf::from(argv.next().unwrap_or_default());
    if !program.is_absolute() || !policy.allowed_executables.iter().any(|a| *a == program) {
        return Err(
            RejectReason::ExecutableNotAllowed(quote_untrusted(&program.to_string_lossy())).into(),
        );
    }
    let timeout_ms = match executable.get("timeout_millis") {
        None => DEFAULT_EXECUTABLE_TIMEOUT_MS,
        Some(value) => value.as_u64().ok_or(RejectReason::ExecutableTimeout)?,
    };
    if !(MIN_EXECUTABLE_TIMEOUT_MS..=MAX_EXECUTABLE_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(RejectReason::ExecutableTimeout.into());
    }
    Ok(CredentialSource::Executable {
        program,
        args: argv.collect(),
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn validate_format(source: &Map<String, Value>) -> Result<SubjectTokenFormat, UntrustedConfig> {
    let format = match source.get("format") {
        None => return Ok(SubjectTokenFormat::Text),
        Some(Value::Object(format)) => format,
        Some(_) => return Err(RejectReason::Malformed("credential_source.format").into()),
    };
    only_keys(format, FORMAT_KEYS)?;
    match optional_str(format, "type")? {
        None | Some("text") => Ok(SubjectTokenFormat::Text),
        Some("json") => {
            let field = required_str(format, "subject_token_field_name")?;
            if field.is_empty() || field.chars().any(char::is_control) {
                return Err(RejectReason::Malformed("subject_token_field_name").into());
            }
            Ok(SubjectTokenFormat::Json {
                field: field.to_string(),
            })
        }
        Some(_) => Err(RejectReason::Malformed("credential_source.format.type").into()),
    }
}

fn only_keys(obj: &Map<String, Value>, allowed: &[&str]) -> Result<(), UntrustedConfig> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(RejectReason::UnknownField(quote_untrusted(key)).into()),
        None => Ok(()),
    }
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, UntrustedConfig> {
    match optional_str(obj, key)? {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(RejectReason::Malformed(key).into()),
        None => Err(RejectReason::MissingField(key).into()),
    }
}

fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    key: &'static str,
) -> Result<Option<&'a str>, UntrustedConfig> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(RejectReason::Malformed(key).into()),
    }
}

fn trusted_url(
    raw: &str,
    field: &'static str,
    trusted: &[TrustedEndpoint],
) -> Result<Url, UntrustedConfig> {
    let url = Url::parse(raw).map_err(|_| RejectReason::Malformed(field))?;
    if !is_trusted(trusted, &url) {
        return Err(RejectReason::UntrustedEndpoint(field).into());
    }
    Ok(url)
}

fn check_universe_domain(obj: &Map<String, Value>) -> Result<(), UntrustedConfig> {
    match optional_str(obj, "universe_domain")? {
        None | Some("googleapis.com") => Ok(()),
        Some(_) => Err(RejectReason::UntrustedEndpoint("universe_domain").into()),
    }
}

fn is_header_safe(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_control)
}

// ============================================================================
// Loading
// ============================================================================

/// Failure to turn a configured credential path into a [`CredentialChoice`].
#[derive(Debug, thiserror::Error)]
pub enum CredentialLoadError {
    #[error("cannot read credential document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Untrusted {
        path: PathBuf,
        #[source]
        source: UntrustedConfig,
    },
}

impl CredentialChoice {
    /// Resolve the configured credential path. `None` selects platform
    /// default credentials.
    pub fn resolve(
        path: Option<&Path>,
        policy: &CredentialPolicy,
    ) -> Result<Self, CredentialLoadError> {
        let Some(path) = path else {
            return Ok(Self::PlatformDefault);
        };
        let io_err = |source| CredentialLoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::open(path).map_err(io_err)?;
        let mut bytes = Vec::new();
        file.take(MAX_DOCUMENT_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(io_err)?;

        parse_document(&bytes)
            .and_then(|doc| validate(&doc, policy))
            .map(Self::Explicit)
            .map_err(|source| CredentialLoadError::Untrusted {
                path: path.to_path_buf(),
                source,
            })
    }
}
