//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gcs_mcp_core::CredentialPolicy;
use serde::Deserialize;
use url::Url;

/// Which storage collaborator the tools talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Cloud Storage JSON API.
    Gcs,
    /// Process-local store; contents vanish on exit.
    Memory,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Project that owns listed and created buckets.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Credential document; absent means platform default credentials.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Largest object body read or uploaded, in bytes.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,

    /// End-to-end timeout for each backend request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Overrides the Cloud Storage endpoint (emulators, tests).
    #[serde(default)]
    pub storage_endpoint: Option<String>,

    /// Send requests without credentials. Set for emulators.
    #[serde(default)]
    pub anonymous: bool,

    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Allow-lists applied to the credential document.
    #[serde(default)]
    pub credential_policy: CredentialPolicy,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_max_object_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_request_timeout() -> u64 {
    60
}

fn default_backend() -> BackendKind {
    BackendKind::Gcs
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_path: None,
            max_object_size: default_max_object_size(),
            request_timeout_secs: default_request_timeout(),
            storage_endpoint: None,
            anonymous: false,
            backend: default_backend(),
            credential_policy: CredentialPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {var} is not a valid number: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("storage endpoint {0:?} is not an http(s) URL")]
    InvalidEndpoint(String),
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables onto this configuration.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(project) = non_empty_var("GOOGLE_CLOUD_PROJECT") {
            self.project_id = Some(project);
        }

        if let Some(path) = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_path = Some(PathBuf::from(path));
        }

        if let Some(host) = non_empty_var("STORAGE_EMULATOR_HOST") {
            self.storage_endpoint = Some(emulator_endpoint(&host));
            self.anonymous = true;
        }

        if let Some(size) = numeric_var("GCS_MCP_MAX_OBJECT_SIZE")? {
            self.max_object_size = size;
        }

        if let Some(secs) = numeric_var("GCS_MCP_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = secs;
        }

        Ok(())
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_object_size == 0 {
            return Err(ConfigError::Zero("max_object_size"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request_timeout_secs"));
        }
        if let Some(endpoint) = &self.storage_endpoint {
            let valid = Url::parse(endpoint).is_ok_and(|url| {
                matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
            });
            if !valid {
                return Err(ConfigError::InvalidEndpoint(endpoint.clone()));
            }
        }
        Ok(())
    }

    /// Get request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Emulators are usually given as `host:port`.
fn emulator_endpoint(host: &str) -> String {
    let host = host.trim();
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn numeric_var(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match non_empty_var(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}
