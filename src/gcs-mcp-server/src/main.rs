//! GCS MCP server binary: serves the storage tools on stdin/stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use gcs_mcp_backend::{GcsStorage, TokenProvider, http_client};
use gcs_mcp_core::{CredentialChoice, InMemoryStorage, StorageClient, TrustedCredentialConfig};
use gcs_mcp_server::{
    BackendKind, Dispatcher, HandlerContext, McpServer, ServerConfig, ToolRegistry, run_stdio,
};

/// Cloud Storage tools for MCP clients
#[derive(Parser)]
#[command(name = "gcs-mcp-server")]
#[command(about = "MCP server exposing Cloud Storage buckets and objects over stdio")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project that owns listed and created buckets
    #[arg(long)]
    project: Option<String>,

    /// Credential configuration document
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Largest object read or uploaded, in bytes
    #[arg(long)]
    max_object_size: Option<u64>,

    /// Storage backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries the protocol.
    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;

    if let Some(project) = &args.project {
        config.project_id = Some(project.clone());
    }
    if let Some(path) = &args.credentials {
        config.credentials_path = Some(path.clone());
    }
    if let Some(size) = args.max_object_size {
        config.max_object_size = size;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if args.json_logs {
        config.log.json = true;
    }

    config.validate()?;
    Ok(config)
}

fn build_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    match config.backend {
        BackendKind::Memory => {
            info!("Using in-memory storage; contents are lost on exit");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        BackendKind::Gcs => {
            let http = http_client(config.request_timeout()).context("Failed to build HTTP client")?;
            let (tokens, key_project) = if config.anonymous {
                info!("Emulator endpoint configured; sending unauthenticated requests");
                (TokenProvider::anonymous(http.clone()), None)
            } else {
                let choice = CredentialChoice::resolve(
                    config.credentials_path.as_deref(),
                    &config.credential_policy,
                )?;
                let key_project = match &choice {
                    CredentialChoice::Explicit(TrustedCredentialConfig::ServiceAccountKey(key)) => {
                        key.project_id.clone()
                    }
                    _ => None,
                };
                match &choice {
                    CredentialChoice::PlatformDefault => info!("Using platform default credentials"),
                    CredentialChoice::Explicit(_) => info!("Using validated credential document"),
                }
                let tokens = TokenProvider::new(choice, http.clone())
                    .context("Failed to construct credentials")?;
                (tokens, key_project)
            };

            let project_id = config.project_id.clone().or(key_project);
            if project_id.is_none() {
                info!("No project configured; list_buckets and create_bucket will fail");
            }
            Ok(Arc::new(GcsStorage::new(
                http,
                tokens,
                config.storage_endpoint.as_deref(),
                project_id,
            )))
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let storage = build_storage(&config)?;
    let registry = ToolRegistry::build()?;
    info!(
        tools = registry.len(),
        max_object_size = config.max_object_size,
        "Tool registry ready"
    );

    let dispatcher = Dispatcher::new(
        registry,
        HandlerContext::new(storage, config.max_object_size),
    );
    run_stdio(Arc::new(McpServer::new(dispatcher))).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet.
            eprintln!("gcs-mcp-server: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(&config.log.level, config.log.json);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
