//! Emergency Response Coordinator - HTTP service
//!
//! # Usage
//!
//! ```bash
//! # Offline, with template reasoning and the bundled datasets
//! cargo run --release -- --provider template
//!
//! # With an OpenAI-compatible model
//! OPENAI_API_KEY=... cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! - `EMS_CONFIG`: path to a TOML config file (default: `./ems_config.toml`)
//! - `OPENAI_API_KEY`: reasoning service key (name configurable)
//! - `GOOGLE_MAPS_API_KEY`: maps key when `maps.provider = "google"`
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use emergency_response::api::{create_app, AppState};
use emergency_response::audit::create_audit_sink;
use emergency_response::catalog::{run_catalog_watcher, CatalogEvent, ResourceCatalog};
use emergency_response::config::{
    check_suspicious_values, validate_unknown_keys, SystemConfig, ValidationWarning,
};
use emergency_response::geo::create_maps_provider;
use emergency_response::llm::LlmFactory;
use emergency_response::pipeline::IncidentPipeline;
use emergency_response::report::TextReportWriter;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "emergency-response")]
#[command(about = "LLM-assisted emergency incident coordinator")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long, env = "EMS_ADDR")]
    addr: Option<String>,

    /// Path to a TOML config file (takes precedence over EMS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding ambulances.json, hospitals.json, medical_personnel.json
    #[arg(long, env = "EMS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory incident reports are written to
    #[arg(long, env = "EMS_REPORTS_DIR")]
    reports_dir: Option<PathBuf>,

    /// Reasoning provider: openai | template
    #[arg(long)]
    provider: Option<String>,
}

impl CliArgs {
    fn apply(&self, config: &mut SystemConfig) {
        if let Some(addr) = &self.addr {
            config.server.addr = addr.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.catalog.data_dir = dir.clone();
        }
        if let Some(dir) = &self.reports_dir {
            config.reports.dir = dir.clone();
        }
        if let Some(provider) = &self.provider {
            config.llm.provider = provider.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskName {
    HttpServer,
    CatalogWatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::CatalogWatcher => write!(f, "CatalogWatcher"),
        }
    }
}

// ============================================================================
// Startup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

/// Load, override and validate the config. Lint warnings are returned so
/// they can be logged once tracing is up.
fn load_config(args: &CliArgs) -> Result<(SystemConfig, Vec<ValidationWarning>)> {
    let (mut config, source) = match &args.config {
        Some(path) => (
            SystemConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            Some(path.clone()),
        ),
        None => SystemConfig::load_with_source(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let mut warnings = match &source {
        Some(path) => std::fs::read_to_string(path)
            .map(|raw| validate_unknown_keys(&raw))
            .unwrap_or_default(),
        None => Vec::new(),
    };
    warnings.extend(check_suspicious_values(&config));
    Ok((config, warnings))
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!(error = %e, "[HttpServer] Server error");
                Err(anyhow::anyhow!("HTTP server error: {e}"))
            }
        }
    });
}

/// Spawn the dataset watcher plus a task that logs its events.
fn spawn_catalog_watcher(
    task_set: &mut JoinSet<Result<TaskName>>,
    catalog: Arc<ResourceCatalog>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<CatalogEvent>(16);
    task_set.spawn(async move {
        info!("[CatalogWatcher] Task starting");
        run_catalog_watcher(catalog, poll_interval, tx, cancel_token).await;
        Ok(TaskName::CatalogWatcher)
    });
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                CatalogEvent::Reloaded(stats) => info!(
                    generation = stats.generation,
                    ambulances = stats.ambulances_available,
                    hospitals = stats.hospitals_available,
                    "Catalog reloaded from disk"
                ),
                CatalogEvent::Error(e) => warn!(error = %e, "Catalog reload failed"),
            }
        }
    });
}

async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!(task = %task_name, "Supervisor: task completed");
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {e}"));
                    }
                    None => break,
                }
            }
        }
    }

    // Let the server drain in-flight requests
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            warn!(error = %e, "Task ended with error during shutdown");
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {e}");
        }
    }

    let args = CliArgs::parse();
    let (config, warnings) = load_config(&args)?;
    init_tracing(config.logging.json);
    for warning in &warnings {
        warn!(field = %warning.field, "Config warning: {warning}");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Emergency Response Coordinator starting");

    let catalog = Arc::new(
        ResourceCatalog::load(&config.catalog.data_dir).with_context(|| {
            format!("Failed to load datasets from {}", config.catalog.data_dir.display())
        })?,
    );
    let backend = LlmFactory::create(&config.llm);
    let maps = create_maps_provider(&config.maps);
    let audit = create_audit_sink(config.audit.log_dir.as_deref());
    let pipeline = IncidentPipeline::from_config(&config, backend, catalog.clone(), maps)
        .with_audit(audit);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let state = AppState::new(
        Arc::new(pipeline),
        catalog.clone(),
        TextReportWriter::new(&config.reports.dir),
    )
    .with_shutdown(cancel_token.clone());
    let app = create_app(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
    info!(addr = %config.server.addr, "HTTP server listening");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    if config.catalog.watch {
        spawn_catalog_watcher(
            &mut task_set,
            catalog,
            Duration::from_secs(config.catalog.poll_interval_secs),
            cancel_token.clone(),
        );
    }

    run_supervisor(&mut task_set, cancel_token).await?;
    info!("Shutdown complete");
    Ok(())
}
