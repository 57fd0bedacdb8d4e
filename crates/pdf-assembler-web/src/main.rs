//! PDF Assembler Web - HTTP API for uploading, merging and numbering PDFs.

mod helpers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use clap::Parser;
use pdf_assembler_core::{AppConfig, StoreBackend};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

/// How often expired documents are purged.
const RETENTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Parser, Debug)]
#[command(name = "pdf-assembler-web")]
#[command(author, version, about = "PDF Assembler Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for stored documents (overrides the config file)
    #[arg(long, env = "STORE_DIR", conflicts_with = "memory_store")]
    store_dir: Option<PathBuf>,

    /// Keep documents in memory only
    #[arg(long)]
    memory_store: bool,

    /// Allowed CORS origin (any origin when unset)
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Config file (or defaults) with command line overrides applied.
    fn app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => AppConfig::load(),
        };

        if self.memory_store {
            config.store.backend = StoreBackend::Memory;
        }
        if let Some(dir) = &self.store_dir {
            config.store.backend = StoreBackend::Disk;
            config.store.path = Some(dir.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},lopdf=warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = args.app_config()?;
    let state = Arc::new(
        AppState::new(config).context("Failed to initialize application state")?,
    );

    if let Some(max_age) = state.retention() {
        info!("Purging documents older than {}s", max_age.as_secs());
        let retention_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(RETENTION_INTERVAL).await;
                retention_state.purge_expired().await;
            }
        });
    }

    let app = build_router(state, cors_layer(args.cors_origin.as_deref())?);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };

    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("Invalid CORS origin: {origin}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let body_limit = state.config.upload.max_body_bytes();

    Router::new()
        .route("/api/upload", post(routes::upload_pdfs))
        .route("/api/merge", post(routes::merge_pdfs))
        .route("/api/add-page-numbers", post(routes::add_page_numbers))
        .route("/api/download/{file_id}", get(routes::download_pdf))
        .route("/api/health", get(routes::health))
        // Downloads set their own caching headers
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
