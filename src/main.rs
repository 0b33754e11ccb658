//! BookSwap -- book swapping web backend.
//!
//! Startup is strictly ordered: configuration, metrics, book store,
//! cover store, identity provider client, log shipping. A configuration
//! error is fatal; a missing remote log sink is not (events fall back to
//! the console).

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

/// Command-line arguments for the BookSwap server.
#[derive(Parser, Debug)]
#[command(name = "bookswap", version, about = "Book swapping web backend")]
struct Cli {
    /// Bind address (host:port).
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Settings come from the environment; a bad environment is fatal and
    // the error names every missing variable at once.
    let settings = match bookswap::config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    info!(
        "Starting {} (debug={}, auth_required={}, storage_backend={})",
        settings.server.app_name,
        settings.server.debug,
        settings.auth.required,
        settings.storage.backend
    );

    // Initialize Prometheus metrics recorder and register metric descriptions.
    bookswap::metrics::init_metrics();
    bookswap::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // Initialize the book store (SQLite).
    let sqlite_path = settings.database.sqlite_path().to_string();
    if sqlite_path != ":memory:" {
        // Ensure parent directory exists for the SQLite file.
        if let Some(parent) = std::path::Path::new(&sqlite_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = bookswap::db::BookStore::new(&sqlite_path)?;
    info!("SQLite book store initialized at {}", sqlite_path);
    // Seed the stored-books gauge from what the database already holds.
    metrics::gauge!(bookswap::metrics::BOOKS_TOTAL).set(store.count_books()? as f64);

    // Initialize the cover image store based on settings.
    let covers: Arc<dyn bookswap::storage::CoverStore> = match settings.storage.backend.as_str() {
        "memory" => {
            info!("In-memory cover store initialized (covers are not persisted)");
            Arc::new(bookswap::storage::memory::MemoryCoverStore::new())
        }
        "s3" | _ => Arc::new(bookswap::storage::s3::S3CoverStore::new(&settings.storage).await),
    };

    let oidc = bookswap::oidc::OidcClient::new(
        settings.auth.clone(),
        settings.server.base_url.clone(),
    );
    info!("OIDC redirect URI: {}", oidc.redirect_uri());

    // Remote log shipping. An unreachable sink degrades to console-only
    // logging instead of failing startup.
    let sink = bookswap::logging::CloudWatchSink::new(&settings).await;
    let logger = bookswap::logging::AppLogger::remote(Arc::new(sink));
    logger.ensure_sink().await;
    info!(
        "CloudWatch log sink configured: group={} stream={}",
        settings.logging.group, settings.logging.stream
    );

    // Build AppState.
    let state = Arc::new(bookswap::AppState {
        settings,
        store,
        covers,
        oidc,
        logger,
    });

    state
        .logger
        .info(&format!("{} backend started", state.settings.server.app_name))
        .await;

    let app = bookswap::server::app(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    info!("BookSwap listening on {}", cli.bind);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests to complete before exiting.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("BookSwap shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
