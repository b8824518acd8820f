//! # Audio Submissions Backend - Main Application Entry Point
//!
//! This is the main entry point for the audio-submissions-backend web server.
//! It accepts recordings submitted from a browser form, stores the audio in an
//! object store, and records the submission in a database.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous for better performance
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc<dyn Trait>**: Store clients shared by every worker behind a trait object
//! - **static**: Global variables that live for the entire program duration
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (TOML files + environment variables)
//! - **state**: Shared application state (config and store clients)
//! - **storage**: Blob store and record store clients
//! - **upload**: Request screening, key generation, and the write pipeline
//! - **health**: Liveness endpoints
//! - **middleware**: Custom request processing logic (request logging)
//! - **app**: The middleware stack and routes every worker serves
//! - **handlers**: HTTP request handlers for API endpoints
//! - **error**: Custom error types and HTTP error responses

// Module declarations - These tell Rust about our other source files
mod app;         // Application assembly (app.rs)
mod config;      // Configuration management (config.rs)
mod error;       // Error handling types (error.rs)
mod state;       // Application state management (state.rs)
mod health;      // Health check endpoints (health.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod storage;     // Blob and record stores (storage/ directory)
mod upload;      // Upload screening and pipeline (upload/ directory)

#[cfg(test)]
mod test_support;

// External crate imports - These are dependencies from Cargo.toml
use actix_web::HttpServer;  // Web framework
use anyhow::Result;    // Better error handling with context
use crate::config::{AppConfig, BlobBackend, RecordBackend}; // Our custom configuration types
use crate::state::AppState;   // Our custom application state
use std::sync::atomic::{AtomicBool, Ordering};  // Thread-safe boolean for shutdown
use std::sync::Arc;
use crate::storage::{BlobStore, MemoryBlobStore, MemoryRecordStore, PostgresRecordStore, RecordStore, S3BlobStore};
use tracing::{error, info, warn};  // Structured logging
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};  // Logging setup

/// Global shutdown signal that can be accessed from anywhere in the program.
/// AtomicBool is thread-safe, meaning multiple threads can safely read/write to it.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Builds the store clients** once, for every request to share
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// ## Error Handling:
/// Invalid configuration or an unreachable record database stops the process here:
/// the service has nowhere to put submissions, so there is no point listening.
#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audio-submissions-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let (blobs, records) = match build_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to initialize storage: {:#}", e);
            return Err(e);
        }
    };

    let app_state = AppState::new(config.clone(), blobs, records);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || app::build_app(app_state.clone()));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    let server = server.bind(&bind_addr)?.run();

    // Get a handle to control the server and spawn it in a separate task
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;  // Let in-flight uploads finish
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "audio_submissions_backend=debug")
/// - If not set, defaults to "audio_submissions_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_submissions_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Construct the blob store and record store clients selected in the configuration.
///
/// Both are built exactly once; every worker shares them through `AppState`.
async fn build_stores(config: &AppConfig) -> Result<(Arc<dyn BlobStore>, Arc<dyn RecordStore>)> {
    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        BlobBackend::S3 => {
            info!(
                bucket = %config.storage.bucket,
                region = %config.storage.region,
                endpoint = config.storage.endpoint_url.as_deref().unwrap_or("aws"),
                "Using S3 blob store"
            );
            Arc::new(S3BlobStore::new(&config.storage).await)
        }
        BlobBackend::Memory => {
            warn!("Using in-memory blob store; uploaded audio is lost on restart");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let records: Arc<dyn RecordStore> = match config.database.backend {
        RecordBackend::Postgres => {
            let store = PostgresRecordStore::connect(&config.database).await?;
            info!("Record database connected");
            Arc::new(store)
        }
        RecordBackend::Memory => {
            warn!("Using in-memory record store; records are lost on restart");
            Arc::new(MemoryRecordStore::new())
        }
    };

    Ok((blobs, records))
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM (termination signal from system)
/// - Listens for SIGINT (interrupt signal, usually Ctrl+C)
/// - When either signal is received, sets the global shutdown flag
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set.
///
/// Polls the flag every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
