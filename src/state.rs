//! # Application State Management
//!
//! State shared by every HTTP request handler. Everything in here is either
//! immutable after startup or a handle to an external service, so handlers never
//! coordinate with one another.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows every actix worker to share ownership of the same data
//! - **Why needed**: Each worker thread builds its own `App`, but all of them should
//!   talk to the same S3 client and the same database pool
//!
//! ### Trait objects (`Arc<dyn BlobStore>`)
//! - **Purpose**: The handlers only know "something that can store blobs"
//! - **Why needed**: Production uses S3 and Postgres, tests use in-memory stores,
//!   and neither the handlers nor the pipeline change between the two

use crate::config::AppConfig;
use crate::storage::{BlobStore, RecordStore};
use crate::upload::UploadPipeline;
use std::sync::Arc;
use std::time::Instant;

/// The application state that's shared across all HTTP request handlers.
///
/// ## Rust Concepts:
/// - **#[derive(Clone)]**: Cloning copies three pointers, not the data behind them
/// - **Instant**: A point in time (for measuring uptime)
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup
    pub config: Arc<AppConfig>,

    /// Blob and record store clients, constructed once at startup
    pub pipeline: UploadPipeline,

    /// When the server started
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState from the configuration and the two store clients.
    pub fn new(config: AppConfig, blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: UploadPipeline::new(blobs, records),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
