//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix, `__` between nested keys)
//! - Deployment-platform variables (PORT, DATABASE_URL, S3_BUCKET_NAME, ...)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **enums with `rename_all`**: Backends are written as lowercase strings in TOML and env vars
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment-platform variables (HOST, PORT, DATABASE_URL, AWS_REGION, ...)
//! 2. Environment variables (APP_SERVER__PORT, APP_UPLOAD__MAX_FILE_SIZE_BYTES, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// 50 MiB, the largest audio attachment accepted by default.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// 1 MiB, the largest text field accepted by default.
pub const DEFAULT_MAX_FIELD_SIZE_BYTES: u64 = 1024 * 1024;

/// Environment variables that deployment platforms set without our APP_ prefix,
/// paired with the config key each one overrides.
const PLATFORM_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("S3_BUCKET_NAME", "storage.bucket"),
    ("AWS_REGION", "storage.region"),
    ("AWS_ACCESS_KEY_ID", "storage.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "storage.secret_access_key"),
    ("S3_ENDPOINT_URL", "storage.endpoint_url"),
];

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: Automatically implements common traits:
///   - `Debug`: Allows printing with {:?} for debugging
///   - `Clone`: Allows making copies of the struct
///   - `Serialize`: Can convert this struct to JSON, TOML, etc.
///   - `Deserialize`: Can create this struct from JSON, TOML, etc.
///
/// ## Why separate config structs:
/// Each external collaborator (blob store, record store) gets its own section,
/// so swapping a backend never touches the upload limits or the server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on
/// - `workers`: Number of actix worker threads (defaults to the number of CPUs)
/// - `expose_error_details`: Include the underlying error's name and message in 500 responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub expose_error_details: bool,
}

/// Which blob store implementation receives the audio payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Amazon S3 or any S3-compatible service
    S3,
    /// Process-local map, for development only
    Memory,
}

/// Object storage settings.
///
/// ## Credentials:
/// When `access_key_id` and `secret_access_key` are both set they are used as static
/// credentials. Otherwise the AWS default credential chain applies (instance profile,
/// shared config files, and so on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BlobBackend,
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Which record store implementation persists the data records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    Postgres,
    Memory,
}

/// Record database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: RecordBackend,
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Screening rules applied to every upload before it reaches the pipeline.
///
/// ## Fields:
/// - `max_file_size_bytes`: Largest accepted audio attachment
/// - `max_field_size_bytes`: Largest accepted text field (category, paragraph)
/// - `allowed_mime_prefix`: Declared content type of the attachment must start with this
/// - `allowed_categories`: When non-empty, the only categories accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    pub max_field_size_bytes: u64,
    pub allowed_mime_prefix: String,
    pub allowed_categories: Vec<String>,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start with only the deployment-specific
/// values (bucket, database URL) supplied. They also document reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 5000,
                workers: None,
                expose_error_details: true,
            },
            storage: StorageConfig {
                backend: BlobBackend::S3,
                region: "us-east-1".to_string(),
                bucket: String::new(),          // Must be supplied per deployment
                access_key_id: None,
                secret_access_key: None,
                endpoint_url: None,
                force_path_style: false,
            },
            database: DatabaseConfig {
                backend: RecordBackend::Postgres,
                url: String::new(),             // Must be supplied per deployment
                max_connections: 5,
                run_migrations: true,
            },
            upload: UploadConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_field_size_bytes: DEFAULT_MAX_FIELD_SIZE_BYTES,
            allowed_mime_prefix: "audio/".to_string(),
            allowed_categories: Vec::new(),
        }
    }
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle the unprefixed variables deployment platforms set
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_STORAGE__BACKEND=memory`: Keep uploads in process memory
    /// - `APP_UPLOAD__ALLOWED_CATEGORIES=news,sports`: Restrict categories
    /// - `PORT=3000`, `DATABASE_URL=postgres://...`: Platform conventions
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_UPLOAD__MAX_FILE_SIZE_BYTES becomes upload.max_file_size_bytes
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_categories"),
            );

        // Handle special environment variables used by deployment platforms
        for (var, key) in PLATFORM_OVERRIDES {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(*key, value)?;
            }
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Build a configuration from defaults plus a TOML document, ignoring the environment.
    #[cfg(test)]
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The S3 backend has a bucket and a region
    /// - The Postgres backend has a connection URL and at least one connection
    /// - Upload limits are positive and the MIME prefix is not empty
    ///
    /// ## Why validate:
    /// The service cannot do anything useful without both stores, so a missing
    /// bucket or database URL should stop startup with a clear message instead of
    /// failing the first upload.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.workers == Some(0) {
            return Err(anyhow::anyhow!("Worker count must be greater than 0"));
        }

        if self.storage.backend == BlobBackend::S3 {
            if self.storage.bucket.trim().is_empty() {
                return Err(anyhow::anyhow!("Storage bucket must be set for the s3 backend"));
            }
            if self.storage.region.trim().is_empty() {
                return Err(anyhow::anyhow!("Storage region must be set for the s3 backend"));
            }
        }

        if self.database.backend == RecordBackend::Postgres {
            if self.database.url.trim().is_empty() {
                return Err(anyhow::anyhow!("Database URL must be set for the postgres backend"));
            }
            if self.database.max_connections == 0 {
                return Err(anyhow::anyhow!("Database max connections must be greater than 0"));
            }
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        if self.upload.max_field_size_bytes == 0 {
            return Err(anyhow::anyhow!("Max field size must be greater than 0"));
        }

        if self.upload.allowed_mime_prefix.is_empty() {
            return Err(anyhow::anyhow!("Allowed MIME prefix cannot be empty"));
        }

        Ok(())  // All validation passed
    }
}
