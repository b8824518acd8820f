//! Record store trait, the data record model, and the Postgres implementation.

use crate::config::DatabaseConfig;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

pub type RecordId = Uuid;

/// A persisted submission: the metadata plus the key of its audio blob, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecord {
    pub id: RecordId,
    pub category: String,
    pub paragraph: String,
    pub audio_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields a caller supplies; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDataRecord {
    pub category: String,
    pub paragraph: String,
    pub audio_file: Option<String>,
}

impl NewDataRecord {
    /// Schema-level checks every store applies before writing.
    pub fn validate(&self) -> Result<(), RecordStoreError> {
        if self.category.is_empty() {
            return Err(RecordStoreError::Validation { field: "category" });
        }
        if self.paragraph.is_empty() {
            return Err(RecordStoreError::Validation { field: "paragraph" });
        }
        Ok(())
    }

    /// Stamp the record with a fresh id and matching created/updated times.
    pub fn into_record(self, now: DateTime<Utc>) -> DataRecord {
        DataRecord {
            id: Uuid::new_v4(),
            category: self.category,
            paragraph: self.paragraph,
            audio_file: self.audio_file,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// A required field was missing or empty
    #[error("record validation failed: `{field}` is required")]
    Validation { field: &'static str },

    /// The database refused the statement (constraint, permissions, ...)
    #[error("database error: {0}")]
    Database(String),

    /// The database could not be reached
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl RecordStoreError {
    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            RecordStoreError::Validation { .. } => "ValidationError",
            RecordStoreError::Database(_) => "DatabaseError",
            RecordStoreError::Unavailable(_) => "ConnectionError",
        }
    }
}

impl From<sqlx::Error> for RecordStoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                let field = match db_err.constraint() {
                    Some(name) if name.contains("paragraph") => "paragraph",
                    _ => "category",
                };
                RecordStoreError::Validation { field }
            }
            sqlx::Error::Database(db_err) => RecordStoreError::Database(db_err.message().to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => RecordStoreError::Unavailable(err.to_string()),
            _ => RecordStoreError::Database(err.to_string()),
        }
    }
}

/// Collection of data records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return its id.
    async fn insert(&self, record: NewDataRecord) -> Result<RecordId, RecordStoreError>;

    /// Human-readable backend name for the health endpoint.
    fn backend_name(&self) -> &'static str;
}

/// Postgres-backed record store.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connect to the database and, if configured, apply the embedded migrations.
    ///
    /// Failure here is fatal for the service: it cannot accept uploads without
    /// somewhere to record them.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .context("Failed to connect to the record database")?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run record database migrations")?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn insert(&self, record: NewDataRecord) -> Result<RecordId, RecordStoreError> {
        record.validate()?;
        let record = record.into_record(Utc::now());

        sqlx::query(
            "INSERT INTO data_records (id, category, paragraph, audio_file, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(&record.category)
        .bind(&record.paragraph)
        .bind(record.audio_file.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(category: &str, paragraph: &str) -> NewDataRecord {
        NewDataRecord {
            category: category.to_string(),
            paragraph: paragraph.to_string(),
            audio_file: None,
        }
    }

    #[test]
    fn test_validation_requires_category_and_paragraph() {
        assert!(new_record("news", "The quick fox.").validate().is_ok());

        let err = new_record("", "The quick fox.").validate().unwrap_err();
        assert!(matches!(err, RecordStoreError::Validation { field: "category" }));
        assert_eq!(err.name(), "ValidationError");

        let err = new_record("news", "").validate().unwrap_err();
        assert!(matches!(err, RecordStoreError::Validation { field: "paragraph" }));
    }

    #[test]
    fn test_into_record_stamps_matching_timestamps() {
        let now = Utc::now();
        let record = NewDataRecord {
            audio_file: Some("abc.wav".to_string()),
            ..new_record("news", "The quick fox.")
        }
        .into_record(now);

        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.audio_file.as_deref(), Some("abc.wav"));
    }

    #[test]
    fn test_record_serializes_with_camel_case_and_null_audio() {
        let record = new_record("news", "The quick fox.").into_record(Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("audioFile").unwrap().is_null());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["paragraph"], "The quick fox.");
    }

    #[test]
    fn test_sqlx_pool_errors_map_to_unavailable() {
        let err: RecordStoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, RecordStoreError::Unavailable(_)));
        assert_eq!(err.name(), "ConnectionError");

        let err: RecordStoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RecordStoreError::Database(_)));
    }
}
