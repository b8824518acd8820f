//! # Storage Collaborators
//!
//! The upload pipeline talks to two external services through trait objects:
//! - **blob**: key-addressed object storage for the audio payloads (S3)
//! - **records**: the collection of data records referencing those payloads (Postgres)
//!
//! Each has an in-memory implementation in **memory** for development and tests.
//! Clients are built once at startup and shared by every request.

pub mod blob;
pub mod memory;
pub mod records;

pub use blob::{BlobStore, BlobStoreError, S3BlobStore};
pub use memory::{MemoryBlobStore, MemoryRecordStore};
pub use records::{NewDataRecord, PostgresRecordStore, RecordId, RecordStore, RecordStoreError};
