//! In-process stores for development and tests.
//!
//! Both keep their contents behind a tokio `RwLock`. Tests can switch on a
//! failure mode to exercise the pipeline's error paths.

use super::blob::{BlobStore, BlobStoreError, PutMetadata};
use super::records::{DataRecord, NewDataRecord, RecordId, RecordStore, RecordStoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// An object held by [`MemoryBlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredBlob>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail as if the store were unreachable.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().await.get(key).cloned()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, payload: Bytes, content_type: &str) -> Result<PutMetadata, BlobStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Transport {
                kind: "DispatchFailure",
                message: "memory blob store is failing writes".to_string(),
            });
        }

        let e_tag = format!("\"{}-{}\"", payload.len(), key.len());
        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                data: payload,
                content_type: content_type.to_string(),
            },
        );

        Ok(PutMetadata {
            e_tag: Some(e_tag),
            version_id: None,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<DataRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert` fail as if the database were down.
    #[cfg(test)]
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn records(&self) -> Vec<DataRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: NewDataRecord) -> Result<RecordId, RecordStoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable(
                "memory record store is failing inserts".to_string(),
            ));
        }

        record.validate()?;
        let record = record.into_record(Utc::now());
        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_put_then_get() {
        let store = MemoryBlobStore::new();
        let meta = store
            .put("abc.wav", Bytes::from_static(b"RIFF"), "audio/wav")
            .await
            .unwrap();

        assert!(meta.e_tag.is_some());
        let blob = store.get("abc.wav").await.unwrap();
        assert_eq!(blob.data, Bytes::from_static(b"RIFF"));
        assert_eq!(blob.content_type, "audio/wav");
    }

    #[tokio::test]
    async fn test_blob_fault_injection_writes_nothing() {
        let store = MemoryBlobStore::new();
        store.set_fail_writes(true);

        let err = store
            .put("abc.wav", Bytes::from_static(b"RIFF"), "audio/wav")
            .await
            .unwrap_err();
        assert_eq!(err.name(), "DispatchFailure");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_record_insert_validates() {
        let store = MemoryRecordStore::new();
        let err = store
            .insert(NewDataRecord {
                category: String::new(),
                paragraph: "text".to_string(),
                audio_file: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RecordStoreError::Validation { field: "category" }));
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_fault_injection() {
        let store = MemoryRecordStore::new();
        store.set_fail_inserts(true);

        let err = store
            .insert(NewDataRecord {
                category: "news".to_string(),
                paragraph: "text".to_string(),
                audio_file: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RecordStoreError::Unavailable(_)));
        assert!(store.records().await.is_empty());
    }
}
