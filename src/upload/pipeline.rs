//! # Upload Pipeline
//!
//! Writes a screened [`UploadRequest`] to the two stores, in order:
//!
//! 1. **Blob write** (only when audio is attached): generate a [`BlobKey`] and `put`
//!    the payload under it.
//! 2. **Record write**: insert a record whose `audioFile` is that key, or null.
//!
//! The two writes are not transactional. A failed blob write stops the request
//! before any record exists. A failed record write leaves the blob behind with
//! nothing pointing at it; the key is logged and the blob is not deleted.
//! Nothing is retried.

use super::key::BlobKey;
use super::request::{AudioPayload, UploadRequest};
use crate::storage::{BlobStore, BlobStoreError, NewDataRecord, RecordId, RecordStore, RecordStoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub record_id: RecordId,
    pub audio_file: Option<BlobKey>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to write audio blob: {0}")]
    BlobWrite(#[source] BlobStoreError),

    #[error("failed to write data record: {source}")]
    RecordWrite {
        #[source]
        source: RecordStoreError,
        /// Blob written before the record failed; it stays in the store.
        orphaned_blob: Option<BlobKey>,
    },
}

/// Store handles for the write path. Cloning shares the same clients.
#[derive(Clone)]
pub struct UploadPipeline {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
}

impl UploadPipeline {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>) -> Self {
        Self { blobs, records }
    }

    pub fn blob_backend(&self) -> &'static str {
        self.blobs.backend_name()
    }

    pub fn record_backend(&self) -> &'static str {
        self.records.backend_name()
    }

    pub async fn run(&self, request: UploadRequest) -> Result<UploadReceipt, PipelineError> {
        let UploadRequest {
            category,
            paragraph,
            audio,
        } = request;

        let audio_file = match audio {
            Some(audio) => Some(self.write_blob(audio).await?),
            None => None,
        };

        let record_id = self.write_record(category, paragraph, audio_file.as_ref()).await?;

        Ok(UploadReceipt {
            record_id,
            audio_file,
        })
    }

    async fn write_blob(&self, audio: AudioPayload) -> Result<BlobKey, PipelineError> {
        let key = BlobKey::generate(&audio.original_filename);
        let size_bytes = audio.data.len();

        match self.blobs.put(key.as_str(), audio.data, &audio.content_type).await {
            Ok(meta) => {
                info!(
                    blob_key = %key,
                    content_type = %audio.content_type,
                    size_bytes,
                    e_tag = meta.e_tag.as_deref().unwrap_or("-"),
                    version_id = meta.version_id.as_deref().unwrap_or("-"),
                    "Audio blob stored"
                );
                Ok(key)
            }
            Err(e) => {
                error!(
                    blob_key = %key,
                    store_error = e.name(),
                    status = ?e.status(),
                    error = %e,
                    "Audio blob write failed"
                );
                Err(PipelineError::BlobWrite(e))
            }
        }
    }

    async fn write_record(
        &self,
        category: String,
        paragraph: String,
        audio_file: Option<&BlobKey>,
    ) -> Result<RecordId, PipelineError> {
        let record = NewDataRecord {
            category,
            paragraph,
            audio_file: audio_file.map(|key| key.as_str().to_string()),
        };

        match self.records.insert(record).await {
            Ok(record_id) => {
                info!(record_id = %record_id, audio_file = ?audio_file.map(BlobKey::as_str), "Data record saved");
                Ok(record_id)
            }
            Err(e) => {
                error!(error = %e, "Data record write failed");
                Err(PipelineError::RecordWrite {
                    source: e,
                    orphaned_blob: audio_file.cloned(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBlobStore, MemoryRecordStore};
    use bytes::Bytes;

    fn stores() -> (Arc<MemoryBlobStore>, Arc<MemoryRecordStore>, UploadPipeline) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let pipeline = UploadPipeline::new(blobs.clone(), records.clone());
        (blobs, records, pipeline)
    }

    fn request(audio: Option<AudioPayload>) -> UploadRequest {
        UploadRequest {
            category: "news".to_string(),
            paragraph: "The quick fox.".to_string(),
            audio,
        }
    }

    fn wav(name: &str) -> AudioPayload {
        AudioPayload {
            original_filename: name.to_string(),
            content_type: "audio/wav".to_string(),
            data: Bytes::from(vec![1u8; 5 * 1024]),
        }
    }

    #[tokio::test]
    async fn test_metadata_only_creates_record_with_null_audio() {
        let (blobs, records, pipeline) = stores();

        let receipt = pipeline.run(request(None)).await.unwrap();

        assert!(receipt.audio_file.is_none());
        assert_eq!(blobs.len().await, 0);
        let saved = records.records().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, receipt.record_id);
        assert!(saved[0].audio_file.is_none());
    }

    #[tokio::test]
    async fn test_audio_creates_one_blob_and_one_record() {
        let (blobs, records, pipeline) = stores();

        let receipt = pipeline.run(request(Some(wav("clip.wav")))).await.unwrap();
        let key = receipt.audio_file.unwrap();

        assert!(key.as_str().ends_with(".wav"));
        assert_eq!(blobs.len().await, 1);
        let blob = blobs.get(key.as_str()).await.unwrap();
        assert_eq!(blob.content_type, "audio/wav");
        assert_eq!(blob.data.len(), 5 * 1024);

        let saved = records.records().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].audio_file.as_deref(), Some(key.as_str()));
        assert_eq!(saved[0].paragraph, "The quick fox.");
    }

    #[tokio::test]
    async fn test_blob_failure_creates_no_record() {
        let (blobs, records, pipeline) = stores();
        blobs.set_fail_writes(true);

        let err = pipeline.run(request(Some(wav("clip.wav")))).await.unwrap_err();

        assert!(matches!(err, PipelineError::BlobWrite(_)));
        assert_eq!(blobs.len().await, 0);
        assert!(records.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_leaves_blob_in_place() {
        let (blobs, records, pipeline) = stores();
        records.set_fail_inserts(true);

        let err = pipeline.run(request(Some(wav("clip.wav")))).await.unwrap_err();

        let orphan = match err {
            PipelineError::RecordWrite { orphaned_blob, .. } => orphaned_blob.unwrap(),
            other => panic!("expected record write failure, got {other:?}"),
        };
        assert!(blobs.get(orphan.as_str()).await.is_some());
        assert!(records.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_without_audio_has_no_orphan() {
        let (_blobs, records, pipeline) = stores();
        records.set_fail_inserts(true);

        let err = pipeline.run(request(None)).await.unwrap_err();
        assert!(matches!(err, PipelineError::RecordWrite { orphaned_blob: None, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_same_file_get_distinct_keys() {
        let (blobs, records, pipeline) = stores();

        let (first, second) = tokio::join!(
            pipeline.run(request(Some(wav("clip.wav")))),
            pipeline.run(request(Some(wav("clip.wav")))),
        );

        let first = first.unwrap();
        let second = second.unwrap();
        let first_key = first.audio_file.clone().unwrap();
        let second_key = second.audio_file.clone().unwrap();
        assert_ne!(first_key, second_key);
        assert_ne!(first.record_id, second.record_id);

        assert_eq!(blobs.len().await, 2);
        for key in [&first_key, &second_key] {
            let blob = blobs.get(key.as_str()).await.unwrap();
            assert_eq!(blob.content_type, "audio/wav");
            assert_eq!(blob.data.len(), 5 * 1024);
        }

        let saved = records.records().await;
        assert_eq!(saved.len(), 2);
        for receipt in [&first, &second] {
            let record = saved.iter().find(|r| r.id == receipt.record_id).unwrap();
            assert_eq!(record.audio_file.as_deref(), receipt.audio_file.as_ref().map(BlobKey::as_str));
        }
    }
}
