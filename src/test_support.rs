//! Helpers shared by the unit tests: a multipart body builder and an
//! application wired to in-memory stores.

use crate::config::{AppConfig, BlobBackend, RecordBackend};
use crate::state::AppState;
use crate::storage::{MemoryBlobStore, MemoryRecordStore};
use actix_multipart::Multipart;
use actix_web::error::PayloadError;
use actix_web::http::header::{self, HeaderMap, HeaderValue};
use bytes::Bytes;
use std::sync::Arc;

const BOUNDARY: &str = "----audio-submissions-test-boundary";

/// Builds a `multipart/form-data` body part by part.
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Close the body and return it as bytes ready to send.
    pub fn finish(mut self) -> Bytes {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(self.body)
    }

    /// Wrap the finished body in the extractor the handlers receive.
    pub fn into_multipart(self) -> Multipart {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&Self::content_type()).unwrap(),
        );
        let body = self.finish();
        Multipart::new(&headers, futures_util::stream::once(async move { Ok::<_, PayloadError>(body) }))
    }
}

/// Application state over in-memory stores, with handles kept for assertions.
pub struct TestContext {
    pub state: AppState,
    pub blobs: Arc<MemoryBlobStore>,
    pub records: Arc<MemoryRecordStore>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = BlobBackend::Memory;
    config.database.backend = RecordBackend::Memory;
    config
}

pub fn test_context(config: AppConfig) -> TestContext {
    let blobs = Arc::new(MemoryBlobStore::new());
    let records = Arc::new(MemoryRecordStore::new());
    let state = AppState::new(config, blobs.clone(), records.clone());
    TestContext { state, blobs, records }
}
