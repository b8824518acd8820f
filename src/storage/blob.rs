//! Blob store trait and the S3 implementation.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Metadata returned by the blob store after a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutMetadata {
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}

/// Errors from a blob store write.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// The store answered and refused the write (bad credentials, missing bucket, ...)
    #[error("blob store rejected the write ({code}): {message}")]
    Rejected {
        code: String,
        message: String,
        status: Option<u16>,
    },

    /// The request never got a usable answer (DNS, TLS, timeout, signing)
    #[error("blob store request failed ({kind}): {message}")]
    Transport { kind: &'static str, message: String },
}

impl BlobStoreError {
    /// Short name for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            BlobStoreError::Rejected { code, .. } => code,
            BlobStoreError::Transport { kind, .. } => kind,
        }
    }

    /// HTTP status the store answered with, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BlobStoreError::Rejected { status, .. } => *status,
            BlobStoreError::Transport { .. } => None,
        }
    }
}

impl From<SdkError<PutObjectError>> for BlobStoreError {
    fn from(err: SdkError<PutObjectError>) -> Self {
        let kind = match &err {
            SdkError::ServiceError(service) => {
                let inner = service.err();
                return BlobStoreError::Rejected {
                    code: inner.code().unwrap_or("Unknown").to_string(),
                    message: inner.message().unwrap_or("no message").to_string(),
                    status: Some(service.raw().status().as_u16()),
                };
            }
            SdkError::ConstructionFailure(_) => "ConstructionFailure",
            SdkError::TimeoutError(_) => "TimeoutError",
            SdkError::DispatchFailure(_) => "DispatchFailure",
            SdkError::ResponseError(_) => "ResponseError",
            _ => "SdkError",
        };

        BlobStoreError::Transport {
            kind,
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

/// Key-addressed binary object storage.
///
/// Write-only. Orphaned objects are left for an operator to reconcile.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `payload` under `key` with `content_type` as its content-type metadata.
    async fn put(&self, key: &str, payload: Bytes, content_type: &str) -> Result<PutMetadata, BlobStoreError>;

    /// Human-readable backend name for the health endpoint.
    fn backend_name(&self) -> &'static str;
}

/// Amazon S3 (or S3-compatible) blob store.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build the long-lived S3 client from configuration.
    ///
    /// Static credentials are used when both keys are configured; otherwise the
    /// default AWS credential chain resolves them lazily on first use.
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "audio-submissions-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, payload: Bytes, content_type: &str) -> Result<PutMetadata, BlobStoreError> {
        let size = payload.len();
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(payload))
            .send()
            .await?;

        debug!(bucket = %self.bucket, key = %key, size_bytes = size, "S3 put_object succeeded");

        Ok(PutMetadata {
            e_tag: output.e_tag().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_for_diagnostics() {
        let rejected = BlobStoreError::Rejected {
            code: "NoSuchBucket".to_string(),
            message: "The specified bucket does not exist".to_string(),
            status: Some(404),
        };
        assert_eq!(rejected.name(), "NoSuchBucket");
        assert_eq!(rejected.status(), Some(404));
        assert!(rejected.to_string().contains("The specified bucket does not exist"));

        let transport = BlobStoreError::Transport {
            kind: "DispatchFailure",
            message: "connection refused".to_string(),
        };
        assert_eq!(transport.name(), "DispatchFailure");
        assert_eq!(transport.status(), None);
    }

    #[tokio::test]
    async fn test_s3_store_reports_backend_name() {
        let config = StorageConfig {
            backend: crate::config::BlobBackend::S3,
            region: "eu-west-1".to_string(),
            bucket: "recordings".to_string(),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            endpoint_url: Some("http://127.0.0.1:9000".to_string()),
            force_path_style: true,
        };
        let store = S3BlobStore::new(&config).await;
        assert_eq!(store.backend_name(), "s3");
        assert_eq!(store.bucket, "recordings");
    }
}
