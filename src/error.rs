//! # Error Handling
//!
//! This module defines the errors a request can end in and how they're converted to HTTP responses.
//!
//! ## Failure taxonomy:
//! - **UploadRejected**: the submission failed screening, nothing was written (400)
//! - **BlobWrite**: the object store refused or never received the audio (500)
//! - **RecordWrite**: the record store failed; an audio blob may already exist (500)
//! - **Unexpected**: anything else, including a panicking handler (500)
//!
//! ## JSON Response Format:
//! Every error carries a human-readable `message` and a machine-readable `error.type`.
//! Store failures add the underlying error's `name` and `detail` when
//! `server.expose_error_details` is on:
//! ```json
//! {
//!   "message": "Error uploading audio file",
//!   "error": {
//!     "type": "blob_write_failed",
//!     "name": "NoSuchBucket",
//!     "detail": "blob store rejected the write (NoSuchBucket): ..."
//!   },
//!   "timestamp": "2025-01-01T12:00:00Z"
//! }
//! ```

use crate::storage::{BlobStoreError, RecordStoreError};
use crate::upload::{PipelineError, UploadRejection};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// The underlying cause of a store failure, as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub name: String,
    pub detail: String,
}

impl From<&BlobStoreError> for ErrorDetail {
    fn from(err: &BlobStoreError) -> Self {
        Self {
            name: err.name().to_string(),
            detail: err.to_string(),
        }
    }
}

impl From<&RecordStoreError> for ErrorDetail {
    fn from(err: &RecordStoreError) -> Self {
        Self {
            name: err.name().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Errors a request handler can end in.
///
/// ## Usage Example:
/// ```rust
/// let request = read_upload_request(payload, &limits).await?;  // UploadRejection -> 400
/// ```
#[derive(Debug)]
pub enum AppError {
    /// The submission was screened out before any store was touched
    UploadRejected(UploadRejection),

    /// Writing the audio payload to the blob store failed
    BlobWrite(Option<ErrorDetail>),

    /// Writing the data record failed
    RecordWrite(Option<ErrorDetail>),

    /// Anything the handlers did not anticipate
    Unexpected,
}

impl AppError {
    /// Convert a pipeline failure, keeping the cause only when it may be shown.
    pub fn from_pipeline(err: &PipelineError, expose_details: bool) -> Self {
        match err {
            PipelineError::BlobWrite(source) => {
                AppError::BlobWrite(expose_details.then(|| ErrorDetail::from(source)))
            }
            PipelineError::RecordWrite { source, .. } => {
                AppError::RecordWrite(expose_details.then(|| ErrorDetail::from(source)))
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::UploadRejected(rejection) => rejection.code(),
            AppError::BlobWrite(_) => "blob_write_failed",
            AppError::RecordWrite(_) => "record_write_failed",
            AppError::Unexpected => "internal_error",
        }
    }

    fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            AppError::BlobWrite(detail) | AppError::RecordWrite(detail) => detail.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UploadRejected(rejection) => write!(f, "{}", rejection),
            AppError::BlobWrite(_) => write!(f, "Error uploading audio file"),
            AppError::RecordWrite(_) => write!(f, "Error saving data to database"),
            AppError::Unexpected => write!(f, "Server error"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::UploadRejected(_) => StatusCode::BAD_REQUEST,  // 400
            AppError::BlobWrite(_) | AppError::RecordWrite(_) | AppError::Unexpected => {
                StatusCode::INTERNAL_SERVER_ERROR  // 500
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut error = json!({ "type": self.error_type() });
        if let Some(detail) = self.detail() {
            error["name"] = json!(detail.name);
            error["detail"] = json!(detail.detail);
        }

        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string(),       // Human-readable error message
            "error": error,                    // Machine-readable error type and cause
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}

/// Screening failures become 400s with `?`.
impl From<UploadRejection> for AppError {
    fn from(rejection: UploadRejection) -> Self {
        AppError::UploadRejected(rejection)
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
