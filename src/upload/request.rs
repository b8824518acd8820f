//! # Upload Request Screening
//!
//! Turns a `multipart/form-data` body into a typed [`UploadRequest`], or rejects it
//! before anything is written anywhere.
//!
//! ## Rules:
//! - `category` and `paragraph` are text fields; both must be present and non-blank
//! - `audioFile` is the only file part accepted, at most once
//! - The file's declared content type must start with the configured prefix (`audio/`)
//! - The file may not exceed the configured size; the check runs while streaming,
//!   so an oversize upload is abandoned as soon as it crosses the limit
//! - Text fields may not exceed the configured field size
//!
//! Unknown text fields are ignored, and so is an `audioFile` part with an empty
//! filename: that is what a browser sends when no file was chosen.

use crate::config::UploadConfig;
use actix_multipart::{Field, Multipart};
use bytes::{Bytes, BytesMut};
use futures_util::stream::StreamExt;
use thiserror::Error;

/// Form field carrying the audio attachment.
pub const AUDIO_FIELD: &str = "audioFile";

/// Content type assumed for a file part that declares none.
const UNDECLARED_CONTENT_TYPE: &str = "application/octet-stream";

/// An audio attachment that passed screening.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub original_filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// A submission ready for the upload pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub category: String,
    pub paragraph: String,
    pub audio: Option<AudioPayload>,
}

/// Why a submission was turned away. Every variant is a client error.
#[derive(Debug, Error, PartialEq)]
pub enum UploadRejection {
    #[error("Only audio files are allowed!")]
    InvalidMimeType { declared: String },

    #[error("File too large")]
    FileTooLarge { limit: u64 },

    #[error("Field value too long")]
    FieldTooLarge { field: String },

    #[error("Unexpected field")]
    UnexpectedField { field: String },

    #[error("Duplicate field: {field}")]
    DuplicateField { field: &'static str },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("{field} must be valid UTF-8 text")]
    InvalidText { field: &'static str },

    #[error("Malformed multipart body")]
    Malformed(String),
}

impl UploadRejection {
    /// Machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            UploadRejection::InvalidMimeType { .. } => "invalid_mime_type",
            UploadRejection::FileTooLarge { .. } => "file_too_large",
            UploadRejection::FieldTooLarge { .. } => "field_too_large",
            UploadRejection::UnexpectedField { .. } => "unexpected_field",
            UploadRejection::DuplicateField { .. } => "duplicate_field",
            UploadRejection::MissingField { .. } => "missing_field",
            UploadRejection::UnknownCategory(_) => "unknown_category",
            UploadRejection::InvalidText { .. } => "invalid_text",
            UploadRejection::Malformed(_) => "malformed_multipart",
        }
    }

    /// What triggered the rejection, for the server log.
    pub fn context(&self) -> String {
        match self {
            UploadRejection::InvalidMimeType { declared } => format!("declared {declared}"),
            UploadRejection::FileTooLarge { limit } => format!("limit {limit} bytes"),
            UploadRejection::FieldTooLarge { field } | UploadRejection::UnexpectedField { field } => field.clone(),
            UploadRejection::DuplicateField { field }
            | UploadRejection::MissingField { field }
            | UploadRejection::InvalidText { field } => field.to_string(),
            UploadRejection::UnknownCategory(category) => category.clone(),
            UploadRejection::Malformed(reason) => reason.clone(),
        }
    }
}

#[derive(Default)]
struct FormFields {
    category: Option<String>,
    paragraph: Option<String>,
    audio: Option<AudioPayload>,
}

impl FormFields {
    fn into_request(self, limits: &UploadConfig) -> Result<UploadRequest, UploadRejection> {
        let category = required(self.category, "category")?;
        let paragraph = required(self.paragraph, "paragraph")?;

        if !limits.allowed_categories.is_empty() && !limits.allowed_categories.contains(&category) {
            return Err(UploadRejection::UnknownCategory(category));
        }

        Ok(UploadRequest {
            category,
            paragraph,
            audio: self.audio,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, UploadRejection> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(UploadRejection::MissingField { field }),
    }
}

fn set_once(slot: &mut Option<String>, field: &'static str, value: String) -> Result<(), UploadRejection> {
    if slot.is_some() {
        return Err(UploadRejection::DuplicateField { field });
    }
    *slot = Some(value);
    Ok(())
}

/// Read and screen a multipart submission.
pub async fn read_upload_request(
    mut payload: Multipart,
    limits: &UploadConfig,
) -> Result<UploadRequest, UploadRejection> {
    let mut form = FormFields::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| UploadRejection::Malformed(e.to_string()))?;
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        if filename.as_deref() == Some("") && name == AUDIO_FIELD {
            skip(&mut field).await?;
            continue;
        }

        if let Some(original_filename) = filename {
            if name != AUDIO_FIELD || form.audio.is_some() {
                return Err(UploadRejection::UnexpectedField { field: name });
            }

            let content_type = field
                .content_type()
                .map(|mime| mime.to_string())
                .unwrap_or_else(|| UNDECLARED_CONTENT_TYPE.to_string());
            if !content_type.starts_with(&limits.allowed_mime_prefix) {
                return Err(UploadRejection::InvalidMimeType { declared: content_type });
            }

            let data = read_file(&mut field, limits.max_file_size_bytes).await?;
            form.audio = Some(AudioPayload {
                original_filename,
                content_type,
                data,
            });
            continue;
        }

        match name.as_str() {
            "category" => {
                let value = read_text(&mut field, "category", limits.max_field_size_bytes).await?;
                set_once(&mut form.category, "category", value)?;
            }
            "paragraph" => {
                let value = read_text(&mut field, "paragraph", limits.max_field_size_bytes).await?;
                set_once(&mut form.paragraph, "paragraph", value)?;
            }
            _ => {}
        }
    }

    form.into_request(limits)
}

async fn read_file(field: &mut Field, limit: u64) -> Result<Bytes, UploadRejection> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadRejection::Malformed(e.to_string()))?;
        if (data.len() + chunk.len()) as u64 > limit {
            return Err(UploadRejection::FileTooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

async fn skip(field: &mut Field) -> Result<(), UploadRejection> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| UploadRejection::Malformed(e.to_string()))?;
    }
    Ok(())
}

async fn read_text(field: &mut Field, name: &'static str, limit: u64) -> Result<String, UploadRejection> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadRejection::Malformed(e.to_string()))?;
        if (data.len() + chunk.len()) as u64 > limit {
            return Err(UploadRejection::FieldTooLarge { field: name.to_string() });
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data.to_vec()).map_err(|_| UploadRejection::InvalidText { field: name })
}
