//! # Data Submission Handler
//!
//! ## Endpoint: `POST /data/save`
//!
//! ## Request:
//! `multipart/form-data` with text fields `category` and `paragraph` and an optional
//! audio file in `audioFile`.
//!
//! ## Responses:
//! - `201 {"message": "Data saved successfully"}`
//! - `400` when the upload is screened out (wrong type, too large, missing field, ...)
//! - `500` when the blob store or the record store fails, or the handler panics

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::upload::{read_upload_request, PipelineError};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::future::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
pub struct SaveDataResponse {
    pub message: &'static str,
}

/// A panic anywhere in screening or the store writes ends in the generic 500,
/// and the worker keeps serving.
pub async fn save_data(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    match AssertUnwindSafe(persist(&state, payload)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            error!(panic = %panic_message(panic.as_ref()), "Upload handler panicked");
            Err(AppError::Unexpected)
        }
    }
}

async fn persist(state: &AppState, payload: Multipart) -> AppResult<HttpResponse> {
    let request = read_upload_request(payload, &state.config.upload)
        .await
        .map_err(|rejection| {
            warn!(
                code = rejection.code(),
                context = %rejection.context(),
                "Upload rejected"
            );
            AppError::from(rejection)
        })?;
    debug!(
        category = %request.category,
        paragraph_len = request.paragraph.len(),
        has_audio = request.audio.is_some(),
        "Upload passed screening"
    );

    match state.pipeline.run(request).await {
        Ok(receipt) => {
            debug!(record_id = %receipt.record_id, "Upload persisted");
            Ok(HttpResponse::Created().json(SaveDataResponse {
                message: "Data saved successfully",
            }))
        }
        Err(err) => {
            if let PipelineError::RecordWrite {
                orphaned_blob: Some(key),
                ..
            } = &err
            {
                warn!(blob_key = %key, "Audio blob left without a data record");
            }
            Err(AppError::from_pipeline(&err, state.config.server.expose_error_details))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Register the submission routes under `/data`.
pub fn configure_data_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/data").route("/save", web::post().to(save_data)));
}
