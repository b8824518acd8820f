use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Root liveness probe.
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body("Hello World!")
}

/// Liveness probe with service details. Does not call either store.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "storage": {
            "blob_backend": state.pipeline.blob_backend(),
            "record_backend": state.pipeline.record_backend()
        },
        "upload": {
            "max_file_size_bytes": config.upload.max_file_size_bytes,
            "allowed_mime_prefix": config.upload.allowed_mime_prefix
        }
    }))
}
