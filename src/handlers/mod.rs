pub mod data;

use crate::health;
use actix_web::web;

/// Register every route the service exposes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::root))
        .route("/api/health", web::get().to(health::health_check))
        .configure(data::configure_data_routes);
}
