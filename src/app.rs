use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, Error};
use tracing_actix_web::TracingLogger;

/// Build the application every worker serves: state, middleware stack and routes.
///
/// The server and the handler tests both go through here, so tests exercise the
/// same middleware ordering production runs.
pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let cors = Cors::default()
        .allow_any_origin()    // The upload form may be served from anywhere
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    App::new()
        .app_data(web::Data::new(state))
        // Middleware executes in reverse order of registration for requests
        .wrap(cors)                                    // Handle CORS
        .wrap(middleware::RequestLogging)              // Custom request logging
        .wrap(TracingLogger::default())                // Request spans
        .configure(handlers::configure_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, test_context};
    use actix_web::http::{header, StatusCode};
    use actix_web::test;

    #[actix_web::test]
    async fn test_full_stack_serves_health_routes() {
        let ctx = test_context(test_config());
        let app = test::init_service(build_app(ctx.state.clone())).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_full_stack_answers_cors_preflight() {
        let ctx = test_context(test_config());
        let app = test::init_service(build_app(ctx.state.clone())).await;

        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/data/save")
            .insert_header((header::ORIGIN, "http://localhost:3000"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[actix_web::test]
    async fn test_unknown_route_is_not_found() {
        let ctx = test_context(test_config());
        let app = test::init_service(build_app(ctx.state.clone())).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/data/list").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
