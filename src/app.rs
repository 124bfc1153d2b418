use std::sync::Arc;

use axum::Router;
use axum::middleware;
use http::header;
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    cors::{AllowOrigin, Any, CorsLayer},
    propagate_header::PropagateHeaderLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_docs::ApiDoc;
use crate::config::Config;
use crate::middleware::http_logger::http_logger;
use crate::roster::RosterPipeline;
use crate::routes;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RosterPipeline>,
}

impl AppState {
    pub fn new(pipeline: RosterPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_app(state: AppState, config: &Config) -> Router {
    let mut router = Router::new()
        .merge(routes::health::route::create_route())
        .merge(routes::placement_files::create_route())
        .merge(routes::credits::create_route())
        .with_state(state);

    if config.swagger_enabled {
        let swagger_ui =
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());
        router = router.merge(swagger_ui);
    }

    // Axum middleware goes on the router; ServiceBuilder only takes tower layers.
    let router = router.layer(middleware::from_fn(http_logger));

    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();

    let middleware = ServiceBuilder::new()
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .sensitive_request_headers(sensitive_headers.clone())
        .sensitive_response_headers(sensitive_headers)
        .compression();

    router.layer(middleware)
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let allowed_headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
        header::ACCEPT_LANGUAGE,
    ];
    let allowed_methods = [http::Method::GET, http::Method::POST, http::Method::OPTIONS];

    if allowed_origins == "*" {
        // Credentials cannot be combined with a wildcard origin.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(allowed_methods)
            .allow_headers(allowed_headers)
            .allow_credentials(false);
    }

    let origins: Vec<http::HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(allowed_methods)
        .allow_headers(allowed_headers)
        .allow_credentials(true)
}
