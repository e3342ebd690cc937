//! Plate API - REST server for the outlet management platform
//!
//! Provides JWT access/refresh authentication with logout revocation,
//! account self-service and health endpoints.

pub mod account;
pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use crate::state::AppState;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for the HTTP surface
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::login_handler,
        handlers::auth::logout_handler,
        handlers::auth::refresh_handler,
        handlers::account::register_handler,
        handlers::account::me_handler,
        handlers::account::change_password_handler,
    ),
    components(schemas(
        error::ApiError,
        auth::LoginRequest,
        auth::AuthResponse,
        account::AccountPublic,
        account::RegisterRequest,
        account::ChangePasswordRequest,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, logout and token refresh"),
        (name = "accounts", description = "Account registration and profile"),
        (name = "health", description = "Liveness and readiness probes"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer access token scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Registers the refresh token header under its configured name
struct RefreshHeaderAddon<'a> {
    header: &'a str,
}

impl Modify for RefreshHeaderAddon<'_> {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "refresh_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(self.header))),
            );
        }
    }
}

/// OpenAPI document matching the running configuration
pub fn api_doc(refresh_header: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    RefreshHeaderAddon {
        header: refresh_header,
    }
    .modify(&mut doc);
    doc
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url(
            "/api-docs/openapi.json",
            api_doc(&state.config.auth.refresh_header),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let configured = &state.config.server.cors_origins;
    let allow_origin = if configured.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_origins(configured))
    };

    let mut allowed_headers = vec![header::AUTHORIZATION, header::CONTENT_TYPE];
    match HeaderName::try_from(state.config.auth.refresh_header.as_str()) {
        Ok(name) => allowed_headers.push(name),
        Err(_) => tracing::warn!(
            header = %state.config.auth.refresh_header,
            "Refresh header name is not a valid HTTP header"
        ),
    }

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(allowed_headers)
}

fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}
