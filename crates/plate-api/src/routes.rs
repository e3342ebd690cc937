//! API route definitions

use crate::auth::middleware::{
    require_access_token, require_refresh_token, require_session_access_token,
};
use crate::handlers::{account, auth};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/accounts/register", post(account::register_handler));

    // Access token required
    let protected_routes = Router::new()
        .route("/accounts/me", get(account::me_handler))
        .route(
            "/accounts/change-password",
            put(account::change_password_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ));

    // Refresh token plus the session's access token, which may have expired
    let session_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session_access_token,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_refresh_token));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(session_routes)
}
