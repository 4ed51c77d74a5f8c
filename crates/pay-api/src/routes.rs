//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::auth;
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /health - Health check
///
/// - Authenticated (`accessToken` cookie or bearer token):
///   - POST /checkout/create-session - Price cart and open a provider session
///   - POST /checkout/success - Reconcile a paid session into an order
///   - GET  /coupons - The caller's active coupon
///
/// - Admin:
///   - GET  /admin/orders - List all orders
pub fn create_router(state: AppState) -> Router {
    // Credentialed CORS needs an explicit origin; the storefront sends the cookie.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    let cors = match HeaderValue::from_str(&state.config.client_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                "CLIENT_URL {:?} is not a valid origin; cross-origin requests will be refused",
                state.config.client_url
            );
            cors
        }
    };

    let checkout_routes = Router::new()
        .route("/create-session", post(handlers::create_checkout_session))
        .route("/success", post(handlers::checkout_success));

    // Admin gate sits inside the auth gate
    let admin_routes = Router::new()
        .route("/admin/orders", get(handlers::list_orders))
        .route_layer(middleware::from_fn(auth::require_admin));

    let protected_routes = Router::new()
        .nest("/checkout", checkout_routes)
        .route("/coupons", get(handlers::get_coupon))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}
