use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a credential.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check; does not touch the store.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Self-service sign-up. Always creates a USER.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Issues the credential token every other route expects.
        .route("/auth/login", post(handlers::login))
        .route("/products", get(handlers::list_products))
        .route("/products/{id}", get(handlers::get_product))
}
