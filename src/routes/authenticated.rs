use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Routes open to any authenticated role. `create_router` wraps this whole router
/// in `require_auth`, so every handler here receives the caller's `Identity` and
/// the cart engine only ever sees user ids taken from a verified token.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // POST /auth/change-password {old_password, new_password}
        .route("/auth/change-password", post(handlers::change_password))
        // --- Users (read-only) ---
        .route("/users", get(handlers::list_users))
        .route("/users/{id}", get(handlers::get_user))
        // --- Cart ---
        // GET /cart
        // Lines joined with product data; read-only.
        .route("/cart", get(handlers::get_cart))
        // POST /cart/add {product_id}
        // Validates the product, then increments atomically (creates at 1).
        .route("/cart/add", post(handlers::add_to_cart))
        // POST /cart/remove {product_id}
        // Decrements, or deletes the line when the last unit goes.
        .route("/cart/remove", post(handlers::remove_from_cart))
        // DELETE /cart/clear
        // Idempotent.
        .route("/cart/clear", delete(handlers::clear_cart))
}
