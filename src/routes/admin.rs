use crate::{
    AppState,
    auth::{Policy, require_policy},
    handlers,
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Role-gated routes. Each route declares its own `Policy`, applied as a route
/// layer *inside* the authentication layer that `create_router` puts around the
/// whole module. Both policy kinds are in use here:
///
/// * hierarchical (`Policy::AtLeast`): the staff dashboard;
/// * set-membership (`Policy::AnyOf`): staff registration, the superuser page,
///   the catalogue writes, user management and the staff-only user dashboard.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/staff-register
        // Only a superuser may mint staff accounts.
        .route(
            "/auth/staff-register",
            post(handlers::staff_register)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
        // GET /auth/staff-dashboard
        // STAFF or anything above it.
        .route(
            "/auth/staff-dashboard",
            get(handlers::staff_dashboard)
                .route_layer(from_fn_with_state(Policy::STAFF_OR_ABOVE, require_policy)),
        )
        // GET /auth/admin-only
        .route(
            "/auth/admin-only",
            get(handlers::admin_only)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
        // POST /products
        // Explicit {STAFF, SUPERUSER} list.
        .route(
            "/products",
            post(handlers::create_product).route_layer(from_fn_with_state(
                Policy::STAFF_OR_SUPERUSER,
                require_policy,
            )),
        )
        // PUT/DELETE /products/{id}
        // {SUPERUSER} only; a STAFF caller is rejected.
        .route(
            "/products/{id}",
            put(handlers::update_product)
                .delete(handlers::delete_product)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
        // --- Users ---
        // POST /users
        .route(
            "/users",
            post(handlers::create_user)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
        // PUT /users/update-role {user_id, role}
        .route(
            "/users/update-role",
            put(handlers::update_role)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
        // GET /users/staff-dashboard
        // Exact set {STAFF}: unlike /auth/staff-dashboard, SUPERUSER is rejected.
        .route(
            "/users/staff-dashboard",
            get(handlers::user_staff_dashboard)
                .route_layer(from_fn_with_state(Policy::STAFF_ONLY, require_policy)),
        )
        // PUT/DELETE /users/{id}
        .route(
            "/users/{id}",
            put(handlers::update_user)
                .delete(handlers::delete_user)
                .route_layer(from_fn_with_state(Policy::SUPERUSER_ONLY, require_policy)),
        )
}
