use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    response::{IntoResponse, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access control: token codec and the two-stage guard.
pub mod auth;
pub mod token;

// Cart mutation engine and the persistence it sits on.
pub mod cart;
pub mod memory;
pub mod repository;

pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use cart::CartEngine;
pub use config::AppConfig;
pub use memory::InMemoryRepository;
pub use repository::{CartStoreState, CatalogState, PostgresRepository, UserDirectoryState};
pub use token::TokenCodec;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_cart, handlers::add_to_cart, handlers::remove_from_cart,
        handlers::clear_cart, handlers::register, handlers::staff_register, handlers::login,
        handlers::get_me, handlers::staff_dashboard, handlers::admin_only,
        handlers::change_password, handlers::list_products, handlers::get_product,
        handlers::create_product, handlers::update_product, handlers::delete_product,
        handlers::list_users, handlers::get_user, handlers::create_user,
        handlers::update_user, handlers::update_role, handlers::delete_user,
        handlers::user_staff_dashboard
    ),
    components(
        schemas(
            models::Role, models::Identity, models::User, models::Product, models::CartLine,
            models::CartItem, models::CartRequest, models::LoginRequest,
            models::RegisterRequest, models::CreateProductRequest,
            models::UpdateProductRequest, models::ChangePasswordRequest,
            models::UpdateUserRequest, models::UpdateRoleRequest, models::LoginResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "cart-guard", description = "Shop cart and access-control API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of the service's dependencies, built once in `main`
/// (or a test) and cloned into every request. There is no global store handle:
/// everything a handler touches comes through here.
#[derive(Clone)]
pub struct AppState {
    pub cart: CartEngine,
    pub catalog: CatalogState,
    pub users: UserDirectoryState,
    pub tokens: TokenCodec,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        cart_store: CartStoreState,
        catalog: CatalogState,
        users: UserDirectoryState,
        config: AppConfig,
    ) -> Self {
        Self {
            cart: CartEngine::new(cart_store, catalog.clone()),
            catalog,
            users,
            tokens: TokenCodec::new(config.jwt_secret.clone()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// The cart handlers only need the engine.
impl FromRef<AppState> for CartEngine {
    fn from_ref(app_state: &AppState) -> CartEngine {
        app_state.cart.clone()
    }
}

/// create_router
///
/// Assembles the routing tree. Authenticated and admin routes both sit behind
/// `require_auth`; admin routes additionally carry their own policy layer.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let x_request_id = HeaderName::from_static("x-request-id");

    let guarded = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            auth::require_auth,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(guarded)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // Error boundary around the router: a panicking handler becomes a generic 500.
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens one span per request carrying the `x-request-id`, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "handler panicked");
    error::ApiError::Internal.into_response()
}
