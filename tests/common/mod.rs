#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, header},
    response::Response,
};
use cart_guard::{
    AppConfig, AppState, InMemoryRepository, TokenCodec, create_router,
    models::{Identity, Role},
};
use chrono::Duration;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

pub struct TestApp {
    pub repo: InMemoryRepository,
    pub state: AppState,
    pub router: Router,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn test_app() -> TestApp {
    let repo = InMemoryRepository::new();
    let shared = Arc::new(repo.clone());
    let state = AppState::new(shared.clone(), shared.clone(), shared, test_config());
    let router = create_router(state.clone());
    TestApp {
        repo,
        state,
        router,
    }
}

pub fn identity(role: Role) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", role.as_str().to_lowercase()),
        role,
    }
}

pub fn token_for(identity: &Identity) -> String {
    TokenCodec::new(TEST_JWT_SECRET)
        .issue(identity, Duration::hours(1))
        .unwrap()
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
