use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;

/// ErrorBody
///
/// Wire shape of every failure: a human-readable `error` plus a machine-readable `code`.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        code: code.to_string(),
    };
    (status, Json(body)).into_response()
}

// --- Token Codec ---

/// Failures of issuing or verifying a credential token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    Config,
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
}

impl TokenError {
    /// Short label for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Config => "config",
            TokenError::Malformed => "malformed_token",
            TokenError::Expired => "expired_token",
            TokenError::InvalidSignature => "invalid_signature",
        }
    }
}

// --- Access Guard ---

/// AuthError
///
/// Everything the access guard can reject a request with. Credential failures are
/// kept apart internally (they are logged with their reason) but all answer 401.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingCredential,
    #[error("authorization header malformed")]
    MalformedCredential,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no authenticated identity attached to the request")]
    Unauthenticated,
    #[error("forbidden: requires {required}")]
    Forbidden { required: String },
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Token(TokenError::Config) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MissingCredential",
            AuthError::MalformedCredential => "MalformedCredential",
            AuthError::Token(TokenError::Config) => "InternalError",
            AuthError::Token(_) => "Unauthorized",
            AuthError::Unauthenticated => "Unauthenticated",
            AuthError::Forbidden { .. } => "Forbidden",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Token(TokenError::Config) => "Internal server error".to_string(),
            // Expired, tampered and unparseable tokens look the same to the client.
            AuthError::Token(_) => "Unauthorized".to_string(),
            other => other.to_string(),
        };
        error_response(self.status(), self.code(), message)
    }
}

// --- Persistence ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A write pointed at a row that does not exist (foreign-key violation).
    #[error("referenced row does not exist")]
    MissingReference,
    /// A write collided with a unique key.
    #[error("unique key already taken")]
    Duplicate,
}

impl StoreError {
    /// Sorts constraint violations out of a raw sqlx error; everything else stays
    /// `Database`.
    pub fn classify(err: sqlx::Error) -> Self {
        let (foreign_key, unique) = err
            .as_database_error()
            .map(|db| (db.is_foreign_key_violation(), db.is_unique_violation()))
            .unwrap_or_default();

        if foreign_key {
            StoreError::MissingReference
        } else if unique {
            StoreError::Duplicate
        } else {
            StoreError::Database(err)
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// --- Cart Mutation Engine ---

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Product does not exist")]
    ProductNotFound,
    #[error("Product not in cart")]
    NotInCart,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        match self {
            CartError::ProductNotFound => {
                error_response(StatusCode::BAD_REQUEST, "ProductNotFound", self.to_string())
            }
            CartError::NotInCart => {
                error_response(StatusCode::BAD_REQUEST, "NotInCart", self.to_string())
            }
            CartError::Store(err) => ApiError::from(err).into_response(),
        }
    }
}

// --- Route Layer ---

/// ApiError
///
/// Failures of the catalogue and account routes. Infrastructure detail is logged
/// where the error is converted, never sent to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Email/Password does not match")]
    InvalidCredentials,
    #[error("Internal server error")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => ApiError::Conflict("Resource already exists".to_string()),
            StoreError::MissingReference => {
                ApiError::BadRequest("Referenced resource does not exist".to_string())
            }
            other => {
                tracing::error!(error = %other, "store failure");
                ApiError::Internal
            }
        }
    }
}

// Extractor rejections: a body or path that does not parse is the client's fault
// and answers 400 in the usual `{error, code}` shape.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "request body rejected");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "path parameter rejected");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        tracing::error!(reason = err.reason(), "token issuance failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "InvalidCredentials"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };
        error_response(status, code, self.to_string())
    }
}

/// Formats the roles a policy requires, for `AuthError::Forbidden`.
pub(crate) fn describe_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}
