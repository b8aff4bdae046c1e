use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// ApiJson
///
/// `axum::Json` with the crate's rejection: a missing, unparseable or mistyped body
/// answers 400 `{error, code}` instead of axum's plain-text 400/415/422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// ApiPath
///
/// `axum::extract::Path` with the same treatment, e.g. for a non-UUID `{id}`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
