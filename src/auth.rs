use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AuthError, describe_roles},
    models::{Identity, Role},
    token::TokenCodec,
};

// --- Stage 1: Authenticate ---

/// bearer_token
///
/// Pulls the raw token out of `Authorization: Bearer <token>`.
/// An absent header is `MissingCredential`; anything present that does not have
/// exactly that shape (other scheme, non-ASCII value, empty token, any whitespace
/// around or inside the token) is `MalformedCredential`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    parse_bearer(value)
}

fn parse_bearer(value: &HeaderValue) -> Result<&str, AuthError> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedCredential)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedCredential);
    }

    Ok(token)
}

/// authenticate
///
/// Resolves the request's credential into an `Identity`. Pure apart from logging:
/// attaching the identity to the request is the middleware's job.
pub fn authenticate(headers: &HeaderMap, codec: &TokenCodec) -> Result<Identity, AuthError> {
    let token = bearer_token(headers).inspect_err(|err| {
        tracing::warn!(reason = err.code(), "credential rejected");
    })?;

    codec.verify(token).map_err(|err| {
        tracing::warn!(reason = err.reason(), "token rejected");
        AuthError::from(err)
    })
}

/// require_auth
///
/// Route-layer middleware for the authentication stage. On success the verified
/// `Identity` is inserted into the request extensions, which is the per-request
/// context every later stage (policy check, handler) reads it from.
pub async fn require_auth(
    State(codec): State<TokenCodec>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = authenticate(request.headers(), &codec)?;

    tracing::debug!(user_id = %identity.id, role = %identity.role, "request authenticated");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Identity Extractor
///
/// Handlers take `Identity` as an argument to receive the identity attached by
/// `require_auth`. It never authenticates on its own: a handler mounted without the
/// guard in front of it fails with `Unauthenticated`, which is a wiring fault
/// rather than a missing client credential.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            tracing::error!(uri = %parts.uri, "identity requested before authentication");
            AuthError::Unauthenticated
        })
    }
}

// --- Stage 2: Authorize ---

/// Policy
///
/// A route's required-role specification. The two variants are independent
/// policies, chosen per route:
///
/// * `AtLeast` is hierarchical: it passes any role whose tier is at or above the
///   named minimum.
/// * `AnyOf` is set-membership: it passes only the listed roles and never
///   consults tier ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    AtLeast(Role),
    AnyOf(&'static [Role]),
}

impl Policy {
    /// Hierarchical STAFF minimum (STAFF and SUPERUSER pass).
    pub const STAFF_OR_ABOVE: Policy = Policy::AtLeast(Role::Staff);
    /// Set-membership `{SUPERUSER}`.
    pub const SUPERUSER_ONLY: Policy = Policy::AnyOf(&[Role::Superuser]);
    /// Set-membership `{STAFF}`. A SUPERUSER does not pass.
    pub const STAFF_ONLY: Policy = Policy::AnyOf(&[Role::Staff]);
    /// Set-membership `{STAFF, SUPERUSER}`.
    pub const STAFF_OR_SUPERUSER: Policy = Policy::AnyOf(&[Role::Staff, Role::Superuser]);

    pub fn permits(&self, role: Role) -> bool {
        match self {
            Policy::AtLeast(minimum) => role.tier() >= minimum.tier(),
            Policy::AnyOf(allowed) => allowed.contains(&role),
        }
    }

    fn describe(&self) -> String {
        match self {
            Policy::AtLeast(minimum) => format!("{minimum} or above"),
            Policy::AnyOf(allowed) => describe_roles(allowed),
        }
    }
}

/// authorize
///
/// Decides access for an already-authenticated identity. `None` means the
/// authentication stage never ran for this request.
pub fn authorize(identity: Option<&Identity>, policy: &Policy) -> Result<(), AuthError> {
    let identity = identity.ok_or_else(|| {
        tracing::error!(?policy, "authorization attempted without an identity");
        AuthError::Unauthenticated
    })?;

    if policy.permits(identity.role) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %identity.id,
        role = %identity.role,
        ?policy,
        "role check failed"
    );
    Err(AuthError::Forbidden {
        required: policy.describe(),
    })
}

/// require_policy
///
/// Route-layer middleware for the authorization stage. Must sit inside
/// `require_auth`; it only reads the attached identity and mutates nothing.
pub async fn require_policy(
    State(policy): State<Policy>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(request.extensions().get::<Identity>(), &policy)?;
    Ok(next.run(request).await)
}
