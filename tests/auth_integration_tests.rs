mod common;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header, request::Parts},
    response::IntoResponse,
};
use cart_guard::{
    TokenCodec,
    auth::{Policy, authenticate, authorize},
    error::{AuthError, TokenError},
    models::{Identity, Role},
};
use chrono::Duration;
use common::{TEST_JWT_SECRET, identity, json_body, token_for};

fn codec() -> TokenCodec {
    TokenCodec::new(TEST_JWT_SECRET)
}

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

fn request_parts() -> Parts {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    request.into_parts().0
}

// --- Authenticate ---

#[test]
fn test_authenticate_success_with_valid_token() {
    let user = identity(Role::Staff);
    let headers = headers_with(&format!("Bearer {}", token_for(&user)));

    assert_eq!(authenticate(&headers, &codec()), Ok(user));
}

#[test]
fn test_authenticate_missing_header() {
    assert_eq!(
        authenticate(&HeaderMap::new(), &codec()),
        Err(AuthError::MissingCredential)
    );
}

#[test]
fn test_authenticate_wrong_scheme_is_malformed() {
    let token = token_for(&identity(Role::User));
    for value in [
        format!("Token {token}"),
        format!("bearer {token}"),
        format!("Bearer  {token}"),
        format!("Bearer {token} "),
        token.clone(),
        "Bearer".to_string(),
        "Bearer ".to_string(),
    ] {
        assert_eq!(
            authenticate(&headers_with(&value), &codec()),
            Err(AuthError::MalformedCredential),
            "header value {value:?}"
        );
    }
}

#[test]
fn test_authenticate_maps_token_failures() {
    let user = identity(Role::User);

    let expired = codec().issue(&user, Duration::seconds(-10)).unwrap();
    assert_eq!(
        authenticate(&headers_with(&format!("Bearer {expired}")), &codec()),
        Err(AuthError::Token(TokenError::Expired))
    );

    let foreign = TokenCodec::new("not-our-secret")
        .issue(&user, Duration::hours(1))
        .unwrap();
    assert_eq!(
        authenticate(&headers_with(&format!("Bearer {foreign}")), &codec()),
        Err(AuthError::Token(TokenError::InvalidSignature))
    );

    assert_eq!(
        authenticate(&headers_with("Bearer garbage"), &codec()),
        Err(AuthError::Token(TokenError::Malformed))
    );
}

#[tokio::test]
async fn test_credential_failures_all_answer_401_with_codes() {
    let cases = [
        (AuthError::MissingCredential, "MissingCredential"),
        (AuthError::MalformedCredential, "MalformedCredential"),
        (AuthError::Token(TokenError::Expired), "Unauthorized"),
        (AuthError::Token(TokenError::InvalidSignature), "Unauthorized"),
        (AuthError::Token(TokenError::Malformed), "Unauthorized"),
    ];

    for (err, code) in cases {
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], code);
    }
}

#[tokio::test]
async fn test_expired_and_invalid_tokens_look_identical_to_the_client() {
    let expired = json_body(AuthError::Token(TokenError::Expired).into_response()).await;
    let invalid = json_body(AuthError::Token(TokenError::InvalidSignature).into_response()).await;

    assert_eq!(expired, invalid);
}

#[test]
fn test_signing_misconfiguration_is_a_server_error() {
    let response = AuthError::Token(TokenError::Config).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Identity extractor ---

#[tokio::test]
async fn test_identity_extractor_reads_attached_identity() {
    let user = identity(Role::User);
    let mut parts = request_parts();
    parts.extensions.insert(user.clone());

    let extracted = Identity::from_request_parts(&mut parts, &()).await;

    assert_eq!(extracted, Ok(user));
}

#[tokio::test]
async fn test_identity_extractor_without_guard_is_unauthenticated() {
    let user = identity(Role::Superuser);
    let mut parts = request_parts();
    // A valid header alone is not enough: the extractor never authenticates.
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token_for(&user))).unwrap(),
    );

    let extracted = Identity::from_request_parts(&mut parts, &()).await;

    assert_eq!(extracted, Err(AuthError::Unauthenticated));
}

// --- Authorize ---

#[test]
fn test_authorize_without_identity_is_unauthenticated() {
    assert_eq!(
        authorize(None, &Policy::STAFF_OR_ABOVE),
        Err(AuthError::Unauthenticated)
    );
    assert_eq!(
        authorize(None, &Policy::SUPERUSER_ONLY),
        Err(AuthError::Unauthenticated)
    );
}

#[test]
fn test_hierarchical_policy_accepts_iff_tier_at_least_minimum() {
    for minimum in Role::ALL {
        let policy = Policy::AtLeast(minimum);
        for role in Role::ALL {
            let result = authorize(Some(&identity(role)), &policy);
            assert_eq!(
                result.is_ok(),
                role.tier() >= minimum.tier(),
                "role {role} against minimum {minimum}"
            );
            if let Err(err) = result {
                assert!(matches!(err, AuthError::Forbidden { .. }));
            }
        }
    }
}

#[test]
fn test_set_membership_policy_accepts_iff_role_listed() {
    const SETS: [&[Role]; 8] = [
        &[],
        &[Role::User],
        &[Role::Staff],
        &[Role::Superuser],
        &[Role::User, Role::Staff],
        &[Role::User, Role::Superuser],
        &[Role::Staff, Role::Superuser],
        &[Role::User, Role::Staff, Role::Superuser],
    ];

    for allowed in SETS {
        let policy = Policy::AnyOf(allowed);
        for role in Role::ALL {
            assert_eq!(
                authorize(Some(&identity(role)), &policy).is_ok(),
                allowed.contains(&role),
                "role {role} against set {allowed:?}"
            );
        }
    }
}

#[test]
fn test_superuser_set_rejects_staff_but_staff_minimum_accepts_superuser() {
    let staff = identity(Role::Staff);
    let superuser = identity(Role::Superuser);

    assert!(matches!(
        authorize(Some(&staff), &Policy::SUPERUSER_ONLY),
        Err(AuthError::Forbidden { .. })
    ));
    assert!(authorize(Some(&superuser), &Policy::STAFF_OR_ABOVE).is_ok());

    // A set that lists only STAFF does not let SUPERUSER through.
    assert!(authorize(Some(&superuser), &Policy::STAFF_ONLY).is_err());
    assert!(authorize(Some(&staff), &Policy::STAFF_ONLY).is_ok());
}

#[test]
fn test_forbidden_answers_403() {
    let err = authorize(Some(&identity(Role::User)), &Policy::STAFF_OR_ABOVE).unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
}
