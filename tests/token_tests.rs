use cart_guard::{
    TokenCodec,
    error::TokenError,
    models::{Identity, Role},
    token::Claims,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

const SECRET: &str = "token-test-secret";

fn identity(role: Role) -> Identity {
    Identity {
        id: Uuid::from_u128(42),
        email: "someone@example.com".to_string(),
        role,
    }
}

#[test]
fn test_round_trip_returns_the_same_identity_for_every_role() {
    let codec = TokenCodec::new(SECRET);
    let now = Utc::now();

    for role in Role::ALL {
        let original = identity(role);
        let token = codec.issue_at(&original, Duration::minutes(5), now).unwrap();

        let verified = codec
            .verify_at(&token, now + Duration::minutes(4))
            .unwrap();
        assert_eq!(verified, original);
    }
}

#[test]
fn test_token_expires_at_issued_at_plus_ttl() {
    let codec = TokenCodec::new(SECRET);
    let now = Utc::now();
    let token = codec
        .issue_at(&identity(Role::User), Duration::seconds(30), now)
        .unwrap();

    assert_eq!(
        codec.verify_at(&token, now + Duration::seconds(30)),
        Err(TokenError::Expired)
    );
    assert_eq!(
        codec.verify_at(&token, now + Duration::hours(2)),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_zero_ttl_token_is_already_expired() {
    let codec = TokenCodec::new(SECRET);
    let token = codec.issue(&identity(Role::User), Duration::zero()).unwrap();

    assert_eq!(codec.verify(&token), Err(TokenError::Expired));
}

#[test]
fn test_token_signed_with_other_secret_has_invalid_signature() {
    let issuer = TokenCodec::new("some-other-secret");
    let token = issuer
        .issue(&identity(Role::Superuser), Duration::hours(1))
        .unwrap();

    let verifier = TokenCodec::new(SECRET);
    assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let codec = TokenCodec::new(SECRET);
    let token = codec
        .issue(&identity(Role::User), Duration::hours(1))
        .unwrap();

    // Swap in the payload of a SUPERUSER token while keeping the USER signature.
    let forged_source = codec
        .issue(&identity(Role::Superuser), Duration::hours(1))
        .unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();
    let forged_payload = forged_source.split('.').nth(1).unwrap();
    parts[1] = forged_payload;
    let forged = parts.join(".");

    assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
}

#[test]
fn test_garbage_is_malformed() {
    let codec = TokenCodec::new(SECRET);

    assert_eq!(codec.verify("not-a-token"), Err(TokenError::Malformed));
    assert_eq!(codec.verify("a.b.c"), Err(TokenError::Malformed));
    assert_eq!(codec.verify(""), Err(TokenError::Malformed));
}

#[test]
fn test_claims_with_unknown_role_are_malformed() {
    #[derive(serde::Serialize)]
    struct LooseClaims {
        id: Uuid,
        email: String,
        role: String,
        iat: i64,
        exp: i64,
    }

    let now = Utc::now().timestamp();
    let claims = LooseClaims {
        id: Uuid::new_v4(),
        email: "x@example.com".to_string(),
        role: "ADMIN".to_string(),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert_eq!(
        TokenCodec::new(SECRET).verify(&token),
        Err(TokenError::Malformed)
    );
}

#[test]
fn test_token_embeds_identity_fields_and_expiry() {
    let codec = TokenCodec::new(SECRET);
    let now = Utc::now();
    let original = identity(Role::Staff);
    let token = codec.issue_at(&original, Duration::hours(1), now).unwrap();

    let mut validation = jsonwebtoken::Validation::default();
    validation.validate_exp = false;
    let data = jsonwebtoken::decode::<Claims>(
        &token,
        &jsonwebtoken::DecodingKey::from_secret(SECRET.as_bytes()),
        &validation,
    )
    .unwrap();

    assert_eq!(data.claims.id, original.id);
    assert_eq!(data.claims.email, original.email);
    assert_eq!(data.claims.role, Role::Staff);
    assert_eq!(data.claims.iat, now.timestamp());
    assert_eq!(data.claims.exp, now.timestamp() + 3600);
}

#[test]
fn test_missing_secret_is_a_config_error() {
    let codec = TokenCodec::new("");

    assert_eq!(
        codec.issue(&identity(Role::User), Duration::hours(1)),
        Err(TokenError::Config)
    );

    let token = TokenCodec::new(SECRET)
        .issue(&identity(Role::User), Duration::hours(1))
        .unwrap();
    assert_eq!(codec.verify(&token), Err(TokenError::Config));
}
