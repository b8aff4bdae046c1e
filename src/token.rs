use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{
    error::TokenError,
    models::{Identity, Role},
};

/// Claims
///
/// Payload signed into every credential token. `iat` and `exp` are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
            role: self.role,
        }
    }
}

/// TokenCodec
///
/// Issues and verifies HS256-signed identity tokens. Holds nothing but the signing
/// secret, so it is cheap to clone into every request.
///
/// Expiry is checked here rather than by `jsonwebtoken` so that the boundary is
/// exact (`now >= exp` is expired) and so tests can pin the clock via `verify_at`.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn secret(&self) -> Result<&[u8], TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::Config);
        }
        Ok(self.secret.as_bytes())
    }

    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, ttl, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let key = EncodingKey::from_secret(self.secret()?);
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|err| {
            tracing::error!(error = %err, "failed to sign token");
            TokenError::Config
        })
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let key = DecodingKey::from_secret(self.secret()?);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|err| match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::from_u128(7),
            email: "seven@example.com".to_string(),
            role: Role::Staff,
        }
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let codec = TokenCodec::new("unit-secret");
        let now = Utc::now();
        let token = codec
            .issue_at(&identity(), Duration::seconds(60), now)
            .unwrap();

        assert!(codec.verify_at(&token, now + Duration::seconds(59)).is_ok());
        assert_eq!(
            codec.verify_at(&token, now + Duration::seconds(60)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let codec = TokenCodec::new("very-secret");
        assert!(!format!("{codec:?}").contains("very-secret"));
    }
}
