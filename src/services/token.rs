use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::entities::users::Role;

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. The signature proves provenance;
/// single-use is enforced separately against the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Random id so two tokens minted in the same second still differ.
    pub jti: String,
}

/// Outcome of checking an access token at the edge. `Expired` means the
/// signature verified but the token is past its lifetime, which callers
/// may treat more leniently than an outright forgery.
#[derive(Debug, Clone)]
pub enum TokenCheck {
    Valid(AccessClaims),
    Expired,
    Invalid,
}

#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, user_id: &str, role: Role) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    pub fn issue_refresh_token(&self, user_id: &str) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
    }

    /// Strict verification, used by request auth. Expired and invalid
    /// collapse to `None`.
    #[must_use]
    pub fn verify_access_token(&self, token: &str) -> Option<AccessClaims> {
        match self.check_access_token(token) {
            TokenCheck::Valid(claims) => Some(claims),
            TokenCheck::Expired | TokenCheck::Invalid => None,
        }
    }

    /// Lenient classification, used by the edge gate to distinguish a
    /// stale-but-genuine token from garbage.
    #[must_use]
    pub fn check_access_token(&self, token: &str) -> TokenCheck {
        let validation = Validation::new(Algorithm::HS256);

        match decode::<AccessClaims>(token, &self.access_decoding, &validation) {
            Ok(data) => TokenCheck::Valid(data.claims),
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => TokenCheck::Expired,
            Err(_) => TokenCheck::Invalid,
        }
    }

    #[must_use]
    pub fn verify_refresh_token(&self, token: &str) -> Option<RefreshClaims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .ok()
    }
}
