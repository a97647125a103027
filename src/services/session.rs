use chrono::Duration;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::db::Store;
use crate::entities::users::{self, Role};
use crate::services::token::TokenService;

/// Fixed code handed out when demo OTP mode is on.
const DEMO_OTP_CODE: &str = "123456";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    #[error("Refresh token rejected")]
    RefreshRejected,

    #[error("Too many OTP requests, try again later")]
    RateLimited,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A freshly minted session: both tokens plus the user they belong to.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: users::Model,
}

#[derive(Clone)]
pub struct SessionService {
    store: Store,
    tokens: TokenService,
    otp_ttl: Duration,
    demo_otp: bool,
    throttle_max_attempts: i32,
    throttle_window: Duration,
}

impl SessionService {
    #[must_use]
    pub fn new(store: Store, tokens: TokenService, auth: &AuthConfig) -> Self {
        Self {
            store,
            tokens,
            otp_ttl: Duration::minutes(auth.otp_ttl_minutes),
            demo_otp: auth.demo_otp,
            throttle_max_attempts: auth.otp_throttle.max_attempts,
            throttle_window: Duration::seconds(auth.otp_throttle.window_seconds),
        }
    }

    /// Issue an OTP for the phone. Returns the code in demo mode so the
    /// caller can echo it; in production mode the code only travels out
    /// of band and `None` comes back.
    pub async fn request_otp(
        &self,
        phone: &str,
        role: Role,
    ) -> Result<Option<String>, SessionError> {
        let phone = normalize_phone(phone)?;

        let bucket = format!("otp:{phone}");
        let attempts = self
            .store
            .register_rate_limited_attempt(&bucket, self.throttle_window)
            .await?;

        if attempts > self.throttle_max_attempts {
            warn!(phone = %phone, attempts, "OTP request throttled");
            return Err(SessionError::RateLimited);
        }

        let code = if self.demo_otp {
            DEMO_OTP_CODE.to_string()
        } else {
            generate_otp_code()
        };

        self.store.save_otp(&phone, &code, role, self.otp_ttl).await?;

        info!(phone = %phone, role = %role, "OTP issued");

        if self.demo_otp {
            Ok(Some(code))
        } else {
            // Delivery hook (SMS gateway) goes here; out of band for now.
            Ok(None)
        }
    }

    /// Verify the code and open a session. First verification for an
    /// unknown phone creates the account with the role the OTP was
    /// requested for.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<SessionTokens, SessionError> {
        let phone = normalize_phone(phone)?;

        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(SessionError::Validation(
                "OTP must be a 6-digit code".to_string(),
            ));
        }

        let Some(role) = self.store.consume_otp(&phone, code).await? else {
            debug!(phone = %phone, "OTP verification failed");
            return Err(SessionError::InvalidOrExpiredOtp);
        };

        let user = self.store.find_or_create_user(&phone, role).await?;

        info!(user_id = %user.id, role = %user.role, "session opened");

        self.issue_session(&user).await
    }

    /// Rotate a refresh token: the presented token is spent exactly once
    /// and a new pair comes back. A replayed token fails the redeem and
    /// is rejected.
    pub async fn refresh(&self, raw_refresh: &str) -> Result<SessionTokens, SessionError> {
        let Some(claims) = self.tokens.verify_refresh_token(raw_refresh) else {
            return Err(SessionError::RefreshRejected);
        };

        let Some(user_id) = self.store.redeem_refresh_token(raw_refresh).await? else {
            warn!(user_id = %claims.sub, "refresh token replay or unknown token");
            return Err(SessionError::RefreshRejected);
        };

        if user_id != claims.sub {
            return Err(SessionError::RefreshRejected);
        }

        let Some(user) = self.store.get_user_by_id(&user_id).await? else {
            return Err(SessionError::RefreshRejected);
        };

        debug!(user_id = %user.id, "refresh token rotated");

        self.issue_session(&user).await
    }

    /// Drop the presented refresh token. Unknown tokens are a no-op, so
    /// logout never fails for an already-cleared session.
    pub async fn logout(&self, raw_refresh: &str) -> Result<(), SessionError> {
        self.store.revoke_refresh_token(raw_refresh).await?;
        Ok(())
    }

    async fn issue_session(&self, user: &users::Model) -> Result<SessionTokens, SessionError> {
        let access_token = self.tokens.issue_access_token(&user.id, user.role)?;
        let refresh_token = self.tokens.issue_refresh_token(&user.id)?;

        self.store
            .store_refresh_token(&user.id, &refresh_token, self.tokens.refresh_ttl())
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            user: user.clone(),
        })
    }
}

/// Strip separators, keep an optional leading `+`, and require 10 to 15
/// digits.
fn normalize_phone(raw: &str) -> Result<String, SessionError> {
    let trimmed: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = trimmed.strip_prefix('+').unwrap_or(&trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SessionError::Validation(
            "Phone number must contain only digits".to_string(),
        ));
    }

    if !(10..=15).contains(&digits.len()) {
        return Err(SessionError::Validation(
            "Phone number must be 10 to 15 digits".to_string(),
        ));
    }

    Ok(trimmed)
}

fn generate_otp_code() -> String {
    let mut rng = rand::rng();
    (0..6).map(|_| rng.random_range(0..=9).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_separators() {
        assert_eq!(normalize_phone("98765 43210").unwrap(), "9876543210");
        assert_eq!(normalize_phone("+91-98765-43210").unwrap(), "+919876543210");
    }

    #[test]
    fn test_normalize_phone_rejects_garbage() {
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("98765abc10").is_err());
        assert!(normalize_phone("1234567890123456").is_err());
    }

    #[test]
    fn test_generated_otp_is_six_digits() {
        for _ in 0..20 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
