use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sha2::{Digest, Sha256};

use crate::entities::refresh_tokens;

/// SHA-256 hex digest of a raw refresh token. Only the digest is ever
/// persisted, limiting blast radius if storage is compromised.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RefreshTokenRepository {
    conn: DatabaseConnection,
}

impl RefreshTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn store(&self, user_id: &str, raw_token: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        refresh_tokens::ActiveModel {
            token_hash: Set(hash_token(raw_token)),
            user_id: Set(user_id.to_string()),
            expires_at: Set(now + ttl),
            created_at: Set(now.to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to store refresh token")?;

        Ok(())
    }

    /// Claim a refresh token for rotation. The DELETE is the atomic claim:
    /// of two racing redeems only one observes `rows_affected == 1`, so a
    /// token is redeemable at most once.
    pub async fn redeem(&self, raw_token: &str) -> Result<Option<String>> {
        let row = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::TokenHash.eq(hash_token(raw_token)))
            .filter(refresh_tokens::Column::ExpiresAt.gt(Utc::now()))
            .one(&self.conn)
            .await
            .context("Failed to look up refresh token")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id = row.user_id.clone();
        let result = refresh_tokens::Entity::delete_by_id(row.id)
            .exec(&self.conn)
            .await
            .context("Failed to claim refresh token")?;

        if result.rows_affected == 1 {
            Ok(Some(user_id))
        } else {
            // Lost the race to a concurrent redeem.
            Ok(None)
        }
    }

    /// Logout. Revoking an already-absent token is not an error.
    pub async fn revoke(&self, raw_token: &str) -> Result<()> {
        refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::TokenHash.eq(hash_token(raw_token)))
            .exec(&self.conn)
            .await
            .context("Failed to revoke refresh token")?;

        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to purge expired refresh tokens")?;

        Ok(result.rows_affected)
    }
}
