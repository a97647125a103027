use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::otp_codes;
use crate::entities::users::Role;

pub struct OtpRepository {
    conn: DatabaseConnection,
}

impl OtpRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Replace-not-append: a new send supersedes any prior OTP for the
    /// phone, so at most one live code exists at a time.
    pub async fn save(&self, phone: &str, code: &str, role: Role, ttl: Duration) -> Result<()> {
        otp_codes::Entity::delete_many()
            .filter(otp_codes::Column::Phone.eq(phone))
            .exec(&self.conn)
            .await
            .context("Failed to delete superseded OTP rows")?;

        let now = Utc::now();
        otp_codes::ActiveModel {
            phone: Set(phone.to_string()),
            code: Set(code.to_string()),
            role: Set(role),
            expires_at: Set(now + ttl),
            verified: Set(false),
            created_at: Set(now.to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert OTP row")?;

        Ok(())
    }

    /// Check-and-mark as a single conditional UPDATE: two concurrent
    /// verifies cannot both succeed against the same code, and verified
    /// or expired rows never match again. On success, returns the role
    /// the code was requested for.
    pub async fn consume(&self, phone: &str, code: &str) -> Result<Option<Role>> {
        let result = otp_codes::Entity::update_many()
            .col_expr(otp_codes::Column::Verified, Expr::value(true))
            .filter(otp_codes::Column::Phone.eq(phone))
            .filter(otp_codes::Column::Code.eq(code))
            .filter(otp_codes::Column::Verified.eq(false))
            .filter(otp_codes::Column::ExpiresAt.gt(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to consume OTP")?;

        if result.rows_affected != 1 {
            return Ok(None);
        }

        let row = otp_codes::Entity::find()
            .filter(otp_codes::Column::Phone.eq(phone))
            .filter(otp_codes::Column::Code.eq(code))
            .one(&self.conn)
            .await
            .context("Failed to load consumed OTP row")?;

        Ok(row.map(|r| r.role))
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = otp_codes::Entity::delete_many()
            .filter(otp_codes::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to purge expired OTP rows")?;

        Ok(result.rows_affected)
    }
}
