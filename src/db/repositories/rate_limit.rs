use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::rate_limits;

pub struct RateLimitRepository {
    conn: DatabaseConnection,
}

impl RateLimitRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Increment-and-expire: bump the counter for `bucket` if its window
    /// is still open, otherwise start a fresh window. Returns the count
    /// within the current window. The increment is a single UPDATE, so
    /// concurrent requests are counted exactly.
    pub async fn register(&self, bucket: &str, window: Duration) -> Result<i32> {
        let now = Utc::now();

        let bumped = rate_limits::Entity::update_many()
            .col_expr(
                rate_limits::Column::Count,
                Expr::col(rate_limits::Column::Count).add(1),
            )
            .filter(rate_limits::Column::Bucket.eq(bucket))
            .filter(rate_limits::Column::WindowExpiresAt.gt(now))
            .exec(&self.conn)
            .await
            .context("Failed to bump rate-limit counter")?;

        if bumped.rows_affected == 0 {
            rate_limits::Entity::delete_many()
                .filter(rate_limits::Column::Bucket.eq(bucket))
                .exec(&self.conn)
                .await
                .context("Failed to clear stale rate-limit window")?;

            let inserted = rate_limits::ActiveModel {
                bucket: Set(bucket.to_string()),
                count: Set(1),
                window_expires_at: Set(now + window),
                ..Default::default()
            }
            .insert(&self.conn)
            .await;

            // A racing insert loses to the unique index; count the
            // winner's row instead.
            if inserted.is_ok() {
                return Ok(1);
            }
        }

        let row = rate_limits::Entity::find()
            .filter(rate_limits::Column::Bucket.eq(bucket))
            .one(&self.conn)
            .await
            .context("Failed to read rate-limit counter")?;

        Ok(row.map_or(1, |r| r.count))
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = rate_limits::Entity::delete_many()
            .filter(rate_limits::Column::WindowExpiresAt.lte(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to purge expired rate-limit windows")?;

        Ok(result.rows_affected)
    }
}
