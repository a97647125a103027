use anyhow::Result;
use chrono::Duration;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use tracing::info;

use crate::entities::{mechanics, users};
use crate::entities::users::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::mechanic::BoundingBox;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(std::time::Duration::from_secs(10))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .idle_timeout(std::time::Duration::from_secs(300))
            .max_lifetime(std::time::Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn otp_repo(&self) -> repositories::otp::OtpRepository {
        repositories::otp::OtpRepository::new(self.conn.clone())
    }

    fn refresh_token_repo(&self) -> repositories::refresh_token::RefreshTokenRepository {
        repositories::refresh_token::RefreshTokenRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn mechanic_repo(&self) -> repositories::mechanic::MechanicRepository {
        repositories::mechanic::MechanicRepository::new(self.conn.clone())
    }

    fn rate_limit_repo(&self) -> repositories::rate_limit::RateLimitRepository {
        repositories::rate_limit::RateLimitRepository::new(self.conn.clone())
    }

    // ========== OTP ==========

    pub async fn save_otp(&self, phone: &str, code: &str, role: Role, ttl: Duration) -> Result<()> {
        self.otp_repo().save(phone, code, role, ttl).await
    }

    pub async fn consume_otp(&self, phone: &str, code: &str) -> Result<Option<Role>> {
        self.otp_repo().consume(phone, code).await
    }

    pub async fn purge_expired_otps(&self) -> Result<u64> {
        self.otp_repo().purge_expired().await
    }

    // ========== Refresh tokens ==========

    pub async fn store_refresh_token(
        &self,
        user_id: &str,
        raw_token: &str,
        ttl: Duration,
    ) -> Result<()> {
        self.refresh_token_repo().store(user_id, raw_token, ttl).await
    }

    pub async fn redeem_refresh_token(&self, raw_token: &str) -> Result<Option<String>> {
        self.refresh_token_repo().redeem(raw_token).await
    }

    pub async fn revoke_refresh_token(&self, raw_token: &str) -> Result<()> {
        self.refresh_token_repo().revoke(raw_token).await
    }

    pub async fn purge_expired_refresh_tokens(&self) -> Result<u64> {
        self.refresh_token_repo().purge_expired().await
    }

    // ========== Users ==========

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn find_or_create_user(&self, phone: &str, role: Role) -> Result<users::Model> {
        self.user_repo().find_or_create(phone, role).await
    }

    // ========== Mechanics ==========

    pub async fn add_mechanic(
        &self,
        user_id: &str,
        workshop_name: &str,
        latitude: f64,
        longitude: f64,
        online: bool,
        approved: bool,
    ) -> Result<mechanics::Model> {
        self.mechanic_repo()
            .add(user_id, workshop_name, latitude, longitude, online, approved)
            .await
    }

    pub async fn find_available_mechanics_in_box(
        &self,
        bbox: BoundingBox,
    ) -> Result<Vec<mechanics::Model>> {
        self.mechanic_repo().find_available_in_box(bbox).await
    }

    // ========== Rate limiting ==========

    pub async fn register_rate_limited_attempt(
        &self,
        bucket: &str,
        window: Duration,
    ) -> Result<i32> {
        self.rate_limit_repo().register(bucket, window).await
    }

    pub async fn purge_expired_rate_windows(&self) -> Result<u64> {
        self.rate_limit_repo().purge_expired().await
    }
}
