use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::users;
use crate::entities::users::Role;

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Phone.eq(phone))
            .one(&self.conn)
            .await
            .context("Failed to query user by phone")
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")
    }

    /// Low-friction signup merged into login: the first successful OTP for
    /// an unknown phone silently provisions an account with the requested
    /// role.
    pub async fn find_or_create(&self, phone: &str, role: Role) -> Result<users::Model> {
        if let Some(user) = self.get_by_phone(phone).await? {
            return Ok(user);
        }

        let now = chrono::Utc::now().to_rfc3339();
        users::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            phone: Set(phone.to_string()),
            role: Set(role),
            name: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        }
        .insert(&self.conn)
        .await
        .context("Failed to provision user")
    }
}
