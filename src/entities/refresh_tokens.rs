use sea_orm::entity::prelude::*;

/// Rotating refresh-token record. The raw token is never persisted, only
/// its SHA-256 hex digest.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub token_hash: String,

    pub user_id: String,

    pub expires_at: DateTimeUtc,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
