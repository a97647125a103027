use sea_orm::entity::prelude::*;

use super::users::Role;

/// One-time password issued for a phone number.
///
/// At most one live (unverified, unexpired) row exists per phone: a new
/// send deletes prior rows before inserting (replace-not-append).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "otp_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub phone: String,

    pub code: String,

    pub role: Role,

    pub expires_at: DateTimeUtc,

    /// Set once on successful verification; verified rows never match again.
    pub verified: bool,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
