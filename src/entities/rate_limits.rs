use sea_orm::entity::prelude::*;

/// Durable request counter with a rolling window, keyed by client
/// identity (e.g. `otp:<phone>`). Backing the limiter with the store
/// keeps it stateless per-process.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_limits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub bucket: String,

    pub count: i32,

    pub window_expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
