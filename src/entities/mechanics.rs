use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Mechanic service profile. Only rows that are simultaneously `online`
/// and `approved` are eligible for proximity matching.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "mechanics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: String,

    pub workshop_name: String,

    pub latitude: f64,

    pub longitude: f64,

    pub online: bool,

    /// Verification status set by platform admins.
    pub approved: bool,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
