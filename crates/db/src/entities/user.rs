//! User entity.
//!
//! Credential handling (passwords, token issuance) lives outside this
//! service; the `token` column only resolves already-issued sessions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub username: String,

    /// Display name
    pub name: String,

    /// University email address
    #[sea_orm(unique)]
    pub email: String,

    pub role: UserRole,

    /// Poll IDs a sub-admin may manage (JSON array of strings).
    /// NULL means the role's default scope applies.
    #[sea_orm(column_type = "Json", nullable)]
    pub managed_poll_ids: Option<JsonValue>,

    /// Opaque session token (issued externally)
    #[sea_orm(unique, nullable)]
    pub token: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

/// User role. Authorization never matches on these directly; it goes
/// through the capability resolution in the core crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "faculty")]
    Faculty,
    #[sea_orm(string_value = "sub-admin")]
    SubAdmin,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "super-admin")]
    SuperAdmin,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_many = "super::feedback::Entity")]
    Feedback,
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::feedback::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feedback.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
