//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    pub poll_type: PollType,

    pub target_audience: TargetAudience,

    pub status: PollStatus,

    /// Voting deadline. Active polls past this instant are swept to
    /// CLOSED on the next list/detail read.
    pub expires_at: DateTimeWithTimeZone,

    /// Whether tallies are visible to non-admin roles. A published poll
    /// is always CLOSED.
    pub results_published: bool,

    /// Creating user. Weak reference, lookup only.
    pub created_by: String,

    pub created_at: DateTimeWithTimeZone,
}

/// How many options one ballot may select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PollType {
    #[sea_orm(string_value = "SINGLE_CHOICE")]
    #[serde(rename = "SINGLE_CHOICE")]
    SingleChoice,
    #[sea_orm(string_value = "MULTIPLE_CHOICE")]
    #[serde(rename = "MULTIPLE_CHOICE")]
    MultipleChoice,
}

/// Which role-based audience the poll is shown to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TargetAudience {
    #[sea_orm(string_value = "STUDENT")]
    #[serde(rename = "STUDENT")]
    Student,
    #[sea_orm(string_value = "FACULTY")]
    #[serde(rename = "FACULTY")]
    Faculty,
    #[sea_orm(string_value = "ALL")]
    #[serde(rename = "ALL")]
    All,
}

/// Poll lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PollStatus {
    #[sea_orm(string_value = "ACTIVE")]
    #[serde(rename = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "CLOSED")]
    #[serde(rename = "CLOSED")]
    Closed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_many = "super::feedback::Entity")]
    Feedback,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
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
