//! Assistance case entity - A one-off solidarity event for a member.
//!
//! The fixed amount is resolved from configuration when the case is created
//! and frozen once the case leaves `Pending`.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of event an assistance case covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[sea_orm(string_value = "birth")]
    Birth,
    #[sea_orm(string_value = "child_marriage")]
    ChildMarriage,
    #[sea_orm(string_value = "family_bereavement")]
    FamilyBereavement,
    #[sea_orm(string_value = "hall_celebration")]
    HallCelebration,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Lifecycle state of an assistance case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Created, not yet bound to a period
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Bound to a period's obligation batch
    #[sea_orm(string_value = "assigned")]
    Assigned,
    /// Every obligation collected for the case is paid
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Withdrawn before assignment
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Assistance case database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assistance_cases")]
pub struct Model {
    /// Unique identifier for the case
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member the event concerns and who receives the payout
    pub member_id: i64,
    pub event_type: EventType,
    pub event_date: Date,
    /// Assistance due type collected from the group for this case
    pub linked_due_type_id: i64,
    /// Amount owed to the member before netting
    #[sea_orm(column_type = "Double")]
    pub fixed_amount: Decimal,
    pub status: CaseStatus,
    /// Period the case was bound to, formatted `YYYY-MM`
    pub assigned_period: Option<String>,
    pub description: Option<String>,
    /// Set once the payout was disbursed
    pub payout_executed_at: Option<DateTimeUtc>,
    /// When the case was opened
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `AssistanceCase` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A case has at most one executed payout
    #[sea_orm(has_one = "super::payout::Entity")]
    Payout,
}

impl Related<super::payout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payout.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
