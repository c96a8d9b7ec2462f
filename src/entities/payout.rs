//! Payout entity - The expense recorded when an assistance payout is disbursed.
//!
//! `assistance_case_id` is unique: a case can be paid out once.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payout database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payouts")]
pub struct Model {
    /// Unique identifier for the payout
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub assistance_case_id: i64,
    /// Member receiving the money
    pub member_id: i64,
    #[sea_orm(column_type = "Double")]
    pub fixed_amount: Decimal,
    #[sea_orm(column_type = "Double")]
    pub debt_deducted: Decimal,
    #[sea_orm(column_type = "Double")]
    pub unpaid_deducted: Decimal,
    #[sea_orm(column_type = "Double")]
    pub credit_applied: Decimal,
    /// Amount actually disbursed
    #[sea_orm(column_type = "Double")]
    pub net_amount: Decimal,
    pub executed_at: DateTimeUtc,
}

/// Defines relationships between Payout and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payout belongs to one assistance case
    #[sea_orm(
        belongs_to = "super::assistance_case::Entity",
        from = "Column::AssistanceCaseId",
        to = "super::assistance_case::Column::Id"
    )]
    AssistanceCase,
}

impl Related<super::assistance_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssistanceCase.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
