//! Obligation entity - One period's due amount for one member and due type.
//!
//! `amount_paid + amount_remaining == amount_expected` holds for every
//! non-cancelled row. Status is never stored; it is derived on read by
//! [`crate::core::status::derive_status`]. `version` is bumped on every
//! mutation and guards concurrent payments.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Obligation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "obligations")]
pub struct Model {
    /// Unique identifier for the obligation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Period the obligation belongs to, formatted `YYYY-MM`
    pub period: String,
    /// Member who owes the amount
    pub member_id: i64,
    /// Catalog entry this obligation was generated from
    pub due_type_id: i64,
    /// Member the due is collected for (assistance dues)
    pub beneficiary_member_id: Option<i64>,
    /// Assistance case this obligation was generated for
    pub assistance_case_id: Option<i64>,
    /// Amount owed for the period
    #[sea_orm(column_type = "Double")]
    pub amount_expected: Decimal,
    /// Amount settled so far
    #[sea_orm(column_type = "Double")]
    pub amount_paid: Decimal,
    /// Amount still owed
    #[sea_orm(column_type = "Double")]
    pub amount_remaining: Decimal,
    /// Shared due date of the generation run
    pub due_date: Date,
    /// Cancelled obligations are excluded from every total
    pub cancelled: bool,
    /// Optimistic concurrency counter
    pub version: i32,
    /// One row per member, due type, period and assistance case
    #[sea_orm(unique)]
    pub dedup_key: String,
    /// When the obligation was generated
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Obligation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each obligation belongs to one due type
    #[sea_orm(
        belongs_to = "super::due_type::Entity",
        from = "Column::DueTypeId",
        to = "super::due_type::Column::Id"
    )]
    DueType,
    /// One obligation can receive many payment allocations
    #[sea_orm(has_many = "super::payment_allocation::Entity")]
    Allocations,
}

impl Related<super::due_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DueType.def()
    }
}

impl Related<super::payment_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Builds the value stored in `dedup_key`.
#[must_use]
pub fn dedup_key(
    member_id: i64,
    due_type_id: i64,
    period: &str,
    assistance_case_id: Option<i64>,
) -> String {
    assistance_case_id.map_or_else(
        || format!("{member_id}:{due_type_id}:{period}"),
        |case_id| format!("{member_id}:{due_type_id}:{period}:{case_id}"),
    )
}
