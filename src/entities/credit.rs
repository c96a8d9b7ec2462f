//! Credit entity - A member's overpaid balance ("avoir").
//!
//! Credits are only created from overpayments. `remaining_amount` is
//! decremented as the credit is consumed and never grows back.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credits")]
pub struct Model {
    /// Unique identifier for the credit
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member owning the credit
    pub member_id: i64,
    /// Amount when the credit was created
    #[sea_orm(column_type = "Double")]
    pub original_amount: Decimal,
    /// Balance still available
    #[sea_orm(column_type = "Double")]
    pub remaining_amount: Decimal,
    /// Obligation whose settlement overflowed into this credit, if any
    pub source_obligation_id: Option<i64>,
    /// Assistance case the credit originates from, if any
    pub source_assistance_id: Option<i64>,
    /// Payment that produced the overpayment
    pub source_payment_id: Option<i64>,
    /// Optimistic concurrency counter
    pub version: i32,
    /// When the credit was created
    pub created_at: DateTimeUtc,
}

/// Credits reference their source payment loosely; no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
