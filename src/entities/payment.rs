//! Payment entity - Money received from a member.
//!
//! Each payment records how much went to obligations and how much overflowed
//! into a credit. Settlements and offsets made by the engine itself (credit
//! consumption, assistance netting) are recorded as payments too, with their
//! own [`PaymentMethod`].
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a payment reached the organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "cheque")]
    Cheque,
    #[sea_orm(string_value = "mobile_money")]
    MobileMoney,
    /// Debt netted out of an assistance payout
    #[sea_orm(string_value = "assistance_offset")]
    AssistanceOffset,
    /// Existing credit consumed against obligations
    #[sea_orm(string_value = "credit_offset")]
    CreditOffset,
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member the payment was received from
    pub member_id: i64,
    /// Total amount received
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// External reference (receipt number, transfer id)
    pub reference: Option<String>,
    pub note: Option<String>,
    /// Portion applied to obligations
    #[sea_orm(column_type = "Double")]
    pub applied_amount: Decimal,
    /// Portion converted into a credit
    #[sea_orm(column_type = "Double")]
    pub credit_amount: Decimal,
    /// When the payment was applied
    pub received_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One payment is split into many allocations
    #[sea_orm(has_many = "super::payment_allocation::Entity")]
    Allocations,
}

impl Related<super::payment_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
