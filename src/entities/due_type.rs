//! Due type entity - One entry of the dues catalog.
//!
//! A due type describes a recurring or assistance-linked fee. Its amount is
//! copied onto every obligation generated from it, so later edits only affect
//! future obligations. Due types are never deleted, only deactivated.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of fee a due type represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DueCategory {
    /// Base monthly membership fee
    #[sea_orm(string_value = "flat_monthly")]
    FlatMonthly,
    /// Contribution collected for an assistance case
    #[sea_orm(string_value = "assistance")]
    Assistance,
    /// Anything else billed per period
    #[sea_orm(string_value = "misc")]
    Misc,
}

/// Due type database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "due_types")]
pub struct Model {
    /// Unique identifier for the due type
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across the catalog
    #[sea_orm(unique)]
    pub name: String,
    /// Amount billed per member and period
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    /// Whether members are expected to pay it every period
    pub mandatory: bool,
    /// Inactive types cannot be selected for generation
    pub active: bool,
    /// Settlement priority inside a period (ascending)
    pub sort_order: i32,
    /// Fee category, immutable after creation
    pub category: DueCategory,
    /// Waived for the member an assistance case concerns
    pub beneficiary_exempt: bool,
    /// When the due type was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DueType` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One due type has many obligations
    #[sea_orm(has_many = "super::obligation::Entity")]
    Obligations,
}

impl Related<super::obligation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obligations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
