//! Shared test utilities for the dues ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

use crate::{
    config::settings::Settings,
    core::{
        catalog::{self, NewDueType},
        collaborators::StaticMemberDirectory,
        generation::{GenerationRequest, GenerationResult, generate_obligations},
        period::Period,
    },
    entities::{CaseStatus, DueCategory, EventType, assistance_case, due_type, obligation},
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates the flat monthly fee.
///
/// # Defaults
/// * `name`: "Monthly fee"
/// * `amount`: 15
/// * `order`: 1
/// * `mandatory`: true
pub async fn create_flat_fee(db: &DatabaseConnection) -> Result<due_type::Model> {
    create_custom_due_type(db, "Monthly fee", DueCategory::FlatMonthly, dec!(15), 1).await
}

/// Creates a due type with custom parameters. Not mandatory, not exempt.
pub async fn create_custom_due_type(
    db: &DatabaseConnection,
    name: &str,
    category: DueCategory,
    amount: Decimal,
    order: i32,
) -> Result<due_type::Model> {
    catalog::create_due_type(
        db,
        NewDueType {
            name: name.to_string(),
            amount,
            category,
            mandatory: category == DueCategory::FlatMonthly,
            order,
            beneficiary_exempt: false,
        },
    )
    .await
}

/// Creates the "Birth assistance" due type, collected at 2.50 per member.
pub async fn create_assistance_type(
    db: &DatabaseConnection,
    beneficiary_exempt: bool,
) -> Result<due_type::Model> {
    catalog::create_due_type(
        db,
        NewDueType {
            name: "Birth assistance".to_string(),
            amount: dec!(2.5),
            category: DueCategory::Assistance,
            mandatory: false,
            order: 10,
            beneficiary_exempt,
        },
    )
    .await
}

/// Inserts an unpaid obligation due on the last day of `period`.
pub async fn insert_obligation(
    db: &DatabaseConnection,
    member_id: i64,
    due_type_id: i64,
    period: &str,
    amount_expected: Decimal,
) -> Result<obligation::Model> {
    let parsed: Period = period.parse()?;
    let key = obligation::dedup_key(member_id, due_type_id, period, None);
    obligation::ActiveModel {
        period: Set(parsed.to_string()),
        member_id: Set(member_id),
        due_type_id: Set(due_type_id),
        beneficiary_member_id: Set(None),
        assistance_case_id: Set(None),
        amount_expected: Set(amount_expected),
        amount_paid: Set(Decimal::ZERO),
        amount_remaining: Set(amount_expected),
        due_date: Set(parsed.last_day()),
        cancelled: Set(false),
        version: Set(0),
        dedup_key: Set(key),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a `Pending` birth case with the given fixed amount.
pub async fn create_test_case(
    db: &DatabaseConnection,
    member_id: i64,
    due_type_id: i64,
    fixed_amount: Decimal,
) -> Result<assistance_case::Model> {
    assistance_case::ActiveModel {
        member_id: Set(member_id),
        event_type: Set(EventType::Birth),
        event_date: Set(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap_or_default()),
        linked_due_type_id: Set(due_type_id),
        fixed_amount: Set(fixed_amount),
        status: Set(CaseStatus::Pending),
        assigned_period: Set(None),
        description: Set(None),
        payout_executed_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Runs a generation for `period` over a fixed member list with default settings.
pub async fn generate_for(
    db: &DatabaseConnection,
    period: &str,
    due_type_ids: Vec<i64>,
    member_ids: Vec<i64>,
) -> Result<GenerationResult> {
    generate_obligations(
        db,
        &GenerationRequest {
            period: period.parse()?,
            due_type_ids,
        },
        &StaticMemberDirectory::new(member_ids),
        &Settings::default(),
    )
    .await
}
