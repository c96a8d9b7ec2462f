//! Assistance case lifecycle.
//!
//! Cases move `Pending → Assigned → Paid` or `Pending → Cancelled`. `Paid` is
//! never set directly: it follows from every obligation collected for the case
//! being paid, which [`refresh_case_settlement`] checks after each settlement.

use crate::{
    core::{
        catalog,
        collaborators::{AssistanceAmounts, Clock},
        money,
        period::Period,
    },
    entities::{
        AssistanceCase, CaseStatus, DueCategory, EventType, Obligation, assistance_case,
        obligation,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Input for [`create_assistance_case`].
#[derive(Debug, Clone)]
pub struct NewAssistanceCase {
    pub member_id: i64,
    pub event_type: EventType,
    /// Assistance due type collected from the group for this case
    pub due_type_id: i64,
    pub event_date: NaiveDate,
    pub description: Option<String>,
}

fn invalid_state(case: &assistance_case::Model, expected: &str) -> Error {
    Error::InvalidState {
        entity: "assistance case",
        id: case.id,
        current: case.status.to_string(),
        expected: expected.to_string(),
    }
}

fn guard_error(err: DbErr, case: &assistance_case::Model, expected: &str) -> Error {
    match err {
        DbErr::RecordNotUpdated => invalid_state(case, expected),
        other => other.into(),
    }
}

/// Finds a case by id.
pub async fn get_assistance_case<C>(
    db: &C,
    case_id: i64,
) -> Result<Option<assistance_case::Model>>
where
    C: ConnectionTrait,
{
    AssistanceCase::find_by_id(case_id)
        .one(db)
        .await
        .map(|case| case.map(normalized))
        .map_err(Into::into)
}

pub(crate) async fn require_case<C>(db: &C, case_id: i64) -> Result<assistance_case::Model>
where
    C: ConnectionTrait,
{
    get_assistance_case(db, case_id)
        .await?
        .ok_or_else(|| Error::not_found("assistance case", case_id))
}

fn normalized(mut case: assistance_case::Model) -> assistance_case::Model {
    case.fixed_amount = money::normalize(case.fixed_amount);
    case
}

/// Lists every case of a member, newest first.
pub async fn list_member_cases<C>(db: &C, member_id: i64) -> Result<Vec<assistance_case::Model>>
where
    C: ConnectionTrait,
{
    let cases = AssistanceCase::find()
        .filter(assistance_case::Column::MemberId.eq(member_id))
        .order_by_desc(assistance_case::Column::EventDate)
        .order_by_desc(assistance_case::Column::Id)
        .all(db)
        .await?;
    Ok(cases.into_iter().map(normalized).collect())
}

async fn resolve_fixed_amount<C, A>(db: &C, due_type_id: i64, amounts: &A) -> Result<Decimal>
where
    C: ConnectionTrait,
    A: AssistanceAmounts,
{
    let due_type = catalog::require_due_type(db, due_type_id).await?;
    if due_type.category != DueCategory::Assistance {
        return Err(Error::InvalidInput {
            message: format!("Due type '{}' is not an assistance due type", due_type.name),
        });
    }
    if !due_type.active {
        return Err(Error::InvalidInput {
            message: format!("Due type '{}' is inactive", due_type.name),
        });
    }

    let amount = amounts
        .fixed_amount(due_type_id)
        .ok_or(Error::NoFixedAmountConfigured { due_type_id })?;
    money::ensure_non_negative(amount)
}

/// Opens a `Pending` case with the fixed amount configured for its due type.
#[instrument(skip(db, amounts))]
pub async fn create_assistance_case<C, A>(
    db: &C,
    new: NewAssistanceCase,
    amounts: &A,
) -> Result<assistance_case::Model>
where
    C: ConnectionTrait,
    A: AssistanceAmounts,
{
    if new.member_id <= 0 {
        return Err(Error::InvalidInput {
            message: format!("Invalid member id {}", new.member_id),
        });
    }
    let fixed_amount = resolve_fixed_amount(db, new.due_type_id, amounts).await?;
    let description = new
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let case = assistance_case::ActiveModel {
        member_id: Set(new.member_id),
        event_type: Set(new.event_type),
        event_date: Set(new.event_date),
        linked_due_type_id: Set(new.due_type_id),
        fixed_amount: Set(fixed_amount),
        status: Set(CaseStatus::Pending),
        assigned_period: Set(None),
        description: Set(description),
        payout_executed_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Opened assistance case {} for member {} ({})",
        case.id, case.member_id, case.fixed_amount
    );
    Ok(normalized(case))
}

/// Binds a pending case to a period's obligation batch.
///
/// The period must not be earlier than the current one.
#[instrument(skip(db, clock))]
pub async fn assign_assistance_to_period<C, K>(
    db: &C,
    case_id: i64,
    period: Period,
    clock: &K,
) -> Result<assistance_case::Model>
where
    C: ConnectionTrait,
    K: Clock,
{
    let case = require_case(db, case_id).await?;
    if case.status != CaseStatus::Pending {
        return Err(invalid_state(&case, "pending"));
    }
    let current = clock.current_period();
    if period < current {
        return Err(Error::PastPeriod {
            requested: period,
            current,
        });
    }

    let mut active_model: assistance_case::ActiveModel = case.clone().into();
    active_model.status = Set(CaseStatus::Assigned);
    active_model.assigned_period = Set(Some(period.to_string()));

    let updated = AssistanceCase::update(active_model)
        .filter(assistance_case::Column::Status.eq(CaseStatus::Pending))
        .exec(db)
        .await
        .map_err(|e| guard_error(e, &case, "pending"))?;

    info!("Assistance case {} assigned to period {}", case_id, period);
    Ok(normalized(updated))
}

/// Cancels a case that is still `Pending`.
#[instrument(skip(db))]
pub async fn cancel_assistance_case<C>(db: &C, case_id: i64) -> Result<assistance_case::Model>
where
    C: ConnectionTrait,
{
    let case = require_case(db, case_id).await?;
    if case.status != CaseStatus::Pending {
        return Err(invalid_state(&case, "pending"));
    }

    let mut active_model: assistance_case::ActiveModel = case.clone().into();
    active_model.status = Set(CaseStatus::Cancelled);

    let updated = AssistanceCase::update(active_model)
        .filter(assistance_case::Column::Status.eq(CaseStatus::Pending))
        .exec(db)
        .await
        .map_err(|e| guard_error(e, &case, "pending"))?;

    info!("Assistance case {} cancelled", case_id);
    Ok(normalized(updated))
}

/// Re-reads the configured fixed amount for a pending case.
///
/// Once a case is assigned its amount is frozen.
pub async fn refresh_fixed_amount<C, A>(
    db: &C,
    case_id: i64,
    amounts: &A,
) -> Result<assistance_case::Model>
where
    C: ConnectionTrait,
    A: AssistanceAmounts,
{
    let case = require_case(db, case_id).await?;
    if case.status != CaseStatus::Pending {
        return Err(invalid_state(&case, "pending"));
    }
    let fixed_amount = resolve_fixed_amount(db, case.linked_due_type_id, amounts).await?;

    let mut active_model: assistance_case::ActiveModel = case.clone().into();
    active_model.fixed_amount = Set(fixed_amount);

    AssistanceCase::update(active_model)
        .filter(assistance_case::Column::Status.eq(CaseStatus::Pending))
        .exec(db)
        .await
        .map(normalized)
        .map_err(|e| guard_error(e, &case, "pending"))
}

/// Moves an `Assigned` case to `Paid` once every obligation generated for it
/// is paid. Returns whether the case changed.
pub(crate) async fn refresh_case_settlement<C>(db: &C, case_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let Some(case) = get_assistance_case(db, case_id).await? else {
        return Ok(false);
    };
    if case.status != CaseStatus::Assigned {
        return Ok(false);
    }

    let dues = Obligation::find()
        .filter(obligation::Column::AssistanceCaseId.eq(case_id))
        .filter(obligation::Column::Cancelled.eq(false))
        .all(db)
        .await?;
    if dues.is_empty() || dues.iter().any(|o| o.amount_remaining > Decimal::ZERO) {
        return Ok(false);
    }

    let mut active_model: assistance_case::ActiveModel = case.into();
    active_model.status = Set(CaseStatus::Paid);
    active_model.update(db).await?;
    info!("Assistance case {} fully collected", case_id);
    Ok(true)
}
