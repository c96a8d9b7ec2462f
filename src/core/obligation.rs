//! Obligation record access and version-guarded mutations.
//!
//! Every write to an obligation goes through this module. Writes are
//! conditional on the `version` the caller read, so two transactions working
//! from the same snapshot cannot both apply money to the same row: the loser
//! gets [`Error::ConcurrentModification`] and its transaction rolls back.

use crate::{
    core::{
        collaborators::Clock,
        money,
        status::{ObligationStatus, status_of},
    },
    entities::{DueType, Obligation, due_type, obligation},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{DbErr, QueryOrder, Set, prelude::*};

/// An obligation together with its settlement priority.
#[derive(Debug, Clone)]
pub struct OutstandingObligation {
    pub obligation: obligation::Model,
    /// `order` of the due type, lower settles first within a period
    pub priority: i32,
}

/// An obligation with its derived status, for display and reconciliation.
#[derive(Debug, Clone)]
pub struct ObligationView {
    pub obligation: obligation::Model,
    pub due_type_name: String,
    pub status: ObligationStatus,
}

/// Finds an obligation by id.
pub async fn get_obligation<C>(db: &C, obligation_id: i64) -> Result<Option<obligation::Model>>
where
    C: ConnectionTrait,
{
    Obligation::find_by_id(obligation_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists all obligations of a member, oldest period first, with derived status.
pub async fn list_member_obligations<C, K>(
    db: &C,
    member_id: i64,
    clock: &K,
) -> Result<Vec<ObligationView>>
where
    C: ConnectionTrait,
    K: Clock,
{
    let today = clock.today();
    let rows = Obligation::find()
        .find_also_related(DueType)
        .filter(obligation::Column::MemberId.eq(member_id))
        .order_by_asc(obligation::Column::Period)
        .order_by_asc(obligation::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(obligation, due_type)| {
            let status = status_of(&obligation, today);
            ObligationView {
                due_type_name: due_type.map(|d| d.name).unwrap_or_default(),
                obligation,
                status,
            }
        })
        .collect())
}

/// Loads a member's open obligations in settlement order: oldest period
/// first, then due type `order`, then creation order.
pub(crate) async fn load_outstanding<C>(
    db: &C,
    member_id: i64,
) -> Result<Vec<OutstandingObligation>>
where
    C: ConnectionTrait,
{
    let rows = Obligation::find()
        .find_also_related(DueType)
        .filter(obligation::Column::MemberId.eq(member_id))
        .filter(obligation::Column::Cancelled.eq(false))
        .filter(obligation::Column::AmountRemaining.gt(Decimal::ZERO))
        .all(db)
        .await?;

    let mut outstanding: Vec<OutstandingObligation> = rows
        .into_iter()
        .map(|(obligation, due_type)| OutstandingObligation {
            priority: due_type.as_ref().map_or(i32::MAX, |d| d.sort_order),
            obligation: normalized(obligation),
        })
        .collect();

    outstanding.sort_by(|a, b| {
        a.obligation
            .period
            .cmp(&b.obligation.period)
            .then(a.priority.cmp(&b.priority))
            .then(a.obligation.id.cmp(&b.obligation.id))
    });
    Ok(outstanding)
}

/// Ids of every `FlatMonthly` due type, active or not.
pub(crate) async fn flat_monthly_type_ids<C>(db: &C) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let types = DueType::find()
        .filter(due_type::Column::Category.eq(due_type::DueCategory::FlatMonthly))
        .all(db)
        .await?;
    Ok(types.into_iter().map(|d| d.id).collect())
}

/// Rounds the stored amounts back to cents.
pub(crate) fn normalized(mut model: obligation::Model) -> obligation::Model {
    model.amount_expected = money::normalize(model.amount_expected);
    model.amount_paid = money::normalize(model.amount_paid);
    model.amount_remaining = money::normalize(model.amount_remaining);
    model
}

fn guard_error(err: DbErr, obligation_id: i64) -> Error {
    match err {
        DbErr::RecordNotUpdated => Error::ConcurrentModification {
            entity: "obligation",
            id: obligation_id,
        },
        other => other.into(),
    }
}

/// Adds `amount` to the paid side of an obligation.
///
/// The amount must be positive and not exceed what remains. The write only
/// succeeds if the row still carries the version in `model`.
pub(crate) async fn record_settlement<C>(
    db: &C,
    model: &obligation::Model,
    amount: Decimal,
) -> Result<obligation::Model>
where
    C: ConnectionTrait,
{
    let amount = money::normalize(amount);
    let new_paid = money::normalize(model.amount_paid + amount);
    let new_remaining = money::normalize(model.amount_expected - new_paid);
    if amount <= Decimal::ZERO || new_remaining < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let mut active_model: obligation::ActiveModel = model.clone().into();
    active_model.amount_paid = Set(new_paid);
    active_model.amount_remaining = Set(new_remaining);
    active_model.version = Set(model.version + 1);

    Obligation::update(active_model)
        .filter(obligation::Column::Version.eq(model.version))
        .exec(db)
        .await
        .map(normalized)
        .map_err(|e| guard_error(e, model.id))
}

/// Marks an open obligation cancelled. Paid or already cancelled obligations
/// are rejected.
pub async fn cancel_obligation<C>(db: &C, obligation_id: i64) -> Result<obligation::Model>
where
    C: ConnectionTrait,
{
    let model = get_obligation(db, obligation_id)
        .await?
        .map(normalized)
        .ok_or_else(|| Error::not_found("obligation", obligation_id))?;

    if model.cancelled || model.amount_remaining <= Decimal::ZERO {
        let current = if model.cancelled { "cancelled" } else { "paid" };
        return Err(Error::InvalidState {
            entity: "obligation",
            id: obligation_id,
            current: current.to_string(),
            expected: "pending, partially_paid or overdue".to_string(),
        });
    }

    let mut active_model: obligation::ActiveModel = model.clone().into();
    active_model.cancelled = Set(true);
    active_model.version = Set(model.version + 1);

    Obligation::update(active_model)
        .filter(obligation::Column::Version.eq(model.version))
        .exec(db)
        .await
        .map(normalized)
        .map_err(|e| guard_error(e, obligation_id))
}
