//! Member ledger - read-only balances computed from obligations and credits.

use crate::{
    core::{
        collaborators::Clock,
        money,
        obligation::{flat_monthly_type_ids, normalized},
        payment::load_available_credits,
        status::is_late,
    },
    entities::{Obligation, credit, obligation},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// A member's standing at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLedger {
    pub member_id: i64,
    /// Remaining balance of every non-cancelled obligation
    pub total_debt: Decimal,
    /// Distinct periods with an overdue flat monthly fee
    pub months_late: usize,
    pub available_credit: Decimal,
    pub amount_payable_to_clear_debt: Decimal,
}

/// Computes the ledger figures from already loaded records.
#[must_use]
pub fn summarize(
    member_id: i64,
    obligations: &[obligation::Model],
    credits: &[credit::Model],
    flat_monthly_ids: &[i64],
    today: NaiveDate,
) -> MemberLedger {
    let live = obligations.iter().filter(|o| !o.cancelled);

    let total_debt = money::normalize(
        live.clone()
            .map(|o| money::floor_zero(o.amount_remaining))
            .sum(),
    );

    let late_periods: BTreeSet<&str> = live
        .filter(|o| flat_monthly_ids.contains(&o.due_type_id) && is_late(o, today))
        .map(|o| o.period.as_str())
        .collect();

    let available_credit = money::normalize(
        credits
            .iter()
            .map(|c| money::floor_zero(c.remaining_amount))
            .sum(),
    );

    MemberLedger {
        member_id,
        total_debt,
        months_late: late_periods.len(),
        available_credit,
        amount_payable_to_clear_debt: money::floor_zero(total_debt - available_credit),
    }
}

/// Returns a member's total debt, months late, available credit and the
/// amount still needed once credit is taken into account. Never writes.
pub async fn get_member_ledger<C, K>(db: &C, member_id: i64, clock: &K) -> Result<MemberLedger>
where
    C: ConnectionTrait,
    K: Clock,
{
    let obligations: Vec<obligation::Model> = Obligation::find()
        .filter(obligation::Column::MemberId.eq(member_id))
        .all(db)
        .await?
        .into_iter()
        .map(normalized)
        .collect();
    let credits = load_available_credits(db, member_id).await?;
    let flat_ids = flat_monthly_type_ids(db).await?;

    let ledger = summarize(member_id, &obligations, &credits, &flat_ids, clock.today());
    debug!(
        "Ledger for member {}: debt {}, {} months late, credit {}",
        member_id, ledger.total_debt, ledger.months_late, ledger.available_credit
    );
    Ok(ledger)
}

/// Lists a member's credits that still carry a balance, oldest first.
pub async fn list_member_credits<C>(db: &C, member_id: i64) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    load_available_credits(db, member_id).await
}
