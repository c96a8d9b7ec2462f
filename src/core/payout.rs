//! Assistance payouts.
//!
//! The fixed amount of a case is paid out net of what the member still owes.
//! Computing the breakdown never writes; executing it is a one-time action
//! that settles the deducted obligations and records the disbursed expense.

use crate::{
    core::{
        assistance::require_case,
        collaborators::Clock,
        money,
        obligation::{OutstandingObligation, load_outstanding},
        payment::{consume_credits, insert_payment, load_available_credits, settle_outstanding},
    },
    entities::{
        AssistanceCase, CaseStatus, PaymentMethod, Payout, assistance_case, credit, payout,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument, warn};

/// Net payout of an assistance case and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutBreakdown {
    pub case_id: i64,
    pub member_id: i64,
    pub fixed_amount: Decimal,
    /// Remaining balance of obligations past their due date
    pub debt_deducted: Decimal,
    /// Remaining balance of obligations not yet due
    pub unpaid_deducted: Decimal,
    /// Member credit used to offset the deductions
    pub credit_applied: Decimal,
    pub net_payable: Decimal,
}

/// Nets a fixed amount against debt, unpaid dues and available credit.
///
/// Returns `(credit_applied, net_payable)`.
#[must_use]
pub fn net_payout(
    fixed_amount: Decimal,
    debt: Decimal,
    unpaid: Decimal,
    available_credit: Decimal,
) -> (Decimal, Decimal) {
    let deductions = money::floor_zero(debt) + money::floor_zero(unpaid);
    let credit_applied = money::floor_zero(available_credit).min(deductions);
    let net = money::floor_zero(fixed_amount - (deductions - credit_applied));
    (money::normalize(credit_applied), money::normalize(net))
}

struct PayoutBasis {
    breakdown: PayoutBreakdown,
    deducted: Vec<OutstandingObligation>,
    credits: Vec<credit::Model>,
}

async fn payout_basis<C>(
    db: &C,
    case: &assistance_case::Model,
    today: NaiveDate,
) -> Result<PayoutBasis>
where
    C: ConnectionTrait,
{
    // the case's own dues are collected from the group, not deducted from the member
    let deducted: Vec<OutstandingObligation> = load_outstanding(db, case.member_id)
        .await?
        .into_iter()
        .filter(|o| o.obligation.assistance_case_id != Some(case.id))
        .collect();

    let (overdue, upcoming): (Vec<_>, Vec<_>) = deducted
        .iter()
        .partition(|o| today > o.obligation.due_date);
    let debt: Decimal = overdue.iter().map(|o| o.obligation.amount_remaining).sum();
    let unpaid: Decimal = upcoming.iter().map(|o| o.obligation.amount_remaining).sum();

    let credits = load_available_credits(db, case.member_id).await?;
    let available: Decimal = credits.iter().map(|c| c.remaining_amount).sum();

    let fixed_amount = money::normalize(case.fixed_amount);
    let (credit_applied, net_payable) = net_payout(fixed_amount, debt, unpaid, available);

    Ok(PayoutBasis {
        breakdown: PayoutBreakdown {
            case_id: case.id,
            member_id: case.member_id,
            fixed_amount,
            debt_deducted: money::normalize(debt),
            unpaid_deducted: money::normalize(unpaid),
            credit_applied,
            net_payable,
        },
        deducted,
        credits,
    })
}

/// Computes the payout breakdown of a case without changing anything.
///
/// A zero net amount is a valid result: the assistance was absorbed by debt.
pub async fn compute_payout<C, K>(db: &C, case_id: i64, clock: &K) -> Result<PayoutBreakdown>
where
    C: ConnectionTrait,
    K: Clock,
{
    let case = require_case(db, case_id).await?;
    let basis = payout_basis(db, &case, clock.today()).await?;
    debug!("Payout breakdown for case {}: {:?}", case_id, basis.breakdown);
    Ok(basis.breakdown)
}

/// Executes the payout of a case once.
///
/// Recomputes the breakdown inside the transaction, consumes the credit used,
/// settles every deducted obligation and records the payout expense. Rejected
/// with [`Error::AlreadyExecuted`] on a second call and with
/// [`Error::NothingToPay`] when the net amount is zero.
#[instrument(skip(db, clock))]
pub async fn execute_payout<K>(
    db: &DatabaseConnection,
    case_id: i64,
    clock: &K,
) -> Result<payout::Model>
where
    K: Clock,
{
    let today = clock.today();
    let txn = db.begin().await?;

    let case = require_case(&txn, case_id).await?;
    if case.payout_executed_at.is_some() {
        warn!("Payout for case {} was already executed", case_id);
        return Err(Error::AlreadyExecuted { case_id });
    }
    if case.status == CaseStatus::Cancelled {
        return Err(Error::InvalidState {
            entity: "assistance case",
            id: case_id,
            current: case.status.to_string(),
            expected: "pending, assigned or paid".to_string(),
        });
    }

    let PayoutBasis {
        breakdown,
        mut deducted,
        credits,
    } = payout_basis(&txn, &case, today).await?;
    if breakdown.net_payable <= Decimal::ZERO {
        return Err(Error::NothingToPay { case_id });
    }

    if breakdown.credit_applied > Decimal::ZERO {
        let consumed = consume_credits(&txn, &credits, breakdown.credit_applied).await?;
        let offset = insert_payment(
            &txn,
            case.member_id,
            PaymentMethod::CreditOffset,
            consumed,
            consumed,
            Decimal::ZERO,
            None,
            Some(format!("Credit used for assistance payout of case {case_id}")),
        )
        .await?;
        settle_outstanding(&txn, offset.id, &mut deducted, consumed, today).await?;
    }

    let withheld: Decimal = deducted.iter().map(|o| o.obligation.amount_remaining).sum();
    if withheld > Decimal::ZERO {
        let offset = insert_payment(
            &txn,
            case.member_id,
            PaymentMethod::AssistanceOffset,
            withheld,
            withheld,
            Decimal::ZERO,
            None,
            Some(format!("Withheld from assistance payout of case {case_id}")),
        )
        .await?;
        settle_outstanding(&txn, offset.id, &mut deducted, withheld, today).await?;
    }

    let now = Utc::now();
    let stamped = AssistanceCase::update_many()
        .col_expr(assistance_case::Column::PayoutExecutedAt, Expr::value(now))
        .filter(assistance_case::Column::Id.eq(case_id))
        .filter(assistance_case::Column::PayoutExecutedAt.is_null())
        .exec(&txn)
        .await?;
    if stamped.rows_affected == 0 {
        return Err(Error::AlreadyExecuted { case_id });
    }

    let recorded = payout::ActiveModel {
        assistance_case_id: Set(case_id),
        member_id: Set(case.member_id),
        fixed_amount: Set(breakdown.fixed_amount),
        debt_deducted: Set(breakdown.debt_deducted),
        unpaid_deducted: Set(breakdown.unpaid_deducted),
        credit_applied: Set(breakdown.credit_applied),
        net_amount: Set(breakdown.net_payable),
        executed_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            Error::AlreadyExecuted { case_id }
        } else {
            e.into()
        }
    })?;

    txn.commit().await?;

    info!(
        "Paid out {} to member {} for case {} (fixed {}, withheld {})",
        recorded.net_amount,
        recorded.member_id,
        case_id,
        recorded.fixed_amount,
        withheld + breakdown.credit_applied
    );
    Ok(recorded)
}

/// Finds the recorded payout of a case, if it was executed.
pub async fn get_payout<C>(db: &C, case_id: i64) -> Result<Option<payout::Model>>
where
    C: ConnectionTrait,
{
    Payout::find()
        .filter(payout::Column::AssistanceCaseId.eq(case_id))
        .one(db)
        .await
        .map_err(Into::into)
}
