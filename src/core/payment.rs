//! Payment application.
//!
//! A payment is spread greedily over the member's open obligations: oldest
//! period first, then due type `order`, each obligation settled in full before
//! the next one is touched. Whatever exceeds the total outstanding becomes a
//! credit. Reading the open obligations, writing the settlements and creating
//! the credit happen in one transaction; obligation writes are version-guarded
//! so a concurrent payment for the same member aborts instead of double-applying.

use crate::{
    core::{
        assistance,
        collaborators::Clock,
        money,
        obligation::{OutstandingObligation, load_outstanding, record_settlement},
        status::{ObligationStatus, status_of},
    },
    entities::{Credit, PaymentMethod, credit, payment, payment_allocation},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Input for [`apply_payment`].
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub member_id: i64,
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Receipt number, transfer id or similar
    pub reference: Option<String>,
    pub note: Option<String>,
}

impl PaymentRequest {
    #[must_use]
    pub const fn new(member_id: i64, amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            member_id,
            amount,
            method,
            reference: None,
            note: None,
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Checks the request and returns the normalized amount.
    fn validate(&self) -> Result<Decimal> {
        if self.member_id <= 0 {
            return Err(Error::InvalidInput {
                message: format!("Invalid member id {}", self.member_id),
            });
        }
        if matches!(
            self.method,
            PaymentMethod::AssistanceOffset | PaymentMethod::CreditOffset
        ) {
            return Err(Error::InvalidInput {
                message: format!("{:?} is reserved for internal settlements", self.method),
            });
        }
        money::ensure_positive(self.amount)
    }
}

/// What a payment did to one obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationSettlement {
    pub obligation_id: i64,
    pub period: String,
    pub due_type_id: i64,
    pub amount_applied: Decimal,
    pub amount_remaining: Decimal,
    pub status: ObligationStatus,
}

/// Result of applying money to a member's obligations.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: payment::Model,
    /// Obligations touched, in application order
    pub settlements: Vec<ObligationSettlement>,
    /// Credit created from the excess, if any
    pub credit: Option<credit::Model>,
}

/// Splits `amount` over outstanding balances in order.
///
/// Returns the amount applied to each balance (same order, zeros trimmed off
/// the end) and the excess that did not fit.
#[must_use]
pub fn allocate(amount: Decimal, balances: &[Decimal]) -> (Vec<Decimal>, Decimal) {
    let mut left = money::floor_zero(amount);
    let mut applied = Vec::new();
    for balance in balances {
        if left <= Decimal::ZERO {
            break;
        }
        let share = left.min(money::floor_zero(*balance));
        applied.push(share);
        left -= share;
    }
    (applied, left)
}

/// Settles `amount` against `outstanding` in order, recording one allocation
/// row per touched obligation. Fully settled obligations are removed from
/// `outstanding`; a partially settled one keeps its updated version.
pub(crate) async fn settle_outstanding<C>(
    db: &C,
    payment_id: i64,
    outstanding: &mut Vec<OutstandingObligation>,
    amount: Decimal,
    today: NaiveDate,
) -> Result<Vec<ObligationSettlement>>
where
    C: ConnectionTrait,
{
    let balances: Vec<Decimal> = outstanding
        .iter()
        .map(|o| o.obligation.amount_remaining)
        .collect();
    let (shares, _) = allocate(amount, &balances);

    let mut settlements = Vec::with_capacity(shares.len());
    let mut touched_cases = BTreeSet::new();

    for (entry, share) in outstanding.iter_mut().zip(shares) {
        if share <= Decimal::ZERO {
            continue;
        }
        let updated = record_settlement(db, &entry.obligation, share).await?;

        payment_allocation::ActiveModel {
            payment_id: Set(payment_id),
            obligation_id: Set(updated.id),
            amount: Set(share),
            ..Default::default()
        }
        .insert(db)
        .await?;

        if let Some(case_id) = updated.assistance_case_id {
            if updated.amount_remaining <= Decimal::ZERO {
                touched_cases.insert(case_id);
            }
        }
        settlements.push(ObligationSettlement {
            obligation_id: updated.id,
            period: updated.period.clone(),
            due_type_id: updated.due_type_id,
            amount_applied: share,
            amount_remaining: updated.amount_remaining,
            status: status_of(&updated, today),
        });
        entry.obligation = updated;
    }

    outstanding.retain(|o| o.obligation.amount_remaining > Decimal::ZERO);

    for case_id in touched_cases {
        assistance::refresh_case_settlement(db, case_id).await?;
    }

    Ok(settlements)
}

/// Loads a member's credits with a balance left, oldest first.
pub(crate) async fn load_available_credits<C>(db: &C, member_id: i64) -> Result<Vec<credit::Model>>
where
    C: ConnectionTrait,
{
    let credits = Credit::find()
        .filter(credit::Column::MemberId.eq(member_id))
        .filter(credit::Column::RemainingAmount.gt(Decimal::ZERO))
        .order_by_asc(credit::Column::CreatedAt)
        .order_by_asc(credit::Column::Id)
        .all(db)
        .await?;
    Ok(credits
        .into_iter()
        .map(|mut c| {
            c.original_amount = money::normalize(c.original_amount);
            c.remaining_amount = money::normalize(c.remaining_amount);
            c
        })
        .collect())
}

/// Draws `amount` from `credits` oldest first. Balances only ever decrease.
pub(crate) async fn consume_credits<C>(
    db: &C,
    credits: &[credit::Model],
    amount: Decimal,
) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let balances: Vec<Decimal> = credits.iter().map(|c| c.remaining_amount).collect();
    let (shares, _) = allocate(amount, &balances);
    let mut consumed = Decimal::ZERO;

    for (credit, share) in credits.iter().zip(shares) {
        if share <= Decimal::ZERO {
            continue;
        }
        let mut active_model: credit::ActiveModel = credit.clone().into();
        active_model.remaining_amount = Set(money::normalize(credit.remaining_amount - share));
        active_model.version = Set(credit.version + 1);

        Credit::update(active_model)
            .filter(credit::Column::Version.eq(credit.version))
            .exec(db)
            .await
            .map_err(|e| match e {
                DbErr::RecordNotUpdated => Error::ConcurrentModification {
                    entity: "credit",
                    id: credit.id,
                },
                other => other.into(),
            })?;
        consumed += share;
    }
    Ok(consumed)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_payment<C>(
    db: &C,
    member_id: i64,
    method: PaymentMethod,
    amount: Decimal,
    applied_amount: Decimal,
    credit_amount: Decimal,
    reference: Option<String>,
    note: Option<String>,
) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    payment::ActiveModel {
        member_id: Set(member_id),
        amount: Set(amount),
        method: Set(method),
        reference: Set(reference),
        note: Set(note),
        applied_amount: Set(applied_amount),
        credit_amount: Set(credit_amount),
        received_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Applies an incoming payment to a member's obligations.
///
/// Zero or negative amounts are rejected before any write. If the payment
/// exceeds everything owed, the excess is stored as a new credit; it is not
/// applied to future periods.
#[instrument(skip(db, clock), fields(member_id = request.member_id, amount = %request.amount))]
pub async fn apply_payment<K>(
    db: &DatabaseConnection,
    request: PaymentRequest,
    clock: &K,
) -> Result<PaymentOutcome>
where
    K: Clock,
{
    let amount = request.validate()?;
    let today = clock.today();

    let txn = db.begin().await?;

    let mut outstanding = load_outstanding(&txn, request.member_id).await?;
    let total_outstanding: Decimal = outstanding
        .iter()
        .map(|o| o.obligation.amount_remaining)
        .sum();
    let applied_amount = amount.min(total_outstanding);
    let excess = money::normalize(amount - applied_amount);
    debug!(
        "Outstanding {} across {} obligations, applying {}, excess {}",
        total_outstanding,
        outstanding.len(),
        applied_amount,
        excess
    );

    let payment = insert_payment(
        &txn,
        request.member_id,
        request.method,
        amount,
        applied_amount,
        excess,
        clean(request.reference),
        clean(request.note),
    )
    .await?;

    let settlements =
        settle_outstanding(&txn, payment.id, &mut outstanding, applied_amount, today).await?;

    let credit = if excess > Decimal::ZERO {
        let source_obligation_id = settlements.last().map(|s| s.obligation_id);
        let created = credit::ActiveModel {
            member_id: Set(request.member_id),
            original_amount: Set(excess),
            remaining_amount: Set(excess),
            source_obligation_id: Set(source_obligation_id),
            source_assistance_id: Set(None),
            source_payment_id: Set(Some(payment.id)),
            version: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        Some(created)
    } else {
        None
    };

    txn.commit().await?;

    info!(
        "Payment {} of {} applied for member {}: {} obligations touched, credit {}",
        payment.id,
        amount,
        request.member_id,
        settlements.len(),
        excess
    );

    Ok(PaymentOutcome {
        payment,
        settlements,
        credit,
    })
}

/// Uses a member's available credit to settle open obligations.
///
/// Credits are drawn oldest first and obligations settled in the same order
/// as payments. Returns `None` when there is no credit or nothing is owed.
#[instrument(skip(db, clock))]
pub async fn apply_credit<K>(
    db: &DatabaseConnection,
    member_id: i64,
    clock: &K,
) -> Result<Option<PaymentOutcome>>
where
    K: Clock,
{
    let today = clock.today();
    let txn = db.begin().await?;

    let credits = load_available_credits(&txn, member_id).await?;
    let mut outstanding = load_outstanding(&txn, member_id).await?;
    let available: Decimal = credits.iter().map(|c| c.remaining_amount).sum();
    let owed: Decimal = outstanding
        .iter()
        .map(|o| o.obligation.amount_remaining)
        .sum();
    let usable = available.min(owed);
    if usable <= Decimal::ZERO {
        debug!("Nothing to offset for member {}", member_id);
        return Ok(None);
    }

    let consumed = consume_credits(&txn, &credits, usable).await?;
    let payment = insert_payment(
        &txn,
        member_id,
        PaymentMethod::CreditOffset,
        consumed,
        consumed,
        Decimal::ZERO,
        None,
        Some("Credit applied to outstanding dues".to_string()),
    )
    .await?;
    let settlements = settle_outstanding(&txn, payment.id, &mut outstanding, consumed, today).await?;

    txn.commit().await?;

    info!(
        "Applied {} of credit for member {} over {} obligations",
        consumed,
        member_id,
        settlements.len()
    );
    Ok(Some(PaymentOutcome {
        payment,
        settlements,
        credit: None,
    }))
}
