//! Report generation for members, periods and payouts.
//!
//! Functions here return structured data or plain text lines; they never
//! mutate records. The CLI prints their output as is.

use crate::{
    core::{
        collaborators::Clock,
        generation::{GenerationResult, PeriodSummary},
        ledger::{MemberLedger, get_member_ledger},
        obligation::{ObligationView, list_member_obligations},
        payment::PaymentOutcome,
        payout::PayoutBreakdown,
    },
    errors::Result,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::ConnectionTrait;

/// Everything shown for one member: balances and the obligation history.
#[derive(Debug, Clone)]
pub struct MemberStatement {
    pub ledger: MemberLedger,
    /// Obligations oldest first, with derived status
    pub obligations: Vec<ObligationView>,
}

/// Builds a member statement as of the clock's today.
pub async fn member_statement<C, K>(db: &C, member_id: i64, clock: &K) -> Result<MemberStatement>
where
    C: ConnectionTrait,
    K: Clock,
{
    let ledger = get_member_ledger(db, member_id, clock).await?;
    let obligations = list_member_obligations(db, member_id, clock).await?;
    Ok(MemberStatement {
        ledger,
        obligations,
    })
}

/// Share of the expected amount already collected, as a percentage.
///
/// Returns 100 when nothing was expected.
#[must_use]
pub fn collection_percent(paid: Decimal, expected: Decimal) -> f64 {
    if expected <= Decimal::ZERO {
        return 100.0;
    }
    (paid / expected * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or_default()
}

/// Text progress bar like `[████████░░] 80.0%`.
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress ∈ [0, 100] and length is small, so the cast stays in [0, length]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(empty);

    format!("[{filled_str}{empty_str}] {progress_percent:.1}%")
}

/// Formats money with two decimals.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[must_use]
pub fn format_obligation_line(view: &ObligationView) -> String {
    let o = &view.obligation;
    format!(
        "{} | {:<20} | expected {:>8} | paid {:>8} | remaining {:>8} | {}",
        o.period,
        view.due_type_name,
        format_amount(o.amount_expected),
        format_amount(o.amount_paid),
        format_amount(o.amount_remaining),
        view.status
    )
}

#[must_use]
pub fn format_ledger(ledger: &MemberLedger) -> String {
    format!(
        "Member {}\n  Total debt: {}\n  Months late: {}\n  Available credit: {}\n  Payable to clear debt: {}",
        ledger.member_id,
        format_amount(ledger.total_debt),
        ledger.months_late,
        format_amount(ledger.available_credit),
        format_amount(ledger.amount_payable_to_clear_debt)
    )
}

/// Ledger header followed by one line per obligation.
#[must_use]
pub fn format_member_statement(statement: &MemberStatement) -> String {
    let mut lines = vec![format_ledger(&statement.ledger)];
    if statement.obligations.is_empty() {
        lines.push("  No obligations".to_string());
    }
    for view in &statement.obligations {
        lines.push(format!("  {}", format_obligation_line(view)));
    }
    lines.join("\n")
}

#[must_use]
pub fn format_payment_outcome(outcome: &PaymentOutcome) -> String {
    let mut lines = vec![format!(
        "Payment #{} of {} ({:?})",
        outcome.payment.id,
        format_amount(outcome.payment.amount),
        outcome.payment.method
    )];
    for s in &outcome.settlements {
        lines.push(format!(
            "  {} obligation #{}: applied {}, remaining {} ({})",
            s.period,
            s.obligation_id,
            format_amount(s.amount_applied),
            format_amount(s.amount_remaining),
            s.status
        ));
    }
    if let Some(credit) = &outcome.credit {
        lines.push(format!(
            "  Credit created: {}",
            format_amount(credit.original_amount)
        ));
    }
    lines.join("\n")
}

#[must_use]
pub fn format_payout_breakdown(breakdown: &PayoutBreakdown) -> String {
    let mut text = format!(
        "Case #{} for member {}\n  Fixed amount: {}\n  Debt deducted: -{}\n  Unpaid dues deducted: -{}\n  Credit applied: +{}\n  Net payable: {}",
        breakdown.case_id,
        breakdown.member_id,
        format_amount(breakdown.fixed_amount),
        format_amount(breakdown.debt_deducted),
        format_amount(breakdown.unpaid_deducted),
        format_amount(breakdown.credit_applied),
        format_amount(breakdown.net_payable)
    );
    if breakdown.net_payable <= Decimal::ZERO {
        text.push_str("\n  The assistance amount is fully absorbed by existing debt.");
    }
    text
}

#[must_use]
pub fn format_generation_result(result: &GenerationResult) -> String {
    format!(
        "Period {}: {} obligations created for {} members ({} exempt, {} assistance, {} already present), due {}",
        result.period,
        result.created_count,
        result.members_processed,
        result.exempted_count,
        result.assistance_count,
        result.skipped_existing,
        result.due_date
    )
}

#[must_use]
pub fn format_period_summary(summary: &PeriodSummary) -> String {
    let progress = collection_percent(summary.total_paid, summary.total_expected);
    format!(
        "{} obligations: {} pending, {} partially paid, {} paid, {} overdue, {} cancelled\n  Collected {} of {} {}",
        summary.obligation_count,
        summary.pending,
        summary.partially_paid,
        summary.paid,
        summary.overdue,
        summary.cancelled,
        format_amount(summary.total_paid),
        format_amount(summary.total_expected),
        format_progress_bar(progress, None)
    )
}
