//! Derived obligation status.
//!
//! Status is a pure function of the amounts, the due date and the clock. It is
//! never stored, so display code and business rules cannot drift apart.

use crate::entities::obligation;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Settlement status of an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    /// Nothing paid, not yet due
    Pending,
    /// Some but not all of the expected amount paid
    PartiallyPaid,
    /// Nothing left to pay
    Paid,
    /// Nothing paid and the due date has passed
    Overdue,
    /// Explicitly cancelled, excluded from totals
    Cancelled,
}

impl fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Derives the status from raw obligation fields.
#[must_use]
pub fn derive_status(
    amount_expected: Decimal,
    amount_paid: Decimal,
    amount_remaining: Decimal,
    due_date: NaiveDate,
    cancelled: bool,
    today: NaiveDate,
) -> ObligationStatus {
    if cancelled {
        ObligationStatus::Cancelled
    } else if amount_remaining <= Decimal::ZERO {
        ObligationStatus::Paid
    } else if amount_paid > Decimal::ZERO && amount_paid < amount_expected {
        ObligationStatus::PartiallyPaid
    } else if amount_paid <= Decimal::ZERO && today > due_date {
        ObligationStatus::Overdue
    } else {
        ObligationStatus::Pending
    }
}

/// Status of a stored obligation as of `today`.
#[must_use]
pub fn status_of(model: &obligation::Model, today: NaiveDate) -> ObligationStatus {
    derive_status(
        model.amount_expected,
        model.amount_paid,
        model.amount_remaining,
        model.due_date,
        model.cancelled,
        today,
    )
}

/// Whether the obligation still counts towards a member's debt.
#[must_use]
pub fn is_outstanding(model: &obligation::Model) -> bool {
    !model.cancelled && model.amount_remaining > Decimal::ZERO
}

/// Whether the obligation is still owed after its due date.
#[must_use]
pub fn is_late(model: &obligation::Model, today: NaiveDate) -> bool {
    is_outstanding(model) && today > model.due_date
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_paid_when_nothing_remains() {
        let status = derive_status(
            dec!(15),
            dec!(15),
            dec!(0),
            date(2025, 1, 31),
            false,
            date(2025, 3, 1),
        );
        assert_eq!(status, ObligationStatus::Paid);
    }

    #[test]
    fn test_exempt_zero_obligation_is_paid() {
        let status = derive_status(
            dec!(0),
            dec!(0),
            dec!(0),
            date(2025, 1, 31),
            false,
            date(2025, 1, 1),
        );
        assert_eq!(status, ObligationStatus::Paid);
    }

    #[test]
    fn test_partially_paid_even_when_late() {
        let status = derive_status(
            dec!(15),
            dec!(5),
            dec!(10),
            date(2025, 1, 31),
            false,
            date(2025, 3, 1),
        );
        assert_eq!(status, ObligationStatus::PartiallyPaid);
    }

    #[test]
    fn test_overdue_only_after_due_date() {
        let due = date(2025, 1, 31);
        assert_eq!(
            derive_status(dec!(15), dec!(0), dec!(15), due, false, due),
            ObligationStatus::Pending
        );
        assert_eq!(
            derive_status(dec!(15), dec!(0), dec!(15), due, false, date(2025, 2, 1)),
            ObligationStatus::Overdue
        );
    }

    #[test]
    fn test_cancelled_wins() {
        let status = derive_status(
            dec!(15),
            dec!(0),
            dec!(15),
            date(2025, 1, 31),
            true,
            date(2025, 3, 1),
        );
        assert_eq!(status, ObligationStatus::Cancelled);
    }
}
