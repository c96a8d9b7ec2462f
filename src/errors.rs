//! Unified error type for the dues ledger.
//!
//! Every operation returns [`Result`]. Variants are grouped by [`ErrorKind`] so
//! callers can tell a rejected input from a conflict that needs reconciliation,
//! an illegal lifecycle transition, or a storage failure that must be retried
//! as a whole.

use crate::core::period::Period;
use rust_decimal::Decimal;
use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input, nothing was written
    Validation,
    /// Conflicts with existing state; redirect to reconciliation instead of retrying
    Conflict,
    /// Illegal lifecycle transition
    State,
    /// Referenced record does not exist
    NotFound,
    /// Storage or infrastructure failure; the whole operation must be retried
    Storage,
    /// Configuration could not be loaded
    Config,
}

/// Errors raised by the dues ledger.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file missing or malformed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Storage failure; nothing from the operation was persisted
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Amount zero, negative, too precise or larger than what remains
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    /// Period string not in `YYYY-MM` form
    #[error("Invalid period '{value}', expected YYYY-MM")]
    InvalidPeriod { value: String },

    /// Rejected input other than amounts and periods
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Generation requested without a flat monthly fee
    #[error("No flat monthly due type selected for period {period}")]
    MissingMandatoryType { period: Period },

    /// Case assignment to a period before the current one
    #[error("Cannot assign to past period {requested} (current period is {current})")]
    PastPeriod { requested: Period, current: Period },

    /// Period already holds obligations that are not fully paid
    #[error(
        "Obligations for period {period} already exist and are not validated ({unsettled} not fully paid)"
    )]
    AlreadyExists { period: Period, unsettled: usize },

    /// Row changed by another transaction since it was read
    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: i64 },

    /// Payout of the case was already recorded
    #[error("Payout for assistance case {case_id} was already executed")]
    AlreadyExecuted { case_id: i64 },

    /// Net payout is zero
    #[error("Nothing to pay out for assistance case {case_id}: amount absorbed by debt")]
    NothingToPay { case_id: i64 },

    /// No assistance amount configured for the due type
    #[error("No fixed assistance amount configured for due type {due_type_id}")]
    NoFixedAmountConfigured { due_type_id: i64 },

    /// Lifecycle transition not allowed from the current status
    #[error("Invalid state for {entity} {id}: current {current}, expected {expected}")]
    InvalidState {
        entity: &'static str,
        id: i64,
        current: String,
        expected: String,
    },

    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

impl Error {
    /// Classifies the error for callers that route on the failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidPeriod { .. }
            | Self::InvalidInput { .. }
            | Self::MissingMandatoryType { .. }
            | Self::PastPeriod { .. }
            | Self::NoFixedAmountConfigured { .. }
            | Self::NothingToPay { .. } => ErrorKind::Validation,
            Self::AlreadyExists { .. }
            | Self::ConcurrentModification { .. }
            | Self::AlreadyExecuted { .. } => ErrorKind::Conflict,
            Self::InvalidState { .. } => ErrorKind::State,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
