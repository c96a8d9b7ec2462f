//! Core business logic - storage-backed operations independent of any front end.

pub mod assistance;
pub mod catalog;
pub mod collaborators;
pub mod generation;
pub mod ledger;
pub mod money;
pub mod obligation;
pub mod payment;
pub mod payout;
pub mod period;
pub mod report;
pub mod status;
