//! Interfaces to the collaborators the ledger depends on.
//!
//! The member directory, the assistance amount configuration and the clock
//! live outside this crate. Operations take them as generic parameters so
//! tests can swap in fixed values.

use crate::config::settings::AppConfig;
use crate::core::period::Period;
use crate::entities::DueType;
use crate::errors::{Error, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use tracing::warn;

/// Enumerates members eligible for obligation generation.
pub trait MemberDirectory {
    /// Ids of every currently active member.
    fn active_member_ids(&self) -> Vec<i64>;
}

/// Looks up the fixed amount paid out for an assistance due type.
pub trait AssistanceAmounts {
    /// `None` when no amount is configured for the due type.
    fn fixed_amount(&self, due_type_id: i64) -> Option<Decimal>;
}

/// Source of "today" for status derivation and past-period checks.
pub trait Clock {
    fn today(&self) -> NaiveDate;

    fn current_period(&self) -> Period {
        Period::from_date(self.today())
    }
}

/// Member directory backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticMemberDirectory {
    member_ids: Vec<i64>,
}

impl StaticMemberDirectory {
    #[must_use]
    pub fn new(mut member_ids: Vec<i64>) -> Self {
        member_ids.sort_unstable();
        member_ids.dedup();
        Self { member_ids }
    }

    /// Active members listed in the configuration file.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config
                .members
                .iter()
                .filter(|m| m.active)
                .map(|m| m.id)
                .collect(),
        )
    }
}

impl MemberDirectory for StaticMemberDirectory {
    fn active_member_ids(&self) -> Vec<i64> {
        self.member_ids.clone()
    }
}

/// Fixed assistance amounts keyed by due type id.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAssistanceAmounts {
    amounts: HashMap<i64, Decimal>,
}

impl ConfiguredAssistanceAmounts {
    #[must_use]
    pub const fn new(amounts: HashMap<i64, Decimal>) -> Self {
        Self { amounts }
    }

    /// Resolves the `[assistance_amounts]` table (keyed by due type name)
    /// against the catalog.
    pub async fn resolve<C>(db: &C, config: &AppConfig) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let mut amounts = HashMap::new();
        for (name, amount) in &config.assistance_amounts {
            let due_type = DueType::find()
                .filter(crate::entities::due_type::Column::Name.eq(name.as_str()))
                .one(db)
                .await?;
            match due_type {
                Some(due_type) => {
                    let amount = crate::core::money::ensure_non_negative(*amount)?;
                    amounts.insert(due_type.id, amount);
                }
                None => {
                    warn!(
                        "Assistance amount configured for unknown due type '{}', ignoring",
                        name
                    );
                }
            }
        }
        Ok(Self { amounts })
    }
}

impl AssistanceAmounts for ConfiguredAssistanceAmounts {
    fn fixed_amount(&self, due_type_id: i64) -> Option<Decimal> {
        self.amounts.get(&due_type_id).copied()
    }
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock frozen at a given date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    /// Clock set to `YYYY-MM-DD`.
    pub fn on(date: &str) -> Result<Self> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| Error::InvalidInput {
                message: format!("Invalid date '{date}': {e}"),
            })
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
