//! Due type catalog - Handles all catalog-related operations.
//!
//! Provides functions for creating, editing, listing and deactivating due
//! types. Due types are never deleted; their category and beneficiary
//! exemption are fixed at creation because existing obligations rely on them.

use crate::{
    config::AppConfig,
    core::money,
    entities::{DueCategory, DueType, due_type},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Input for [`create_due_type`].
#[derive(Debug, Clone)]
pub struct NewDueType {
    pub name: String,
    pub amount: Decimal,
    pub category: DueCategory,
    pub mandatory: bool,
    pub order: i32,
    pub beneficiary_exempt: bool,
}

/// Editable fields of a due type. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct DueTypeUpdate {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub mandatory: Option<bool>,
    pub order: Option<i32>,
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput {
            message: "Due type name cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Creates a new active due type after validating name and amount.
pub async fn create_due_type<C>(db: &C, new: NewDueType) -> Result<due_type::Model>
where
    C: ConnectionTrait,
{
    let name = validate_name(&new.name)?;
    let amount = money::ensure_non_negative(new.amount)?;

    let model = due_type::ActiveModel {
        name: Set(name),
        amount: Set(amount),
        mandatory: Set(new.mandatory),
        active: Set(true),
        sort_order: Set(new.order),
        category: Set(new.category),
        beneficiary_exempt: Set(new.beneficiary_exempt),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    debug!("Created due type {} ({})", created.name, created.id);
    Ok(created)
}

/// Finds a due type by id, active or not.
pub async fn get_due_type<C>(db: &C, due_type_id: i64) -> Result<Option<due_type::Model>>
where
    C: ConnectionTrait,
{
    DueType::find_by_id(due_type_id)
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) async fn require_due_type<C>(db: &C, due_type_id: i64) -> Result<due_type::Model>
where
    C: ConnectionTrait,
{
    get_due_type(db, due_type_id)
        .await?
        .ok_or_else(|| Error::not_found("due type", due_type_id))
}

/// Lists the catalog in settlement order (`order`, then name).
pub async fn list_due_types<C>(db: &C, include_inactive: bool) -> Result<Vec<due_type::Model>>
where
    C: ConnectionTrait,
{
    let mut query = DueType::find();
    if !include_inactive {
        query = query.filter(due_type::Column::Active.eq(true));
    }
    query
        .order_by_asc(due_type::Column::SortOrder)
        .order_by_asc(due_type::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Edits a due type. Amount changes only affect obligations generated afterwards.
pub async fn update_due_type<C>(
    db: &C,
    due_type_id: i64,
    update: DueTypeUpdate,
) -> Result<due_type::Model>
where
    C: ConnectionTrait,
{
    let existing = require_due_type(db, due_type_id).await?;
    let mut active_model: due_type::ActiveModel = existing.into();

    if let Some(name) = update.name {
        active_model.name = Set(validate_name(&name)?);
    }
    if let Some(amount) = update.amount {
        active_model.amount = Set(money::ensure_non_negative(amount)?);
    }
    if let Some(mandatory) = update.mandatory {
        active_model.mandatory = Set(mandatory);
    }
    if let Some(order) = update.order {
        active_model.sort_order = Set(order);
    }

    active_model.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a due type.
pub async fn set_due_type_active<C>(
    db: &C,
    due_type_id: i64,
    active: bool,
) -> Result<due_type::Model>
where
    C: ConnectionTrait,
{
    let existing = require_due_type(db, due_type_id).await?;
    let mut active_model: due_type::ActiveModel = existing.into();
    active_model.active = Set(active);
    active_model.update(db).await.map_err(Into::into)
}

/// Seeds the catalog from configuration. Entries whose name already exists are
/// left untouched, so seeding can run at every start.
#[instrument(skip_all)]
pub async fn seed_catalog(db: &DatabaseConnection, config: &AppConfig) -> Result<usize> {
    info!(
        "Seeding catalog. Found {} due types in configuration.",
        config.due_types.len()
    );
    let txn = db.begin().await?;
    let mut created = 0;

    for entry in &config.due_types {
        let exists = DueType::find()
            .filter(due_type::Column::Name.eq(entry.name.trim()))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            debug!("Due type '{}' already exists. Skipping.", entry.name);
            continue;
        }

        let model = create_due_type(
            &txn,
            NewDueType {
                name: entry.name.clone(),
                amount: entry.amount,
                category: entry.category,
                mandatory: entry.mandatory,
                order: entry.order,
                beneficiary_exempt: entry.beneficiary_exempt,
            },
        )
        .await?;

        if !entry.active {
            let mut active_model: due_type::ActiveModel = model.into();
            active_model.active = Set(false);
            active_model.update(&txn).await?;
        }
        created += 1;
    }

    txn.commit().await?;
    info!("Catalog seeded: {} new due types", created);
    Ok(created)
}
