//! Obligation generation for a period.
//!
//! A generation run creates one obligation per eligible member and selected
//! due type, plus the assistance dues of every case assigned to the period.
//! The existence check and all inserts share one database transaction: either
//! the whole batch is committed or nothing is. Two concurrent runs cannot both
//! insert because every row carries a unique `dedup_key`.

use crate::{
    config::settings::Settings,
    core::{
        assistance,
        collaborators::{Clock, MemberDirectory},
        money,
        period::Period,
        status::{ObligationStatus, status_of},
    },
    entities::{
        AssistanceCase, CaseStatus, DueCategory, DueType, Obligation, assistance_case,
        due_type, obligation,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

// Rows per INSERT statement, keeps bind parameters well under SQLite's limit
const INSERT_CHUNK: usize = 50;

/// Input for [`generate_obligations`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub period: Period,
    /// Selected `FlatMonthly`/`Misc` due types. Assistance dues ride along.
    pub due_type_ids: Vec<i64>,
}

/// Outcome of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub period: Period,
    pub due_date: NaiveDate,
    /// Obligations inserted, exempt ones included
    pub created_count: usize,
    /// Obligations inserted already settled because of a beneficiary exemption
    pub exempted_count: usize,
    /// Obligations inserted for assistance cases
    pub assistance_count: usize,
    /// Pairs skipped because they already existed in a settled batch
    pub skipped_existing: usize,
    pub members_processed: usize,
}

/// Per-status counts and totals of a period, for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodSummary {
    pub obligation_count: usize,
    pub pending: usize,
    pub partially_paid: usize,
    pub paid: usize,
    pub overdue: usize,
    pub cancelled: usize,
    pub total_expected: Decimal,
    pub total_paid: Decimal,
    pub total_remaining: Decimal,
}

struct PlannedObligation {
    member_id: i64,
    due_type: due_type::Model,
    beneficiary_member_id: Option<i64>,
    assistance_case_id: Option<i64>,
    exempt: bool,
}

fn validate_selection(
    period: Period,
    requested: &[i64],
    found: &[due_type::Model],
) -> Result<()> {
    for id in requested {
        let Some(due_type) = found.iter().find(|d| d.id == *id) else {
            return Err(Error::not_found("due type", *id));
        };
        if !due_type.active {
            return Err(Error::InvalidInput {
                message: format!("Due type '{}' is inactive", due_type.name),
            });
        }
        if due_type.category == DueCategory::Assistance {
            return Err(Error::InvalidInput {
                message: format!(
                    "Assistance due type '{}' cannot be selected; it is generated from assigned cases",
                    due_type.name
                ),
            });
        }
    }

    if !found
        .iter()
        .any(|d| d.category == DueCategory::FlatMonthly)
    {
        return Err(Error::MissingMandatoryType { period });
    }
    Ok(())
}

fn map_insert_error(err: DbErr, period: Period) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        warn!("Concurrent generation detected for period {}", period);
        Error::AlreadyExists {
            period,
            unsettled: 0,
        }
    } else {
        err.into()
    }
}

/// Inserts planned rows in chunks. A duplicate `dedup_key` means another run
/// got there first and is reported as [`Error::AlreadyExists`].
async fn insert_rows<C>(db: &C, rows: Vec<obligation::ActiveModel>, period: Period) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut chunk = Vec::with_capacity(INSERT_CHUNK);
    for row in rows {
        chunk.push(row);
        if chunk.len() == INSERT_CHUNK {
            Obligation::insert_many(std::mem::take(&mut chunk))
                .exec(db)
                .await
                .map_err(|e| map_insert_error(e, period))?;
        }
    }
    if !chunk.is_empty() {
        Obligation::insert_many(chunk)
            .exec(db)
            .await
            .map_err(|e| map_insert_error(e, period))?;
    }
    Ok(())
}

/// Generates the obligations of `request.period`.
///
/// Rejected with [`Error::MissingMandatoryType`] when no flat monthly fee is
/// selected, and with [`Error::AlreadyExists`] when the period already holds
/// obligations of the involved due types that are not fully paid. When every
/// existing obligation is paid, only missing (member, due type) pairs are
/// created.
#[instrument(skip(db, members, settings), fields(period = %request.period))]
pub async fn generate_obligations<M>(
    db: &DatabaseConnection,
    request: &GenerationRequest,
    members: &M,
    settings: &Settings,
) -> Result<GenerationResult>
where
    M: MemberDirectory,
{
    let period = request.period;
    let period_key = period.to_string();

    let mut selected_ids = request.due_type_ids.clone();
    selected_ids.sort_unstable();
    selected_ids.dedup();
    if selected_ids.is_empty() {
        return Err(Error::MissingMandatoryType { period });
    }

    let member_ids = members.active_member_ids();

    let txn = db.begin().await?;

    let selected = DueType::find()
        .filter(due_type::Column::Id.is_in(selected_ids.clone()))
        .order_by_asc(due_type::Column::SortOrder)
        .all(&txn)
        .await?;
    validate_selection(period, &selected_ids, &selected)?;

    // Assistance cases bound to this period bring their own due types along
    let assigned_cases = AssistanceCase::find()
        .filter(assistance_case::Column::Status.eq(CaseStatus::Assigned))
        .filter(assistance_case::Column::AssignedPeriod.eq(period_key.as_str()))
        .order_by_asc(assistance_case::Column::Id)
        .all(&txn)
        .await?;
    let assistance_type_ids: Vec<i64> = assigned_cases
        .iter()
        .map(|c| c.linked_due_type_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let assistance_types: HashMap<i64, due_type::Model> = DueType::find()
        .filter(due_type::Column::Id.is_in(assistance_type_ids.clone()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let involved_ids: Vec<i64> = selected_ids
        .iter()
        .chain(assistance_type_ids.iter())
        .copied()
        .collect();
    let existing = Obligation::find()
        .filter(obligation::Column::Period.eq(period_key.as_str()))
        .filter(obligation::Column::DueTypeId.is_in(involved_ids))
        .all(&txn)
        .await?;
    let unsettled = existing
        .iter()
        .filter(|o| !o.cancelled && o.amount_remaining > Decimal::ZERO)
        .count();
    if unsettled > 0 {
        warn!(
            "Period {} already has {} unsettled obligations, refusing to regenerate",
            period, unsettled
        );
        return Err(Error::AlreadyExists {
            period,
            unsettled,
        });
    }
    let existing_keys: HashSet<String> = existing.into_iter().map(|o| o.dedup_key).collect();

    // Subjects of in-flight cases are waived from every beneficiary-exempt selected type
    let waived: HashSet<i64> = AssistanceCase::find()
        .filter(
            assistance_case::Column::Status.is_in([CaseStatus::Pending, CaseStatus::Assigned]),
        )
        .all(&txn)
        .await?
        .into_iter()
        .map(|case| case.member_id)
        .collect();

    let mut planned = Vec::new();
    for member_id in &member_ids {
        for due_type in &selected {
            let exempt = due_type.beneficiary_exempt && waived.contains(member_id);
            planned.push(PlannedObligation {
                member_id: *member_id,
                due_type: due_type.clone(),
                beneficiary_member_id: None,
                assistance_case_id: None,
                exempt,
            });
        }
    }
    for case in &assigned_cases {
        let Some(due_type) = assistance_types.get(&case.linked_due_type_id) else {
            return Err(Error::not_found("due type", case.linked_due_type_id));
        };
        for member_id in &member_ids {
            planned.push(PlannedObligation {
                member_id: *member_id,
                due_type: due_type.clone(),
                beneficiary_member_id: Some(case.member_id),
                assistance_case_id: Some(case.id),
                exempt: due_type.beneficiary_exempt && *member_id == case.member_id,
            });
        }
    }

    let due_date = period.due_date(settings.due_day_offset);
    let now = Utc::now();
    let mut rows = Vec::with_capacity(planned.len());
    let mut skipped_existing = 0;
    let mut exempted_count = 0;
    let mut assistance_count = 0;

    for plan in planned {
        let key = obligation::dedup_key(
            plan.member_id,
            plan.due_type.id,
            &period_key,
            plan.assistance_case_id,
        );
        if existing_keys.contains(&key) {
            skipped_existing += 1;
            continue;
        }

        let amount_expected = if plan.exempt {
            exempted_count += 1;
            Decimal::ZERO
        } else {
            money::normalize(plan.due_type.amount)
        };
        if plan.assistance_case_id.is_some() {
            assistance_count += 1;
        }

        rows.push(obligation::ActiveModel {
            period: Set(period_key.clone()),
            member_id: Set(plan.member_id),
            due_type_id: Set(plan.due_type.id),
            beneficiary_member_id: Set(plan.beneficiary_member_id),
            assistance_case_id: Set(plan.assistance_case_id),
            amount_expected: Set(amount_expected),
            amount_paid: Set(Decimal::ZERO),
            amount_remaining: Set(amount_expected),
            due_date: Set(due_date),
            cancelled: Set(false),
            version: Set(0),
            dedup_key: Set(key),
            created_at: Set(now),
            ..Default::default()
        });
    }

    let created_count = rows.len();
    debug!(
        "Inserting {} obligations for period {} ({} skipped)",
        created_count, period, skipped_existing
    );
    insert_rows(&txn, rows, period).await?;

    // Cases whose every due was waived are settled as soon as they are generated
    for case in &assigned_cases {
        assistance::refresh_case_settlement(&txn, case.id).await?;
    }

    txn.commit().await?;

    info!(
        "Generated {} obligations for period {} ({} exempt, {} assistance)",
        created_count, period, exempted_count, assistance_count
    );

    Ok(GenerationResult {
        period,
        due_date,
        created_count,
        exempted_count,
        assistance_count,
        skipped_existing,
        members_processed: member_ids.len(),
    })
}

/// Removes the obligations of a period that no payment has touched.
///
/// Obligations with any amount paid are kept. Assistance cases that lost
/// dues are re-checked, since the remaining ones may all be paid. Returns the
/// number removed.
#[instrument(skip(db), fields(period = %period))]
pub async fn remove_unpaid_obligations(db: &DatabaseConnection, period: Period) -> Result<u64> {
    let period_key = period.to_string();
    let txn = db.begin().await?;

    let affected_cases: BTreeSet<i64> = Obligation::find()
        .filter(obligation::Column::Period.eq(period_key.as_str()))
        .filter(obligation::Column::AmountPaid.eq(Decimal::ZERO))
        .filter(obligation::Column::AssistanceCaseId.is_not_null())
        .all(&txn)
        .await?
        .into_iter()
        .filter_map(|o| o.assistance_case_id)
        .collect();

    let result = Obligation::delete_many()
        .filter(obligation::Column::Period.eq(period_key.as_str()))
        .filter(obligation::Column::AmountPaid.eq(Decimal::ZERO))
        .exec(&txn)
        .await?;

    for case_id in affected_cases {
        assistance::refresh_case_settlement(&txn, case_id).await?;
    }
    txn.commit().await?;

    info!(
        "Removed {} unpaid obligations for period {}",
        result.rows_affected, period
    );
    Ok(result.rows_affected)
}

/// Counts and totals of a period's obligations by derived status.
pub async fn period_summary<C, K>(db: &C, period: Period, clock: &K) -> Result<PeriodSummary>
where
    C: ConnectionTrait,
    K: Clock,
{
    let today = clock.today();
    let obligations = Obligation::find()
        .filter(obligation::Column::Period.eq(period.to_string()))
        .all(db)
        .await?;

    let mut summary = PeriodSummary::default();
    for model in obligations {
        let model = crate::core::obligation::normalized(model);
        summary.obligation_count += 1;
        match status_of(&model, today) {
            ObligationStatus::Pending => summary.pending += 1,
            ObligationStatus::PartiallyPaid => summary.partially_paid += 1,
            ObligationStatus::Paid => summary.paid += 1,
            ObligationStatus::Overdue => summary.overdue += 1,
            ObligationStatus::Cancelled => {
                summary.cancelled += 1;
                continue;
            }
        }
        summary.total_expected += model.amount_expected;
        summary.total_paid += model.amount_paid;
        summary.total_remaining += model.amount_remaining;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::collaborators::{FixedClock, StaticMemberDirectory};
    use crate::core::payment::{PaymentRequest, apply_payment};
    use crate::entities::PaymentMethod;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn request(period: &str, ids: Vec<i64>) -> GenerationRequest {
        GenerationRequest {
            period: period.parse().unwrap(),
            due_type_ids: ids,
        }
    }

    #[tokio::test]
    async fn test_empty_selection_rejected_before_any_query() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let members = StaticMemberDirectory::new(vec![1]);

        let result =
            generate_obligations(&db, &request("2025-01", vec![]), &members, &Settings::default())
                .await;
        assert!(matches!(result, Err(Error::MissingMandatoryType { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_requires_flat_fee() -> Result<()> {
        let db = setup_test_db().await?;
        let misc = create_custom_due_type(&db, "Hall fund", DueCategory::Misc, dec!(5), 2).await?;
        let members = StaticMemberDirectory::new(vec![1, 2]);

        let result = generate_obligations(
            &db,
            &request("2025-01", vec![misc.id]),
            &members,
            &Settings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::MissingMandatoryType { .. })));
        assert_eq!(Obligation::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_creates_one_obligation_per_member_and_type() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let misc = create_custom_due_type(&db, "Hall fund", DueCategory::Misc, dec!(5), 2).await?;
        let members = StaticMemberDirectory::new(vec![1, 2, 3]);
        let settings = Settings { due_day_offset: 5 };

        let result = generate_obligations(
            &db,
            &request("2025-01", vec![flat.id, misc.id]),
            &members,
            &settings,
        )
        .await?;

        assert_eq!(result.created_count, 6);
        assert_eq!(result.exempted_count, 0);
        assert_eq!(result.members_processed, 3);
        assert_eq!(
            result.due_date,
            NaiveDate::from_ymd_opt(2025, 2, 5).unwrap()
        );

        let all = Obligation::find().all(&db).await?;
        assert_eq!(all.len(), 6);
        for o in &all {
            assert_eq!(o.period, "2025-01");
            assert_eq!(o.due_date, result.due_date);
            assert_eq!(o.amount_paid, Decimal::ZERO);
            assert_eq!(o.amount_remaining, o.amount_expected);
        }
        let flat_total: Decimal = all
            .iter()
            .filter(|o| o.due_type_id == flat.id)
            .map(|o| o.amount_expected)
            .sum();
        assert_eq!(flat_total, dec!(45));
        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_and_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let members = StaticMemberDirectory::new(vec![1, 2]);
        let req = request("2025-01", vec![flat.id]);

        generate_obligations(&db, &req, &members, &Settings::default()).await?;
        let before = Obligation::find().all(&db).await?;

        let second = generate_obligations(&db, &req, &members, &Settings::default()).await;
        assert!(matches!(
            second,
            Err(Error::AlreadyExists { unsettled: 2, .. })
        ));
        let after = Obligation::find().all(&db).await?;
        assert_eq!(before, after);
        Ok(())
    }

    #[tokio::test]
    async fn test_settled_period_only_adds_missing_members() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let req = request("2025-01", vec![flat.id]);

        generate_obligations(&db, &req, &StaticMemberDirectory::new(vec![1]), &Settings::default())
            .await?;
        apply_payment(
            &db,
            PaymentRequest::new(1, dec!(15), PaymentMethod::Cash),
            &FixedClock::on("2025-01-10")?,
        )
        .await?;

        let result = generate_obligations(
            &db,
            &req,
            &StaticMemberDirectory::new(vec![1, 2]),
            &Settings::default(),
        )
        .await?;
        assert_eq!(result.created_count, 1);
        assert_eq!(result.skipped_existing, 1);
        assert_eq!(Obligation::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_and_assistance_types_cannot_be_selected() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let assistance = create_assistance_type(&db, true).await?;
        let old = create_custom_due_type(&db, "Old levy", DueCategory::Misc, dec!(3), 5).await?;
        crate::core::catalog::set_due_type_active(&db, old.id, false).await?;
        let members = StaticMemberDirectory::new(vec![1]);

        let result = generate_obligations(
            &db,
            &request("2025-01", vec![flat.id, assistance.id]),
            &members,
            &Settings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = generate_obligations(
            &db,
            &request("2025-01", vec![flat.id, old.id]),
            &members,
            &Settings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = generate_obligations(
            &db,
            &request("2025-01", vec![flat.id, 999]),
            &members,
            &Settings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_assigned_case_rides_along_with_beneficiary_waived() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let assistance = create_assistance_type(&db, true).await?;
        let clock = FixedClock::on("2025-01-05")?;
        let case = create_test_case(&db, 2, assistance.id, dec!(80)).await?;
        crate::core::assistance::assign_assistance_to_period(
            &db,
            case.id,
            "2025-01".parse()?,
            &clock,
        )
        .await?;

        let members = StaticMemberDirectory::new(vec![1, 2, 3]);
        let result = generate_obligations(
            &db,
            &request("2025-01", vec![flat.id]),
            &members,
            &Settings::default(),
        )
        .await?;

        assert_eq!(result.created_count, 6);
        assert_eq!(result.assistance_count, 3);
        assert_eq!(result.exempted_count, 1);

        let case_dues = Obligation::find()
            .filter(obligation::Column::AssistanceCaseId.eq(case.id))
            .all(&db)
            .await?;
        assert_eq!(case_dues.len(), 3);
        for due in &case_dues {
            assert_eq!(due.beneficiary_member_id, Some(2));
            if due.member_id == 2 {
                assert_eq!(due.amount_expected, Decimal::ZERO);
                assert_eq!(status_of(due, clock.today()), ObligationStatus::Paid);
            } else {
                assert_eq!(due.amount_expected, assistance.amount);
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unpaid_keeps_touched_obligations() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let members = StaticMemberDirectory::new(vec![1, 2]);
        generate_obligations(
            &db,
            &request("2025-01", vec![flat.id]),
            &members,
            &Settings::default(),
        )
        .await?;
        apply_payment(
            &db,
            PaymentRequest::new(1, dec!(5), PaymentMethod::Cash),
            &FixedClock::on("2025-01-10")?,
        )
        .await?;

        let removed = remove_unpaid_obligations(&db, "2025-01".parse()?).await?;
        assert_eq!(removed, 1);
        let left = Obligation::find().all(&db).await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].member_id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_period_summary_counts_statuses() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let members = StaticMemberDirectory::new(vec![1, 2, 3]);
        generate_obligations(
            &db,
            &request("2025-01", vec![flat.id]),
            &members,
            &Settings::default(),
        )
        .await?;
        let clock = FixedClock::on("2025-02-15")?;
        apply_payment(&db, PaymentRequest::new(1, dec!(15), PaymentMethod::Cash), &clock).await?;
        apply_payment(&db, PaymentRequest::new(2, dec!(5), PaymentMethod::Cash), &clock).await?;

        let summary = period_summary(&db, "2025-01".parse()?, &clock).await?;
        assert_eq!(summary.obligation_count, 3);
        assert_eq!(summary.paid, 1);
        assert_eq!(summary.partially_paid, 1);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.total_expected, dec!(45));
        assert_eq!(summary.total_paid, dec!(20));
        assert_eq!(summary.total_remaining, dec!(25));
        Ok(())
    }

    #[tokio::test]
    async fn test_case_subject_waived_from_exempt_misc_type() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let levy = crate::core::catalog::create_due_type(
            &db,
            crate::core::catalog::NewDueType {
                name: "Hall levy".to_string(),
                amount: dec!(5),
                category: DueCategory::Misc,
                mandatory: false,
                order: 2,
                beneficiary_exempt: true,
            },
        )
        .await?;
        let assistance = create_assistance_type(&db, true).await?;
        create_test_case(&db, 2, assistance.id, dec!(80)).await?;

        let result = generate_for(&db, "2025-01", vec![flat.id, levy.id], vec![1, 2]).await?;
        assert_eq!(result.created_count, 4);
        assert_eq!(result.exempted_count, 1);

        let levies = Obligation::find()
            .filter(obligation::Column::DueTypeId.eq(levy.id))
            .order_by_asc(obligation::Column::MemberId)
            .all(&db)
            .await?;
        assert_eq!(levies[0].amount_expected, dec!(5));
        assert_eq!(levies[1].member_id, 2);
        assert_eq!(levies[1].amount_expected, Decimal::ZERO);
        assert_eq!(levies[1].amount_remaining, Decimal::ZERO);

        // the flat fee is not exempt, so member 2 still owes it
        let flat_due = Obligation::find()
            .filter(obligation::Column::DueTypeId.eq(flat.id))
            .filter(obligation::Column::MemberId.eq(2))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(flat_due.amount_expected, dec!(15));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unpaid_settles_case_with_only_paid_dues_left() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let assistance = create_assistance_type(&db, true).await?;
        let clock = FixedClock::on("2025-01-05")?;
        let case = create_test_case(&db, 3, assistance.id, dec!(80)).await?;
        crate::core::assistance::assign_assistance_to_period(
            &db,
            case.id,
            "2025-01".parse()?,
            &clock,
        )
        .await?;
        generate_for(&db, "2025-01", vec![flat.id], vec![1, 2]).await?;

        apply_payment(
            &db,
            PaymentRequest::new(1, dec!(15) + assistance.amount, PaymentMethod::Cash),
            &clock,
        )
        .await?;
        let before = crate::core::assistance::require_case(&db, case.id).await?;
        assert_eq!(before.status, CaseStatus::Assigned);

        remove_unpaid_obligations(&db, "2025-01".parse()?).await?;

        let case_dues = Obligation::find()
            .filter(obligation::Column::AssistanceCaseId.eq(case.id))
            .all(&db)
            .await?;
        assert_eq!(case_dues.len(), 1);
        let after = crate::core::assistance::require_case(&db, case.id).await?;
        assert_eq!(after.status, CaseStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unpaid_keeps_uncollected_case_assigned() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let assistance = create_assistance_type(&db, true).await?;
        let clock = FixedClock::on("2025-01-05")?;
        let case = create_test_case(&db, 3, assistance.id, dec!(80)).await?;
        crate::core::assistance::assign_assistance_to_period(
            &db,
            case.id,
            "2025-01".parse()?,
            &clock,
        )
        .await?;
        generate_for(&db, "2025-01", vec![flat.id], vec![1, 2]).await?;

        remove_unpaid_obligations(&db, "2025-01".parse()?).await?;

        assert_eq!(Obligation::find().count(&db).await?, 0);
        let after = crate::core::assistance::require_case(&db, case.id).await?;
        assert_eq!(after.status, CaseStatus::Assigned);
        Ok(())
    }

    #[tokio::test]
    async fn test_conflicting_insert_reports_already_exists() -> Result<()> {
        let db = setup_test_db().await?;
        let flat = create_flat_fee(&db).await?;
        let period: Period = "2025-01".parse()?;

        // another run inserted member 1's fee after this one planned its batch
        let winner = insert_obligation(&db, 1, flat.id, "2025-01", dec!(15)).await?;
        let planned = |member_id: i64| obligation::ActiveModel {
            period: Set(period.to_string()),
            member_id: Set(member_id),
            due_type_id: Set(flat.id),
            beneficiary_member_id: Set(None),
            assistance_case_id: Set(None),
            amount_expected: Set(dec!(15)),
            amount_paid: Set(Decimal::ZERO),
            amount_remaining: Set(dec!(15)),
            due_date: Set(period.due_date(0)),
            cancelled: Set(false),
            version: Set(0),
            dedup_key: Set(obligation::dedup_key(member_id, flat.id, "2025-01", None)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let txn = db.begin().await?;
        let result = insert_rows(&txn, vec![planned(2), planned(1)], period).await;
        assert!(matches!(result, Err(Error::AlreadyExists { .. })));
        txn.rollback().await?;

        let stored = Obligation::find().all(&db).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, winner.id);
        Ok(())
    }
}
