//! Database query functions for the `study_plans` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::StudyPlan;

/// Insert a new plan row. Returns the inserted plan with server-generated
/// defaults (id, timestamps, `is_active = true`).
pub async fn insert_plan<'e, E: PgExecutor<'e>>(
    executor: E,
    owner_id: i64,
    name: &str,
    study_program_id: Option<i64>,
    study_program_name: Option<&str>,
) -> Result<StudyPlan> {
    let plan = sqlx::query_as::<_, StudyPlan>(
        "INSERT INTO study_plans (owner_id, name, study_program_id, study_program_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(owner_id)
    .bind(name)
    .bind(study_program_id)
    .bind(study_program_name)
    .fetch_one(executor)
    .await
    .context("failed to insert study plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<StudyPlan>> {
    let plan = sqlx::query_as::<_, StudyPlan>("SELECT * FROM study_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch study plan")?;

    Ok(plan)
}

/// Fetch a plan and take a row lock on it until the surrounding transaction
/// ends. Serialises every ordinal-affecting write under this plan.
pub async fn lock_plan<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<StudyPlan>> {
    let plan = sqlx::query_as::<_, StudyPlan>("SELECT * FROM study_plans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to lock study plan")?;

    Ok(plan)
}

/// Take a transaction-scoped advisory lock keyed on the owner. Serialises
/// plan creation per owner so the active-plan limit cannot be overshot.
pub async fn lock_owner<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(owner_id)
        .execute(executor)
        .await
        .context("failed to take owner lock")?;

    Ok(())
}

/// List an owner's plans, newest first.
pub async fn list_plans_for_owner<'e, E: PgExecutor<'e>>(
    executor: E,
    owner_id: i64,
) -> Result<Vec<StudyPlan>> {
    let plans = sqlx::query_as::<_, StudyPlan>(
        "SELECT * FROM study_plans WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(executor)
    .await
    .context("failed to list study plans for owner")?;

    Ok(plans)
}

/// Count an owner's active plans.
pub async fn count_active_plans<'e, E: PgExecutor<'e>>(executor: E, owner_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM study_plans WHERE owner_id = $1 AND is_active",
    )
    .bind(owner_id)
    .fetch_one(executor)
    .await
    .context("failed to count active study plans")?;

    Ok(row.0)
}

/// Write the mutable columns of `plan` back and bump `updated_at`.
///
/// `owner_id` is never written: ownership is immutable after creation.
/// Returns `None` if the row no longer exists.
pub async fn update_plan<'e, E: PgExecutor<'e>>(
    executor: E,
    plan: &StudyPlan,
) -> Result<Option<StudyPlan>> {
    let updated = sqlx::query_as::<_, StudyPlan>(
        "UPDATE study_plans \
         SET name = $1, study_program_id = $2, study_program_name = $3, \
             is_active = $4, updated_at = now() \
         WHERE id = $5 \
         RETURNING *",
    )
    .bind(&plan.name)
    .bind(plan.study_program_id)
    .bind(&plan.study_program_name)
    .bind(plan.is_active)
    .bind(plan.id)
    .fetch_optional(executor)
    .await
    .context("failed to update study plan")?;

    Ok(updated)
}

/// Refresh only the cached program display name. Leaves `updated_at` alone
/// since the cache is not user-visible state.
pub async fn set_program_name<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    study_program_name: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query("UPDATE study_plans SET study_program_name = $1 WHERE id = $2")
        .bind(study_program_name)
        .bind(id)
        .execute(executor)
        .await
        .context("failed to cache study program name")?;

    Ok(result.rows_affected())
}

/// Delete a plan. Semesters and placements go with it via `ON DELETE CASCADE`.
/// Returns whether a row was removed.
pub async fn delete_plan<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM study_plans WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await
        .context("failed to delete study plan")?;

    Ok(result.rows_affected() > 0)
}
