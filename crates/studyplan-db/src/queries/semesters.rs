//! Database query functions for the `semesters` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::{Season, Semester};

/// Insert a semester at an explicit ordinal. Callers are expected to hold
/// the parent plan's row lock and to have chosen a free ordinal.
pub async fn insert_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    study_plan_id: i64,
    name: &str,
    semester_order: i32,
    winter_or_summer: Option<Season>,
) -> Result<Semester> {
    let semester = sqlx::query_as::<_, Semester>(
        "INSERT INTO semesters (study_plan_id, name, semester_order, winter_or_summer) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(study_plan_id)
    .bind(name)
    .bind(semester_order)
    .bind(winter_or_summer)
    .fetch_one(executor)
    .await
    .context("failed to insert semester")?;

    Ok(semester)
}

/// Fetch a semester by ID.
pub async fn get_semester<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Semester>> {
    let semester = sqlx::query_as::<_, Semester>("SELECT * FROM semesters WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch semester")?;

    Ok(semester)
}

/// Fetch a semester and row-lock it for the rest of the transaction.
pub async fn lock_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Semester>> {
    let semester = sqlx::query_as::<_, Semester>("SELECT * FROM semesters WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to lock semester")?;

    Ok(semester)
}

/// List a plan's semesters by ordinal.
pub async fn list_semesters_for_plan<'e, E: PgExecutor<'e>>(
    executor: E,
    study_plan_id: i64,
) -> Result<Vec<Semester>> {
    let semesters = sqlx::query_as::<_, Semester>(
        "SELECT * FROM semesters WHERE study_plan_id = $1 ORDER BY semester_order ASC, id ASC",
    )
    .bind(study_plan_id)
    .fetch_all(executor)
    .await
    .context("failed to list semesters for plan")?;

    Ok(semesters)
}

/// Highest ordinal in use under a plan, or 0 when it has no semesters.
pub async fn max_semester_order<'e, E: PgExecutor<'e>>(
    executor: E,
    study_plan_id: i64,
) -> Result<i32> {
    let row: (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(semester_order), 0) FROM semesters WHERE study_plan_id = $1",
    )
    .bind(study_plan_id)
    .fetch_one(executor)
    .await
    .context("failed to read max semester order")?;

    Ok(row.0)
}

/// Update name, season and ordinal of a semester and bump `updated_at`.
pub async fn update_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    name: &str,
    winter_or_summer: Option<Season>,
    semester_order: i32,
) -> Result<Option<Semester>> {
    let semester = sqlx::query_as::<_, Semester>(
        "UPDATE semesters \
         SET name = $1, winter_or_summer = $2, semester_order = $3, updated_at = now() \
         WHERE id = $4 \
         RETURNING *",
    )
    .bind(name)
    .bind(winter_or_summer)
    .bind(semester_order)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to update semester")?;

    Ok(semester)
}

/// Set one semester's ordinal. Used by reorder inside a transaction, where
/// the deferred UNIQUE constraint tolerates transient duplicates.
pub async fn set_semester_order<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    semester_order: i32,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE semesters SET semester_order = $1, updated_at = now() WHERE id = $2",
    )
    .bind(semester_order)
    .bind(id)
    .execute(executor)
    .await
    .context("failed to set semester order")?;

    Ok(result.rows_affected())
}

/// Delete a semester; its placements cascade. Returns whether a row was removed.
pub async fn delete_semester<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM semesters WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await
        .context("failed to delete semester")?;

    Ok(result.rows_affected() > 0)
}
