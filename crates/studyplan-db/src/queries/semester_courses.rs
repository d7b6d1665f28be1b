//! Database query functions for the `semester_courses` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::models::{PlanProgress, SemesterCourse};

/// Insert a placement at an explicit ordinal. Callers hold the semester's
/// row lock and have already ruled out a duplicate `course_id`.
pub async fn insert_semester_course<'e, E: PgExecutor<'e>>(
    executor: E,
    semester_id: i64,
    course_id: &str,
    course_order: i32,
) -> Result<SemesterCourse> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "INSERT INTO semester_courses (semester_id, course_id, course_order) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(semester_id)
    .bind(course_id)
    .bind(course_order)
    .fetch_one(executor)
    .await
    .context("failed to insert semester course")?;

    Ok(placement)
}

/// Insert a full copy of a placement into another semester (plan duplication).
pub async fn copy_semester_course<'e, E: PgExecutor<'e>>(
    executor: E,
    semester_id: i64,
    source: &SemesterCourse,
) -> Result<SemesterCourse> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "INSERT INTO semester_courses \
             (semester_id, course_id, is_completed, completion_date, course_order) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(semester_id)
    .bind(&source.course_id)
    .bind(source.is_completed)
    .bind(source.completion_date)
    .bind(source.course_order)
    .fetch_one(executor)
    .await
    .context("failed to copy semester course")?;

    Ok(placement)
}

/// Fetch a placement by ID.
pub async fn get_semester_course<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<SemesterCourse>> {
    let placement =
        sqlx::query_as::<_, SemesterCourse>("SELECT * FROM semester_courses WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch semester course")?;

    Ok(placement)
}

/// Fetch a placement and row-lock it for the rest of the transaction.
pub async fn lock_semester_course<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<SemesterCourse>> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "SELECT * FROM semester_courses WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to lock semester course")?;

    Ok(placement)
}

/// List a semester's placements by ordinal.
pub async fn list_for_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    semester_id: i64,
) -> Result<Vec<SemesterCourse>> {
    let placements = sqlx::query_as::<_, SemesterCourse>(
        "SELECT * FROM semester_courses WHERE semester_id = $1 ORDER BY course_order ASC, id ASC",
    )
    .bind(semester_id)
    .fetch_all(executor)
    .await
    .context("failed to list semester courses")?;

    Ok(placements)
}

/// List every placement of a plan, by semester ordinal then course ordinal.
pub async fn list_for_plan<'e, E: PgExecutor<'e>>(
    executor: E,
    study_plan_id: i64,
) -> Result<Vec<SemesterCourse>> {
    let placements = sqlx::query_as::<_, SemesterCourse>(
        "SELECT sc.* FROM semester_courses sc \
         JOIN semesters s ON s.id = sc.semester_id \
         WHERE s.study_plan_id = $1 \
         ORDER BY s.semester_order ASC, sc.course_order ASC, sc.id ASC",
    )
    .bind(study_plan_id)
    .fetch_all(executor)
    .await
    .context("failed to list semester courses for plan")?;

    Ok(placements)
}

/// Find the live placement of `course_id` in a semester, if any.
pub async fn find_in_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    semester_id: i64,
    course_id: &str,
) -> Result<Option<SemesterCourse>> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "SELECT * FROM semester_courses WHERE semester_id = $1 AND course_id = $2",
    )
    .bind(semester_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
    .context("failed to look up course in semester")?;

    Ok(placement)
}

/// Highest ordinal in use within a semester, or 0 when it is empty.
pub async fn max_course_order<'e, E: PgExecutor<'e>>(executor: E, semester_id: i64) -> Result<i32> {
    let row: (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(course_order), 0) FROM semester_courses WHERE semester_id = $1",
    )
    .bind(semester_id)
    .fetch_one(executor)
    .await
    .context("failed to read max course order")?;

    Ok(row.0)
}

/// Write both halves of the completion pair together.
pub async fn set_completion<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    is_completed: bool,
    completion_date: Option<DateTime<Utc>>,
) -> Result<Option<SemesterCourse>> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "UPDATE semester_courses \
         SET is_completed = $1, completion_date = $2 \
         WHERE id = $3 \
         RETURNING *",
    )
    .bind(is_completed)
    .bind(completion_date)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to update course completion")?;

    Ok(placement)
}

/// Re-home a placement under another semester at the given ordinal.
pub async fn relocate<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    semester_id: i64,
    course_order: i32,
) -> Result<Option<SemesterCourse>> {
    let placement = sqlx::query_as::<_, SemesterCourse>(
        "UPDATE semester_courses \
         SET semester_id = $1, course_order = $2 \
         WHERE id = $3 \
         RETURNING *",
    )
    .bind(semester_id)
    .bind(course_order)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to move semester course")?;

    Ok(placement)
}

/// Set one placement's ordinal (reorder, inside a transaction).
pub async fn set_course_order<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    course_order: i32,
) -> Result<u64> {
    let result = sqlx::query("UPDATE semester_courses SET course_order = $1 WHERE id = $2")
        .bind(course_order)
        .bind(id)
        .execute(executor)
        .await
        .context("failed to set course order")?;

    Ok(result.rows_affected())
}

/// Delete one placement. Returns whether a row was removed.
pub async fn delete_semester_course<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM semester_courses WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await
        .context("failed to delete semester course")?;

    Ok(result.rows_affected() > 0)
}

/// Delete every placement of a semester. Returns the number removed.
pub async fn delete_for_semester<'e, E: PgExecutor<'e>>(
    executor: E,
    semester_id: i64,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM semester_courses WHERE semester_id = $1")
        .bind(semester_id)
        .execute(executor)
        .await
        .context("failed to clear semester courses")?;

    Ok(result.rows_affected())
}

/// Total and completed placement counts for a plan.
pub async fn plan_progress<'e, E: PgExecutor<'e>>(
    executor: E,
    study_plan_id: i64,
) -> Result<PlanProgress> {
    let progress = sqlx::query_as::<_, PlanProgress>(
        "SELECT COUNT(sc.id) AS total, \
                COUNT(sc.id) FILTER (WHERE sc.is_completed) AS completed \
         FROM semester_courses sc \
         JOIN semesters s ON s.id = sc.semester_id \
         WHERE s.study_plan_id = $1",
    )
    .bind(study_plan_id)
    .fetch_one(executor)
    .await
    .context("failed to compute plan progress")?;

    Ok(progress)
}
