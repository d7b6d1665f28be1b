//! Typed query functions, one module per table.
//!
//! Every function is generic over [`sqlx::PgExecutor`] so it can run against
//! the pool directly or inside a caller-owned transaction (`&mut *tx`).

pub mod plans;
pub mod semester_courses;
pub mod semesters;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Whether `err` (anywhere in its chain) is a PostgreSQL unique violation.
///
/// Lets callers turn a lost race against a UNIQUE constraint into a
/// business-level conflict instead of an internal error.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION)
    })
}
