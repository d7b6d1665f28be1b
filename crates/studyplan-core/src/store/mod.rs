//! The ordered hierarchy store.
//!
//! [`HierarchyStore`] is the persistence seam for plans, semesters and
//! placements. Implementations must make every ordinal-affecting write atomic
//! with respect to other writes under the same parent:
//!
//! - [`PgStore`] locks the parent row inside a transaction.
//! - [`MemoryStore`] serialises everything behind one mutex.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use studyplan_db::models::{PlanProgress, Season, Semester, SemesterCourse, StudyPlan};

use crate::ordering::OrderExhausted;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by a [`HierarchyStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A uniqueness rule would be broken (course already placed, ordinal or
    /// semester name taken).
    #[error("{0}")]
    Duplicate(String),

    /// The request is well-formed but not applicable (foreign id in a
    /// reorder, active-plan limit reached).
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<OrderExhausted> for StoreError {
    fn from(err: OrderExhausted) -> Self {
        StoreError::Invalid(err.to_string())
    }
}

pub(crate) const PLAN: &str = "study plan";
pub(crate) const SEMESTER: &str = "semester";
pub(crate) const PLACEMENT: &str = "semester course";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fields for a new plan. Validation happens before this reaches the store.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub owner_id: i64,
    pub name: String,
    pub study_program_id: Option<i64>,
    pub study_program_name: Option<String>,
}

/// Fields for a new semester. `order: None` appends after the last sibling.
#[derive(Debug, Clone)]
pub struct NewSemester {
    pub study_plan_id: i64,
    pub name: String,
    pub season: Option<Season>,
    pub order: Option<i32>,
}

/// Partial update of a semester. `None` leaves a field untouched; for
/// `season`, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SemesterChanges {
    pub name: Option<String>,
    pub season: Option<Option<Season>>,
    pub order: Option<i32>,
}

/// Requested change to a placement's completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionChange {
    Toggle,
    Set(bool),
}

/// Resolve a completion change against the current pair.
///
/// Marking complete keeps an existing date and otherwise stamps `now`;
/// marking incomplete always clears the date. The returned pair always
/// satisfies `completed == date.is_some()`.
pub fn apply_completion(
    current: (bool, Option<DateTime<Utc>>),
    change: CompletionChange,
    now: DateTime<Utc>,
) -> (bool, Option<DateTime<Utc>>) {
    let (completed, date) = current;
    let target = match change {
        CompletionChange::Toggle => !completed,
        CompletionChange::Set(value) => value,
    };
    if target {
        (true, Some(date.unwrap_or(now)))
    } else {
        (false, None)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistent representation of the plan → semester → placement tree.
///
/// Object-safe so it can be shared as `Arc<dyn HierarchyStore>`.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    // Plans

    /// Insert a plan, failing with [`StoreError::Invalid`] if the owner
    /// already has `active_limit` active plans.
    async fn insert_plan(&self, new: NewPlan, active_limit: i64) -> Result<StudyPlan, StoreError>;

    async fn get_plan(&self, id: i64) -> Result<Option<StudyPlan>, StoreError>;

    /// An owner's plans, newest first.
    async fn list_plans_for_owner(&self, owner_id: i64) -> Result<Vec<StudyPlan>, StoreError>;

    async fn count_active_plans(&self, owner_id: i64) -> Result<i64, StoreError>;

    /// Write back name, program reference, cached program name and active
    /// flag. The owner is never changed.
    async fn update_plan(&self, plan: &StudyPlan) -> Result<StudyPlan, StoreError>;

    /// Refresh the cached program display name only.
    async fn set_program_name(&self, id: i64, name: Option<&str>) -> Result<(), StoreError>;

    /// Delete a plan and everything under it. Returns whether it existed.
    async fn delete_plan(&self, id: i64) -> Result<bool, StoreError>;

    /// Deep-copy a plan (semesters, placements, completion state) under a
    /// new name, subject to the same active-plan limit as [`insert_plan`].
    ///
    /// [`insert_plan`]: HierarchyStore::insert_plan
    async fn duplicate_plan(
        &self,
        source_id: i64,
        new_name: &str,
        active_limit: i64,
    ) -> Result<StudyPlan, StoreError>;

    // Semesters

    /// Insert a semester. Fails with [`StoreError::Duplicate`] if the name
    /// or an explicit ordinal is already used within the plan.
    async fn insert_semester(&self, new: NewSemester) -> Result<Semester, StoreError>;

    /// Create the bootstrap semester at order 1 if, and only if, the plan
    /// has no semesters. Returns the created semester, if any.
    async fn ensure_default_semester(
        &self,
        plan_id: i64,
        name: &str,
        season: Season,
    ) -> Result<Option<Semester>, StoreError>;

    async fn get_semester(&self, id: i64) -> Result<Option<Semester>, StoreError>;

    /// A plan's semesters by ordinal.
    async fn list_semesters(&self, plan_id: i64) -> Result<Vec<Semester>, StoreError>;

    async fn update_semester(
        &self,
        id: i64,
        changes: SemesterChanges,
    ) -> Result<Semester, StoreError>;

    /// Delete a semester and its placements. Returns whether it existed.
    async fn delete_semester(&self, id: i64) -> Result<bool, StoreError>;

    /// Apply [`crate::ordering::plan_reorder`] to a plan's semesters and
    /// return them in their new order.
    async fn reorder_semesters(
        &self,
        plan_id: i64,
        semester_ids: &[i64],
    ) -> Result<Vec<Semester>, StoreError>;

    // Placements

    /// Place a course in a semester. Fails with [`StoreError::Duplicate`]
    /// if the course is already there or an explicit ordinal is taken.
    async fn insert_placement(
        &self,
        semester_id: i64,
        course_id: &str,
        order: Option<i32>,
    ) -> Result<SemesterCourse, StoreError>;

    async fn get_placement(&self, id: i64) -> Result<Option<SemesterCourse>, StoreError>;

    /// A semester's placements by ordinal.
    async fn list_placements(&self, semester_id: i64) -> Result<Vec<SemesterCourse>, StoreError>;

    /// Every placement of a plan, by semester ordinal then course ordinal.
    async fn list_placements_for_plan(
        &self,
        plan_id: i64,
    ) -> Result<Vec<SemesterCourse>, StoreError>;

    /// Re-home a placement at the end of another semester. Fails with
    /// [`StoreError::Duplicate`] if the target already holds the course,
    /// which includes moving a placement onto its own semester.
    async fn move_placement(
        &self,
        id: i64,
        target_semester_id: i64,
    ) -> Result<SemesterCourse, StoreError>;

    /// Change completion state through [`apply_completion`].
    async fn set_completion(
        &self,
        id: i64,
        change: CompletionChange,
        now: DateTime<Utc>,
    ) -> Result<SemesterCourse, StoreError>;

    async fn delete_placement(&self, id: i64) -> Result<bool, StoreError>;

    /// Remove every placement of a semester. Returns how many were removed.
    async fn delete_placements_for_semester(&self, semester_id: i64) -> Result<u64, StoreError>;

    async fn reorder_placements(
        &self,
        semester_id: i64,
        placement_ids: &[i64],
    ) -> Result<Vec<SemesterCourse>, StoreError>;

    async fn plan_progress(&self, plan_id: i64) -> Result<PlanProgress, StoreError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn HierarchyStore) {}
};

pub(crate) fn limit_message(limit: i64) -> String {
    format!("an owner may have at most {limit} active study plans")
}

pub(crate) fn course_taken_message(course_id: &str, semester_id: i64) -> String {
    format!("course {course_id} is already placed in semester {semester_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn toggle_on_stamps_now() {
        let now = Utc::now();
        assert_eq!(
            apply_completion((false, None), CompletionChange::Toggle, now),
            (true, Some(now))
        );
    }

    #[test]
    fn toggle_off_clears_date() {
        let now = Utc::now();
        let earlier = now - Duration::days(3);
        assert_eq!(
            apply_completion((true, Some(earlier)), CompletionChange::Toggle, now),
            (false, None)
        );
    }

    #[test]
    fn set_true_keeps_existing_date() {
        let now = Utc::now();
        let earlier = now - Duration::days(3);
        assert_eq!(
            apply_completion((true, Some(earlier)), CompletionChange::Set(true), now),
            (true, Some(earlier))
        );
    }

    #[test]
    fn set_false_on_incomplete_is_noop() {
        let now = Utc::now();
        assert_eq!(
            apply_completion((false, None), CompletionChange::Set(false), now),
            (false, None)
        );
    }
}
