//! PostgreSQL-backed [`HierarchyStore`].
//!
//! Every write that reads then assigns an ordinal runs in one transaction
//! that first takes `SELECT ... FOR UPDATE` on the parent row. Concurrent
//! writers under the same parent queue on that lock; plain reads never wait.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use studyplan_db::models::{PlanProgress, Season, Semester, SemesterCourse, StudyPlan};
use studyplan_db::queries::{
    self, plans as plan_db, semester_courses as course_db, semesters as semester_db,
};

use super::{
    CompletionChange, HierarchyStore, NewPlan, NewSemester, PLACEMENT, PLAN, SEMESTER,
    SemesterChanges, StoreError, apply_completion, course_taken_message, limit_message,
};
use crate::ordering::{next_order, plan_reorder};

/// A [`HierarchyStore`] over a sqlx connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn a lost race against a UNIQUE constraint into a conflict; anything
/// else stays internal.
fn conflict_or_internal(err: anyhow::Error, message: impl FnOnce() -> String) -> StoreError {
    if queries::is_unique_violation(&err) {
        StoreError::Duplicate(message())
    } else {
        StoreError::Internal(err)
    }
}

fn semester_name_message(name: &str) -> String {
    format!("a semester named {name:?} already exists in this study plan")
}

fn semester_order_message(order: i32) -> String {
    format!("semester order {order} is already taken in this study plan")
}

#[async_trait]
impl HierarchyStore for PgStore {
    async fn insert_plan(&self, new: NewPlan, active_limit: i64) -> Result<StudyPlan, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        plan_db::lock_owner(&mut *tx, new.owner_id).await?;
        if plan_db::count_active_plans(&mut *tx, new.owner_id).await? >= active_limit {
            return Err(StoreError::Invalid(limit_message(active_limit)));
        }
        let plan = plan_db::insert_plan(
            &mut *tx,
            new.owner_id,
            &new.name,
            new.study_program_id,
            new.study_program_name.as_deref(),
        )
        .await?;

        tx.commit().await.context("failed to commit plan insert")?;
        Ok(plan)
    }

    async fn get_plan(&self, id: i64) -> Result<Option<StudyPlan>, StoreError> {
        Ok(plan_db::get_plan(&self.pool, id).await?)
    }

    async fn list_plans_for_owner(&self, owner_id: i64) -> Result<Vec<StudyPlan>, StoreError> {
        Ok(plan_db::list_plans_for_owner(&self.pool, owner_id).await?)
    }

    async fn count_active_plans(&self, owner_id: i64) -> Result<i64, StoreError> {
        Ok(plan_db::count_active_plans(&self.pool, owner_id).await?)
    }

    async fn update_plan(&self, plan: &StudyPlan) -> Result<StudyPlan, StoreError> {
        plan_db::update_plan(&self.pool, plan)
            .await?
            .ok_or(StoreError::NotFound {
                entity: PLAN,
                id: plan.id,
            })
    }

    async fn set_program_name(&self, id: i64, name: Option<&str>) -> Result<(), StoreError> {
        plan_db::set_program_name(&self.pool, id, name).await?;
        Ok(())
    }

    async fn delete_plan(&self, id: i64) -> Result<bool, StoreError> {
        Ok(plan_db::delete_plan(&self.pool, id).await?)
    }

    async fn duplicate_plan(
        &self,
        source_id: i64,
        new_name: &str,
        active_limit: i64,
    ) -> Result<StudyPlan, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let source = plan_db::lock_plan(&mut *tx, source_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: PLAN,
                id: source_id,
            })?;
        plan_db::lock_owner(&mut *tx, source.owner_id).await?;
        if plan_db::count_active_plans(&mut *tx, source.owner_id).await? >= active_limit {
            return Err(StoreError::Invalid(limit_message(active_limit)));
        }

        let copy = plan_db::insert_plan(
            &mut *tx,
            source.owner_id,
            new_name,
            source.study_program_id,
            source.study_program_name.as_deref(),
        )
        .await?;

        let semesters = semester_db::list_semesters_for_plan(&mut *tx, source_id).await?;
        for semester in &semesters {
            let target = semester_db::insert_semester(
                &mut *tx,
                copy.id,
                &semester.name,
                semester.semester_order,
                semester.winter_or_summer,
            )
            .await?;
            for placement in course_db::list_for_semester(&mut *tx, semester.id).await? {
                course_db::copy_semester_course(&mut *tx, target.id, &placement).await?;
            }
        }

        tx.commit().await.context("failed to commit plan duplicate")?;
        Ok(copy)
    }

    async fn insert_semester(&self, new: NewSemester) -> Result<Semester, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        plan_db::lock_plan(&mut *tx, new.study_plan_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: PLAN,
                id: new.study_plan_id,
            })?;
        let siblings = semester_db::list_semesters_for_plan(&mut *tx, new.study_plan_id).await?;
        if siblings.iter().any(|s| s.name == new.name) {
            return Err(StoreError::Duplicate(semester_name_message(&new.name)));
        }
        let order = match new.order {
            Some(order) if siblings.iter().any(|s| s.semester_order == order) => {
                return Err(StoreError::Duplicate(semester_order_message(order)));
            }
            Some(order) => order,
            None => next_order(siblings.iter().map(|s| s.semester_order))?,
        };

        let semester =
            semester_db::insert_semester(&mut *tx, new.study_plan_id, &new.name, order, new.season)
                .await?;
        tx.commit()
            .await
            .context("failed to commit semester insert")
            .map_err(|e| conflict_or_internal(e, || semester_order_message(order)))?;
        Ok(semester)
    }

    async fn ensure_default_semester(
        &self,
        plan_id: i64,
        name: &str,
        season: Season,
    ) -> Result<Option<Semester>, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        plan_db::lock_plan(&mut *tx, plan_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: PLAN,
                id: plan_id,
            })?;
        if semester_db::max_semester_order(&mut *tx, plan_id).await? > 0 {
            return Ok(None);
        }
        let semester =
            semester_db::insert_semester(&mut *tx, plan_id, name, 1, Some(season)).await?;

        tx.commit().await.context("failed to commit default semester")?;
        Ok(Some(semester))
    }

    async fn get_semester(&self, id: i64) -> Result<Option<Semester>, StoreError> {
        Ok(semester_db::get_semester(&self.pool, id).await?)
    }

    async fn list_semesters(&self, plan_id: i64) -> Result<Vec<Semester>, StoreError> {
        Ok(semester_db::list_semesters_for_plan(&self.pool, plan_id).await?)
    }

    async fn update_semester(
        &self,
        id: i64,
        changes: SemesterChanges,
    ) -> Result<Semester, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let current = semester_db::get_semester(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound { entity: SEMESTER, id })?;
        plan_db::lock_plan(&mut *tx, current.study_plan_id).await?;
        let current = semester_db::lock_semester(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound { entity: SEMESTER, id })?;

        let siblings = semester_db::list_semesters_for_plan(&mut *tx, current.study_plan_id).await?;
        let others = || siblings.iter().filter(|s| s.id != id);
        if let Some(name) = &changes.name {
            if others().any(|s| &s.name == name) {
                return Err(StoreError::Duplicate(semester_name_message(name)));
            }
        }
        if let Some(order) = changes.order {
            if others().any(|s| s.semester_order == order) {
                return Err(StoreError::Duplicate(semester_order_message(order)));
            }
        }

        let name = changes.name.unwrap_or(current.name);
        let season = changes.season.unwrap_or(current.winter_or_summer);
        let order = changes.order.unwrap_or(current.semester_order);
        let semester = semester_db::update_semester(&mut *tx, id, &name, season, order)
            .await?
            .ok_or(StoreError::NotFound { entity: SEMESTER, id })?;

        tx.commit()
            .await
            .context("failed to commit semester update")
            .map_err(|e| conflict_or_internal(e, || semester_order_message(order)))?;
        Ok(semester)
    }

    async fn delete_semester(&self, id: i64) -> Result<bool, StoreError> {
        Ok(semester_db::delete_semester(&self.pool, id).await?)
    }

    async fn reorder_semesters(
        &self,
        plan_id: i64,
        semester_ids: &[i64],
    ) -> Result<Vec<Semester>, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        plan_db::lock_plan(&mut *tx, plan_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: PLAN,
                id: plan_id,
            })?;
        let siblings: Vec<(i64, i32)> = semester_db::list_semesters_for_plan(&mut *tx, plan_id)
            .await?
            .iter()
            .map(|s| (s.id, s.semester_order))
            .collect();
        let assignment = plan_reorder(&siblings, semester_ids)
            .map_err(|e| StoreError::Invalid(format!("semesterIds: {e}")))?;

        for (id, order) in assignment {
            let unchanged = siblings.iter().any(|&(sid, old)| sid == id && old == order);
            if !unchanged {
                semester_db::set_semester_order(&mut *tx, id, order).await?;
            }
        }
        let reordered = semester_db::list_semesters_for_plan(&mut *tx, plan_id).await?;

        tx.commit().await.context("failed to commit semester reorder")?;
        Ok(reordered)
    }

    async fn insert_placement(
        &self,
        semester_id: i64,
        course_id: &str,
        order: Option<i32>,
    ) -> Result<SemesterCourse, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        semester_db::lock_semester(&mut *tx, semester_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: SEMESTER,
                id: semester_id,
            })?;
        let siblings = course_db::list_for_semester(&mut *tx, semester_id).await?;
        if siblings.iter().any(|p| p.course_id == course_id) {
            return Err(StoreError::Duplicate(course_taken_message(course_id, semester_id)));
        }
        let order = match order {
            Some(order) if siblings.iter().any(|p| p.course_order == order) => {
                return Err(StoreError::Duplicate(format!(
                    "course order {order} is already taken in semester {semester_id}"
                )));
            }
            Some(order) => order,
            None => next_order(siblings.iter().map(|p| p.course_order))?,
        };

        let placement = course_db::insert_semester_course(&mut *tx, semester_id, course_id, order)
            .await
            .map_err(|e| conflict_or_internal(e, || course_taken_message(course_id, semester_id)))?;
        tx.commit().await.context("failed to commit course placement")?;
        Ok(placement)
    }

    async fn get_placement(&self, id: i64) -> Result<Option<SemesterCourse>, StoreError> {
        Ok(course_db::get_semester_course(&self.pool, id).await?)
    }

    async fn list_placements(&self, semester_id: i64) -> Result<Vec<SemesterCourse>, StoreError> {
        Ok(course_db::list_for_semester(&self.pool, semester_id).await?)
    }

    async fn list_placements_for_plan(
        &self,
        plan_id: i64,
    ) -> Result<Vec<SemesterCourse>, StoreError> {
        Ok(course_db::list_for_plan(&self.pool, plan_id).await?)
    }

    async fn move_placement(
        &self,
        id: i64,
        target_semester_id: i64,
    ) -> Result<SemesterCourse, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let current = course_db::get_semester_course(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;

        // Lock both parents in id order so two opposite moves cannot deadlock.
        let mut parents = [current.semester_id, target_semester_id];
        parents.sort_unstable();
        for semester_id in parents {
            semester_db::lock_semester(&mut *tx, semester_id)
                .await?
                .ok_or(StoreError::NotFound {
                    entity: SEMESTER,
                    id: semester_id,
                })?;
        }

        let current = course_db::lock_semester_course(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;
        if !parents.contains(&current.semester_id) {
            return Err(StoreError::Internal(anyhow::anyhow!(
                "semester course {id} was moved concurrently"
            )));
        }
        if course_db::find_in_semester(&mut *tx, target_semester_id, &current.course_id)
            .await?
            .is_some()
        {
            return Err(StoreError::Duplicate(course_taken_message(
                &current.course_id,
                target_semester_id,
            )));
        }

        let last = course_db::max_course_order(&mut *tx, target_semester_id).await?;
        let order = next_order([last])?;
        let moved = course_db::relocate(&mut *tx, id, target_semester_id, order)
            .await?
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;

        tx.commit().await.context("failed to commit course move")?;
        Ok(moved)
    }

    async fn set_completion(
        &self,
        id: i64,
        change: CompletionChange,
        now: DateTime<Utc>,
    ) -> Result<SemesterCourse, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let current = course_db::lock_semester_course(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;
        let (completed, date) =
            apply_completion((current.is_completed, current.completion_date), change, now);
        let updated = course_db::set_completion(&mut *tx, id, completed, date)
            .await?
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;

        tx.commit().await.context("failed to commit completion change")?;
        Ok(updated)
    }

    async fn delete_placement(&self, id: i64) -> Result<bool, StoreError> {
        Ok(course_db::delete_semester_course(&self.pool, id).await?)
    }

    async fn delete_placements_for_semester(&self, semester_id: i64) -> Result<u64, StoreError> {
        Ok(course_db::delete_for_semester(&self.pool, semester_id).await?)
    }

    async fn reorder_placements(
        &self,
        semester_id: i64,
        placement_ids: &[i64],
    ) -> Result<Vec<SemesterCourse>, StoreError> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        semester_db::lock_semester(&mut *tx, semester_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: SEMESTER,
                id: semester_id,
            })?;
        let siblings: Vec<(i64, i32)> = course_db::list_for_semester(&mut *tx, semester_id)
            .await?
            .iter()
            .map(|p| (p.id, p.course_order))
            .collect();
        let assignment = plan_reorder(&siblings, placement_ids)
            .map_err(|e| StoreError::Invalid(format!("courseIds: {e}")))?;

        for (id, order) in assignment {
            let unchanged = siblings.iter().any(|&(pid, old)| pid == id && old == order);
            if !unchanged {
                course_db::set_course_order(&mut *tx, id, order).await?;
            }
        }
        let reordered = course_db::list_for_semester(&mut *tx, semester_id).await?;

        tx.commit().await.context("failed to commit course reorder")?;
        Ok(reordered)
    }

    async fn plan_progress(&self, plan_id: i64) -> Result<PlanProgress, StoreError> {
        Ok(course_db::plan_progress(&self.pool, plan_id).await?)
    }
}
