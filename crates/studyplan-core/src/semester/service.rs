//! Semester service.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, info};

use studyplan_db::models::{Season, Semester};

use super::{SemesterPatch, default_semester_name, validate_order, validate_semester_name};
use crate::error::ServiceError;
use crate::store::{HierarchyStore, NewSemester, SEMESTER, SemesterChanges};

#[derive(Clone)]
pub struct SemesterService {
    store: Arc<dyn HierarchyStore>,
}

impl SemesterService {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self { store }
    }

    /// Add a semester to a plan. Without an explicit `order` it is appended
    /// after the current last semester.
    pub async fn create_for_plan(
        &self,
        plan_id: i64,
        name: &str,
        season: Option<Season>,
        order: Option<i32>,
    ) -> Result<Semester, ServiceError> {
        let name = validate_semester_name(name)?;
        let order = order
            .map(|o| validate_order("semesterOrder", o))
            .transpose()?;

        let semester = self
            .store
            .insert_semester(NewSemester {
                study_plan_id: plan_id,
                name,
                season,
                order,
            })
            .await?;
        info!(
            plan_id,
            semester_id = semester.id,
            semester_order = semester.semester_order,
            "semester created"
        );
        Ok(semester)
    }

    /// Give an empty plan its first semester. Calling this again, or on a
    /// plan that already has semesters, changes nothing.
    pub async fn ensure_default_structure(
        &self,
        plan_id: i64,
    ) -> Result<Option<Semester>, ServiceError> {
        let name = default_semester_name(Utc::now().year());
        let created = self
            .store
            .ensure_default_semester(plan_id, &name, Season::Winter)
            .await?;
        match &created {
            Some(semester) => {
                info!(plan_id, semester_id = semester.id, "default semester created")
            }
            None => debug!(plan_id, "plan already has semesters"),
        }
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Semester, ServiceError> {
        self.store
            .get_semester(id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: SEMESTER,
                id,
            })
    }

    pub async fn list_for_plan(&self, plan_id: i64) -> Result<Vec<Semester>, ServiceError> {
        Ok(self.store.list_semesters(plan_id).await?)
    }

    pub async fn update(&self, id: i64, patch: SemesterPatch) -> Result<Semester, ServiceError> {
        let changes = SemesterChanges {
            name: patch
                .name
                .as_deref()
                .map(validate_semester_name)
                .transpose()?,
            season: patch.winter_or_summer,
            order: patch
                .semester_order
                .map(|o| validate_order("semesterOrder", o))
                .transpose()?,
        };
        let semester = self.store.update_semester(id, changes).await?;
        info!(semester_id = id, "semester updated");
        Ok(semester)
    }

    pub async fn rename(&self, id: i64, new_name: &str) -> Result<Semester, ServiceError> {
        let new_name = validate_semester_name(new_name)?;
        let old = self.get(id).await?;
        let semester = self
            .store
            .update_semester(
                id,
                SemesterChanges {
                    name: Some(new_name),
                    ..SemesterChanges::default()
                },
            )
            .await?;
        info!(
            semester_id = id,
            old_name = %old.name,
            new_name = %semester.name,
            "semester renamed"
        );
        Ok(semester)
    }

    /// Delete a semester together with its placements.
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if !self.store.delete_semester(id).await? {
            return Err(ServiceError::NotFound {
                entity: SEMESTER,
                id,
            });
        }
        info!(semester_id = id, "semester deleted");
        Ok(())
    }

    /// Reassign ordinals so that `semester_ids` come first, in that order.
    /// Ids from another plan are rejected.
    pub async fn reorder(
        &self,
        plan_id: i64,
        semester_ids: &[i64],
    ) -> Result<Vec<Semester>, ServiceError> {
        let semesters = self.store.reorder_semesters(plan_id, semester_ids).await?;
        info!(plan_id, count = semester_ids.len(), "semesters reordered");
        Ok(semesters)
    }
}
