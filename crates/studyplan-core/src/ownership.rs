//! Ownership checks.
//!
//! Every entity belongs to exactly one plan, and every plan to one principal.
//! The gate resolves an entity, walks up to its plan and compares the plan's
//! owner with the principal it is handed. A missing entity is reported as
//! not found before any ownership comparison happens.

use std::sync::Arc;

use tracing::warn;

use studyplan_db::models::{Semester, SemesterCourse, StudyPlan};

use crate::error::ServiceError;
use crate::identity::Principal;
use crate::store::{HierarchyStore, PLACEMENT, PLAN, SEMESTER};

#[derive(Clone)]
pub struct OwnershipGate {
    store: Arc<dyn HierarchyStore>,
}

impl OwnershipGate {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self { store }
    }

    /// The plan, if `principal` owns it.
    pub async fn plan(
        &self,
        principal: Principal,
        plan_id: i64,
    ) -> Result<StudyPlan, ServiceError> {
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: PLAN,
                id: plan_id,
            })?;
        check_owner(principal, &plan)?;
        Ok(plan)
    }

    /// The semester and its plan, if `principal` owns the plan.
    pub async fn semester(
        &self,
        principal: Principal,
        semester_id: i64,
    ) -> Result<(Semester, StudyPlan), ServiceError> {
        let semester = self
            .store
            .get_semester(semester_id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: SEMESTER,
                id: semester_id,
            })?;
        let plan = self.owning_plan(semester.study_plan_id).await?;
        check_owner(principal, &plan)?;
        Ok((semester, plan))
    }

    /// The placement and its semester, if `principal` owns the plan above them.
    pub async fn placement(
        &self,
        principal: Principal,
        placement_id: i64,
    ) -> Result<(SemesterCourse, Semester), ServiceError> {
        let placement = self
            .store
            .get_placement(placement_id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: PLACEMENT,
                id: placement_id,
            })?;
        let (semester, _) = self.semester(principal, placement.semester_id).await?;
        Ok((placement, semester))
    }

    /// A dangling parent means the row vanished mid-request.
    async fn owning_plan(&self, plan_id: i64) -> Result<StudyPlan, ServiceError> {
        self.store
            .get_plan(plan_id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: PLAN,
                id: plan_id,
            })
    }
}

fn check_owner(principal: Principal, plan: &StudyPlan) -> Result<(), ServiceError> {
    if plan.owner_id == principal.id() {
        return Ok(());
    }
    warn!(
        plan_id = plan.id,
        principal = principal.id(),
        "access to another owner's study plan denied"
    );
    Err(ServiceError::AccessDenied(format!(
        "study plan {} belongs to another user",
        plan.id
    )))
}
