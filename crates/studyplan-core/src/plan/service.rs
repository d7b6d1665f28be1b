//! Plan service.
//!
//! Ownership-agnostic: callers resolve and authorize the plan first (see
//! [`crate::ownership`]) and then call in here by id.

use std::sync::Arc;

use tracing::{debug, info, warn};

use studyplan_db::models::{PlanProgress, StudyPlan};

use super::{MAX_ACTIVE_PLANS, PlanPatch, Renamed, validate_plan_name};
use crate::catalog::{CatalogClient, CatalogError};
use crate::error::ServiceError;
use crate::identity::Principal;
use crate::store::{HierarchyStore, NewPlan, PLAN};

#[derive(Clone)]
pub struct PlanService {
    store: Arc<dyn HierarchyStore>,
    catalog: Arc<dyn CatalogClient>,
}

impl PlanService {
    pub fn new(store: Arc<dyn HierarchyStore>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self { store, catalog }
    }

    /// Create a new active plan owned by `owner`.
    ///
    /// The program's display name is looked up once so the cache starts warm;
    /// a catalog failure here does not block creation.
    pub async fn create_for_user(
        &self,
        owner: Principal,
        study_program_id: Option<i64>,
        name: &str,
    ) -> Result<StudyPlan, ServiceError> {
        let study_program_id = study_program_id
            .ok_or_else(|| ServiceError::validation("studyProgramId: is required"))?;
        let name = validate_plan_name(name)?;
        let study_program_name = self.lookup_program_name(study_program_id).await;

        let plan = self
            .store
            .insert_plan(
                NewPlan {
                    owner_id: owner.id(),
                    name,
                    study_program_id: Some(study_program_id),
                    study_program_name,
                },
                MAX_ACTIVE_PLANS,
            )
            .await?;

        info!(plan_id = plan.id, owner_id = plan.owner_id, "study plan created");
        Ok(plan)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<StudyPlan, ServiceError> {
        self.store
            .get_plan(id)
            .await?
            .ok_or(ServiceError::NotFound { entity: PLAN, id })
    }

    pub async fn list_for_owner(&self, owner: Principal) -> Result<Vec<StudyPlan>, ServiceError> {
        Ok(self.store.list_plans_for_owner(owner.id()).await?)
    }

    /// Apply the fields present in `patch`, then re-validate the whole plan.
    pub async fn update(&self, id: i64, patch: PlanPatch) -> Result<StudyPlan, ServiceError> {
        let mut plan = self.get_by_id(id).await?;

        if let Some(name) = patch.name {
            plan.name = name;
        }
        if let Some(is_active) = patch.is_active {
            plan.is_active = is_active;
        }
        if let Some(program_id) = patch.study_program_id {
            if plan.study_program_id != Some(program_id) {
                plan.study_program_id = Some(program_id);
                plan.study_program_name = self.lookup_program_name(program_id).await;
            }
        }

        plan.name = validate_plan_name(&plan.name)?;
        if plan.study_program_id.is_none() {
            return Err(ServiceError::validation("studyProgramId: is required"));
        }

        let updated = self.store.update_plan(&plan).await?;
        info!(plan_id = id, "study plan updated");
        Ok(updated)
    }

    pub async fn rename(&self, id: i64, new_name: &str) -> Result<Renamed, ServiceError> {
        let new_name = validate_plan_name(new_name)?;
        let mut plan = self.get_by_id(id).await?;
        let old_name = std::mem::replace(&mut plan.name, new_name.clone());

        let plan = self.store.update_plan(&plan).await?;
        info!(plan_id = id, old_name = %old_name, new_name = %new_name, "study plan renamed");
        Ok(Renamed {
            plan,
            old_name,
            new_name,
        })
    }

    /// Delete a plan and everything under it.
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if !self.store.delete_plan(id).await? {
            return Err(ServiceError::NotFound { entity: PLAN, id });
        }
        info!(plan_id = id, "study plan deleted");
        Ok(())
    }

    /// Deep-copy a plan under a new name. The copy is active, so it counts
    /// against the owner's active-plan limit.
    pub async fn duplicate(&self, id: i64, new_name: &str) -> Result<StudyPlan, ServiceError> {
        let new_name = validate_plan_name(new_name)?;
        let copy = self
            .store
            .duplicate_plan(id, &new_name, MAX_ACTIVE_PLANS)
            .await?;
        info!(plan_id = id, copy_id = copy.id, "study plan duplicated");
        Ok(copy)
    }

    pub async fn progress(&self, id: i64) -> Result<PlanProgress, ServiceError> {
        self.get_by_id(id).await?;
        Ok(self.store.plan_progress(id).await?)
    }

    /// Display name of the plan's study program.
    ///
    /// Served from the plan's cached copy when present. Otherwise the catalog
    /// is asked and a hit is written back to the cache (best-effort). Any
    /// catalog failure yields `None`; it never fails the caller.
    pub async fn program_name(&self, plan: &StudyPlan) -> Option<String> {
        if let Some(name) = &plan.study_program_name {
            debug!(plan_id = plan.id, "program name served from plan cache");
            return Some(name.clone());
        }
        let program_id = plan.study_program_id?;
        let name = self.lookup_program_name(program_id).await?;
        self.cache_program_name(plan.id, &name).await;
        Some(name)
    }

    /// [`Self::program_name`] for a listing.
    ///
    /// After the first catalog failure the remaining uncached plans are left
    /// without a name so one outage costs at most one timeout.
    pub async fn with_program_names(&self, mut plans: Vec<StudyPlan>) -> Vec<StudyPlan> {
        let mut catalog_up = true;
        for plan in &mut plans {
            if plan.study_program_name.is_some() || !catalog_up {
                continue;
            }
            let Some(program_id) = plan.study_program_id else {
                continue;
            };
            match self.fetch_program_name(program_id).await {
                Ok(Some(name)) => {
                    self.cache_program_name(plan.id, &name).await;
                    plan.study_program_name = Some(name);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(program_id, error = %e, "study program lookup failed");
                    catalog_up = false;
                }
            }
        }
        plans
    }

    async fn cache_program_name(&self, plan_id: i64, name: &str) {
        if let Err(e) = self.store.set_program_name(plan_id, Some(name)).await {
            warn!(plan_id, error = %e, "failed to cache study program name");
        }
    }

    async fn lookup_program_name(&self, program_id: i64) -> Option<String> {
        match self.fetch_program_name(program_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(program_id, error = %e, "study program lookup failed");
                None
            }
        }
    }

    async fn fetch_program_name(&self, program_id: i64) -> Result<Option<String>, CatalogError> {
        match self.catalog.study_program(program_id).await? {
            Some(program) => Ok(program.curriculum),
            None => {
                debug!(program_id, "study program unknown to catalog");
                Ok(None)
            }
        }
    }
}
