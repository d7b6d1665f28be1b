//! Course-placement service.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use studyplan_db::models::SemesterCourse;

use super::{PlacementView, validate_course_id};
use crate::catalog::CatalogClient;
use crate::error::ServiceError;
use crate::semester::validate_order;
use crate::store::{CompletionChange, HierarchyStore, PLACEMENT};

#[derive(Clone)]
pub struct PlacementService {
    store: Arc<dyn HierarchyStore>,
    catalog: Arc<dyn CatalogClient>,
}

impl PlacementService {
    pub fn new(store: Arc<dyn HierarchyStore>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self { store, catalog }
    }

    /// Place `course_id` in a semester. A course may appear at most once per
    /// semester; a second add is a [`ServiceError::Duplicate`].
    pub async fn add(
        &self,
        semester_id: i64,
        course_id: &str,
        order: Option<i32>,
    ) -> Result<SemesterCourse, ServiceError> {
        let course_id = validate_course_id(course_id)?;
        let order = order
            .map(|o| validate_order("courseOrder", o))
            .transpose()?;

        let placement = self
            .store
            .insert_placement(semester_id, &course_id, order)
            .await?;
        info!(
            semester_id,
            placement_id = placement.id,
            course_id = %placement.course_id,
            course_order = placement.course_order,
            "course placed"
        );
        Ok(placement)
    }

    pub async fn get(&self, id: i64) -> Result<SemesterCourse, ServiceError> {
        self.store
            .get_placement(id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: PLACEMENT,
                id,
            })
    }

    pub async fn list_for_semester(
        &self,
        semester_id: i64,
    ) -> Result<Vec<SemesterCourse>, ServiceError> {
        Ok(self.store.list_placements(semester_id).await?)
    }

    pub async fn list_for_plan(&self, plan_id: i64) -> Result<Vec<SemesterCourse>, ServiceError> {
        Ok(self.store.list_placements_for_plan(plan_id).await?)
    }

    /// Move a placement to the end of another semester.
    pub async fn move_to(
        &self,
        id: i64,
        target_semester_id: i64,
    ) -> Result<SemesterCourse, ServiceError> {
        let moved = self.store.move_placement(id, target_semester_id).await?;
        info!(
            placement_id = id,
            target_semester_id,
            course_order = moved.course_order,
            "course moved"
        );
        Ok(moved)
    }

    pub async fn toggle_completion(&self, id: i64) -> Result<SemesterCourse, ServiceError> {
        self.change_completion(id, CompletionChange::Toggle).await
    }

    pub async fn set_completion(
        &self,
        id: i64,
        completed: bool,
    ) -> Result<SemesterCourse, ServiceError> {
        self.change_completion(id, CompletionChange::Set(completed))
            .await
    }

    async fn change_completion(
        &self,
        id: i64,
        change: CompletionChange,
    ) -> Result<SemesterCourse, ServiceError> {
        let placement = self.store.set_completion(id, change, Utc::now()).await?;
        info!(
            placement_id = id,
            is_completed = placement.is_completed,
            "course completion changed"
        );
        Ok(placement)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ServiceError> {
        if !self.store.delete_placement(id).await? {
            return Err(ServiceError::NotFound {
                entity: PLACEMENT,
                id,
            });
        }
        info!(placement_id = id, "course removed");
        Ok(())
    }

    /// Remove every placement of a semester; returns how many went.
    pub async fn remove_all(&self, semester_id: i64) -> Result<u64, ServiceError> {
        let removed = self
            .store
            .delete_placements_for_semester(semester_id)
            .await?;
        info!(semester_id, removed, "semester cleared");
        Ok(removed)
    }

    pub async fn reorder(
        &self,
        semester_id: i64,
        placement_ids: &[i64],
    ) -> Result<Vec<SemesterCourse>, ServiceError> {
        let placements = self
            .store
            .reorder_placements(semester_id, placement_ids)
            .await?;
        info!(semester_id, count = placement_ids.len(), "courses reordered");
        Ok(placements)
    }

    /// [`Self::enrich`] for a single placement.
    pub async fn enrich_one(&self, placement: SemesterCourse) -> PlacementView {
        let module = match self.catalog.module(&placement.course_id).await {
            Ok(module) => module,
            Err(e) => {
                warn!(course_id = %placement.course_id, error = %e, "course enrichment skipped");
                None
            }
        };
        PlacementView::new(placement, module)
    }

    /// Attach catalog metadata to each placement.
    ///
    /// After the first catalog failure the remaining placements are returned
    /// without lookups so one outage costs at most one timeout.
    pub async fn enrich(&self, placements: Vec<SemesterCourse>) -> Vec<PlacementView> {
        let mut catalog_up = true;
        let mut views = Vec::with_capacity(placements.len());
        for placement in placements {
            let module = if catalog_up {
                match self.catalog.module(&placement.course_id).await {
                    Ok(module) => module,
                    Err(e) => {
                        warn!(
                            course_id = %placement.course_id,
                            error = %e,
                            "course enrichment skipped"
                        );
                        catalog_up = false;
                        None
                    }
                }
            } else {
                None
            };
            views.push(PlacementView::new(placement, module));
        }
        views
    }
}
