//! In-memory [`HierarchyStore`] for tests and `serve --ephemeral`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use studyplan_db::models::{PlanProgress, Season, Semester, SemesterCourse, StudyPlan};

use super::{
    CompletionChange, HierarchyStore, NewPlan, NewSemester, PLACEMENT, PLAN, SEMESTER,
    SemesterChanges, StoreError, apply_completion, course_taken_message, limit_message,
};
use crate::ordering::{next_order, plan_reorder};

#[derive(Default)]
struct Inner {
    last_id: i64,
    plans: BTreeMap<i64, StudyPlan>,
    semesters: BTreeMap<i64, Semester>,
    placements: BTreeMap<i64, SemesterCourse>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn plan(&self, id: i64) -> Result<&StudyPlan, StoreError> {
        self.plans
            .get(&id)
            .ok_or(StoreError::NotFound { entity: PLAN, id })
    }

    fn semester(&self, id: i64) -> Result<&Semester, StoreError> {
        self.semesters
            .get(&id)
            .ok_or(StoreError::NotFound { entity: SEMESTER, id })
    }

    fn semesters_of(&self, plan_id: i64) -> Vec<Semester> {
        let mut out: Vec<Semester> = self
            .semesters
            .values()
            .filter(|s| s.study_plan_id == plan_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.semester_order, s.id));
        out
    }

    fn placements_of(&self, semester_id: i64) -> Vec<SemesterCourse> {
        let mut out: Vec<SemesterCourse> = self
            .placements
            .values()
            .filter(|p| p.semester_id == semester_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.course_order, p.id));
        out
    }

    fn count_active(&self, owner_id: i64) -> i64 {
        self.plans
            .values()
            .filter(|p| p.owner_id == owner_id && p.is_active)
            .count() as i64
    }

    fn course_in_semester(&self, semester_id: i64, course_id: &str) -> bool {
        self.placements
            .values()
            .any(|p| p.semester_id == semester_id && p.course_id == course_id)
    }

    fn semester_name_taken(&self, plan_id: i64, name: &str, except: Option<i64>) -> bool {
        self.semesters.values().any(|s| {
            s.study_plan_id == plan_id && s.name == name && Some(s.id) != except
        })
    }

    fn semester_order_taken(&self, plan_id: i64, order: i32, except: Option<i64>) -> bool {
        self.semesters.values().any(|s| {
            s.study_plan_id == plan_id && s.semester_order == order && Some(s.id) != except
        })
    }

    fn new_plan(&mut self, new: NewPlan, now: DateTime<Utc>) -> StudyPlan {
        let plan = StudyPlan {
            id: self.next_id(),
            owner_id: new.owner_id,
            name: new.name,
            study_program_id: new.study_program_id,
            study_program_name: new.study_program_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.plans.insert(plan.id, plan.clone());
        plan
    }

    fn new_semester(
        &mut self,
        plan_id: i64,
        name: String,
        season: Option<Season>,
        order: i32,
        now: DateTime<Utc>,
    ) -> Semester {
        let semester = Semester {
            id: self.next_id(),
            study_plan_id: plan_id,
            name,
            semester_order: order,
            winter_or_summer: season,
            created_at: now,
            updated_at: now,
        };
        self.semesters.insert(semester.id, semester.clone());
        semester
    }

    fn remove_semester(&mut self, id: i64) -> bool {
        let removed = self.semesters.remove(&id).is_some();
        if removed {
            self.placements.retain(|_, p| p.semester_id != id);
        }
        removed
    }
}

/// A [`HierarchyStore`] kept entirely in process memory.
///
/// One async mutex guards the whole tree, so every operation is serialised
/// and trivially atomic. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    async fn insert_plan(&self, new: NewPlan, active_limit: i64) -> Result<StudyPlan, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.count_active(new.owner_id) >= active_limit {
            return Err(StoreError::Invalid(limit_message(active_limit)));
        }
        Ok(inner.new_plan(new, Utc::now()))
    }

    async fn get_plan(&self, id: i64) -> Result<Option<StudyPlan>, StoreError> {
        Ok(self.inner.lock().await.plans.get(&id).cloned())
    }

    async fn list_plans_for_owner(&self, owner_id: i64) -> Result<Vec<StudyPlan>, StoreError> {
        let inner = self.inner.lock().await;
        let mut plans: Vec<StudyPlan> = inner
            .plans
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(plans)
    }

    async fn count_active_plans(&self, owner_id: i64) -> Result<i64, StoreError> {
        Ok(self.inner.lock().await.count_active(owner_id))
    }

    async fn update_plan(&self, plan: &StudyPlan) -> Result<StudyPlan, StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.plans.get_mut(&plan.id).ok_or(StoreError::NotFound {
            entity: PLAN,
            id: plan.id,
        })?;
        stored.name = plan.name.clone();
        stored.study_program_id = plan.study_program_id;
        stored.study_program_name = plan.study_program_name.clone();
        stored.is_active = plan.is_active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn set_program_name(&self, id: i64, name: Option<&str>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(plan) = inner.plans.get_mut(&id) {
            plan.study_program_name = name.map(str::to_owned);
        }
        Ok(())
    }

    async fn delete_plan(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.plans.remove(&id).is_none() {
            return Ok(false);
        }
        let semester_ids: Vec<i64> = inner
            .semesters
            .values()
            .filter(|s| s.study_plan_id == id)
            .map(|s| s.id)
            .collect();
        for semester_id in semester_ids {
            inner.remove_semester(semester_id);
        }
        Ok(true)
    }

    async fn duplicate_plan(
        &self,
        source_id: i64,
        new_name: &str,
        active_limit: i64,
    ) -> Result<StudyPlan, StoreError> {
        let mut inner = self.inner.lock().await;
        let source = inner.plan(source_id)?.clone();
        if inner.count_active(source.owner_id) >= active_limit {
            return Err(StoreError::Invalid(limit_message(active_limit)));
        }

        let now = Utc::now();
        let copy = inner.new_plan(
            NewPlan {
                owner_id: source.owner_id,
                name: new_name.to_owned(),
                study_program_id: source.study_program_id,
                study_program_name: source.study_program_name.clone(),
            },
            now,
        );
        for semester in inner.semesters_of(source_id) {
            let target = inner.new_semester(
                copy.id,
                semester.name.clone(),
                semester.winter_or_summer,
                semester.semester_order,
                now,
            );
            for placement in inner.placements_of(semester.id) {
                let id = inner.next_id();
                inner.placements.insert(
                    id,
                    SemesterCourse {
                        id,
                        semester_id: target.id,
                        created_at: now,
                        ..placement
                    },
                );
            }
        }
        Ok(copy)
    }

    async fn insert_semester(&self, new: NewSemester) -> Result<Semester, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.plan(new.study_plan_id)?;
        if inner.semester_name_taken(new.study_plan_id, &new.name, None) {
            return Err(StoreError::Duplicate(format!(
                "a semester named {:?} already exists in this study plan",
                new.name
            )));
        }
        let order = match new.order {
            Some(order) if inner.semester_order_taken(new.study_plan_id, order, None) => {
                return Err(StoreError::Duplicate(format!(
                    "semester order {order} is already taken in this study plan"
                )));
            }
            Some(order) => order,
            None => next_order(
                inner
                    .semesters_of(new.study_plan_id)
                    .iter()
                    .map(|s| s.semester_order),
            )?,
        };
        Ok(inner.new_semester(new.study_plan_id, new.name, new.season, order, Utc::now()))
    }

    async fn ensure_default_semester(
        &self,
        plan_id: i64,
        name: &str,
        season: Season,
    ) -> Result<Option<Semester>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.plan(plan_id)?;
        if !inner.semesters_of(plan_id).is_empty() {
            return Ok(None);
        }
        let semester = inner.new_semester(plan_id, name.to_owned(), Some(season), 1, Utc::now());
        Ok(Some(semester))
    }

    async fn get_semester(&self, id: i64) -> Result<Option<Semester>, StoreError> {
        Ok(self.inner.lock().await.semesters.get(&id).cloned())
    }

    async fn list_semesters(&self, plan_id: i64) -> Result<Vec<Semester>, StoreError> {
        Ok(self.inner.lock().await.semesters_of(plan_id))
    }

    async fn update_semester(
        &self,
        id: i64,
        changes: SemesterChanges,
    ) -> Result<Semester, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner.semester(id)?.clone();
        if let Some(name) = &changes.name {
            if inner.semester_name_taken(current.study_plan_id, name, Some(id)) {
                return Err(StoreError::Duplicate(format!(
                    "a semester named {name:?} already exists in this study plan"
                )));
            }
        }
        if let Some(order) = changes.order {
            if inner.semester_order_taken(current.study_plan_id, order, Some(id)) {
                return Err(StoreError::Duplicate(format!(
                    "semester order {order} is already taken in this study plan"
                )));
            }
        }

        let stored = inner
            .semesters
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: SEMESTER, id })?;
        if let Some(name) = changes.name {
            stored.name = name;
        }
        if let Some(season) = changes.season {
            stored.winter_or_summer = season;
        }
        if let Some(order) = changes.order {
            stored.semester_order = order;
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_semester(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.remove_semester(id))
    }

    async fn reorder_semesters(
        &self,
        plan_id: i64,
        semester_ids: &[i64],
    ) -> Result<Vec<Semester>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.plan(plan_id)?;
        let siblings: Vec<(i64, i32)> = inner
            .semesters_of(plan_id)
            .iter()
            .map(|s| (s.id, s.semester_order))
            .collect();
        let assignment = plan_reorder(&siblings, semester_ids)
            .map_err(|e| StoreError::Invalid(format!("semesterIds: {e}")))?;

        let now = Utc::now();
        for (id, order) in assignment {
            if let Some(semester) = inner.semesters.get_mut(&id) {
                if semester.semester_order != order {
                    semester.semester_order = order;
                    semester.updated_at = now;
                }
            }
        }
        Ok(inner.semesters_of(plan_id))
    }

    async fn insert_placement(
        &self,
        semester_id: i64,
        course_id: &str,
        order: Option<i32>,
    ) -> Result<SemesterCourse, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.semester(semester_id)?;
        if inner.course_in_semester(semester_id, course_id) {
            return Err(StoreError::Duplicate(course_taken_message(
                course_id,
                semester_id,
            )));
        }
        let siblings = inner.placements_of(semester_id);
        let order = match order {
            Some(order) if siblings.iter().any(|p| p.course_order == order) => {
                return Err(StoreError::Duplicate(format!(
                    "course order {order} is already taken in semester {semester_id}"
                )));
            }
            Some(order) => order,
            None => next_order(siblings.iter().map(|p| p.course_order))?,
        };

        let placement = SemesterCourse {
            id: inner.next_id(),
            semester_id,
            course_id: course_id.to_owned(),
            is_completed: false,
            completion_date: None,
            course_order: order,
            created_at: Utc::now(),
        };
        inner.placements.insert(placement.id, placement.clone());
        Ok(placement)
    }

    async fn get_placement(&self, id: i64) -> Result<Option<SemesterCourse>, StoreError> {
        Ok(self.inner.lock().await.placements.get(&id).cloned())
    }

    async fn list_placements(&self, semester_id: i64) -> Result<Vec<SemesterCourse>, StoreError> {
        Ok(self.inner.lock().await.placements_of(semester_id))
    }

    async fn list_placements_for_plan(
        &self,
        plan_id: i64,
    ) -> Result<Vec<SemesterCourse>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .semesters_of(plan_id)
            .iter()
            .flat_map(|s| inner.placements_of(s.id))
            .collect())
    }

    async fn move_placement(
        &self,
        id: i64,
        target_semester_id: i64,
    ) -> Result<SemesterCourse, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .placements
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;
        inner.semester(target_semester_id)?;
        if inner.course_in_semester(target_semester_id, &current.course_id) {
            return Err(StoreError::Duplicate(course_taken_message(
                &current.course_id,
                target_semester_id,
            )));
        }
        let order = next_order(
            inner
                .placements_of(target_semester_id)
                .iter()
                .map(|p| p.course_order),
        )?;

        let stored = inner
            .placements
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;
        stored.semester_id = target_semester_id;
        stored.course_order = order;
        Ok(stored.clone())
    }

    async fn set_completion(
        &self,
        id: i64,
        change: CompletionChange,
        now: DateTime<Utc>,
    ) -> Result<SemesterCourse, StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .placements
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: PLACEMENT, id })?;
        let (completed, date) =
            apply_completion((stored.is_completed, stored.completion_date), change, now);
        stored.is_completed = completed;
        stored.completion_date = date;
        Ok(stored.clone())
    }

    async fn delete_placement(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.placements.remove(&id).is_some())
    }

    async fn delete_placements_for_semester(&self, semester_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.placements.len();
        inner.placements.retain(|_, p| p.semester_id != semester_id);
        Ok((before - inner.placements.len()) as u64)
    }

    async fn reorder_placements(
        &self,
        semester_id: i64,
        placement_ids: &[i64],
    ) -> Result<Vec<SemesterCourse>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.semester(semester_id)?;
        let siblings: Vec<(i64, i32)> = inner
            .placements_of(semester_id)
            .iter()
            .map(|p| (p.id, p.course_order))
            .collect();
        let assignment = plan_reorder(&siblings, placement_ids)
            .map_err(|e| StoreError::Invalid(format!("courseIds: {e}")))?;
        for (id, order) in assignment {
            if let Some(placement) = inner.placements.get_mut(&id) {
                placement.course_order = order;
            }
        }
        Ok(inner.placements_of(semester_id))
    }

    async fn plan_progress(&self, plan_id: i64) -> Result<PlanProgress, StoreError> {
        let inner = self.inner.lock().await;
        let mut progress = PlanProgress::default();
        for semester in inner.semesters_of(plan_id) {
            for placement in inner.placements_of(semester.id) {
                progress.total += 1;
                if placement.is_completed {
                    progress.completed += 1;
                }
            }
        }
        Ok(progress)
    }
}
