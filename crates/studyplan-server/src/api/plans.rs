use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use studyplan_core::placement::PlacementView;
use studyplan_core::plan::PlanPatch;
use studyplan_db::models::{Semester, StudyPlan};

use super::extract::{ApiJson, ApiPath, Authenticated};
use super::{AppError, AppState, DeletedResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", post(create_plan))
        .route("/plans/mine", get(list_my_plans))
        .route(
            "/plans/{id}",
            get(get_plan_detail)
                .put(update_plan)
                .patch(update_plan)
                .delete(delete_plan),
        )
        .route("/plans/{id}/rename", put(rename_plan))
        .route("/plans/{id}/duplicate", post(duplicate_plan))
        .route("/plans/{id}/progress", get(plan_progress))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[serde(default)]
    pub name: String,
    pub study_program_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub message: &'static str,
    pub id: i64,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub study_plan_id: i64,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Serialize)]
pub struct SemesterDetail {
    #[serde(flatten)]
    pub semester: Semester,
    pub courses: Vec<PlacementView>,
}

#[derive(Debug, Serialize)]
pub struct PlanDetailResponse {
    #[serde(flatten)]
    pub plan: StudyPlan,
    pub semesters: Vec<SemesterDetail>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(body): ApiJson<CreatePlanRequest>,
) -> Result<(StatusCode, Json<StudyPlan>), AppError> {
    let plan = state
        .plans
        .create_for_user(principal, body.study_program_id, &body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_my_plans(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<StudyPlan>>, AppError> {
    let plans = state.plans.list_for_owner(principal).await?;
    Ok(Json(state.plans.with_program_names(plans).await))
}

/// The whole plan tree. An empty plan gets its default semester first.
async fn get_plan_detail(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PlanDetailResponse>, AppError> {
    let mut plan = state.gate.plan(principal, id).await?;
    state.semesters.ensure_default_structure(id).await?;
    plan.study_program_name = state.plans.program_name(&plan).await;

    let semesters = state.semesters.list_for_plan(id).await?;
    let placements = state.placements.list_for_plan(id).await?;
    let mut by_semester: HashMap<i64, Vec<PlacementView>> = HashMap::new();
    for view in state.placements.enrich(placements).await {
        by_semester
            .entry(view.placement.semester_id)
            .or_default()
            .push(view);
    }

    let semesters = semesters
        .into_iter()
        .map(|semester| SemesterDetail {
            courses: by_semester.remove(&semester.id).unwrap_or_default(),
            semester,
        })
        .collect();

    Ok(Json(PlanDetailResponse { plan, semesters }))
}

async fn update_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<PlanPatch>,
) -> Result<Json<StudyPlan>, AppError> {
    state.gate.plan(principal, id).await?;
    let plan = state.plans.update(id, patch).await?;
    Ok(Json(plan))
}

async fn rename_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NameRequest>,
) -> Result<Json<RenameResponse>, AppError> {
    state.gate.plan(principal, id).await?;
    let renamed = state.plans.rename(id, &body.name).await?;
    Ok(Json(RenameResponse {
        message: "Study plan renamed successfully",
        id,
        old_name: renamed.old_name,
        new_name: renamed.new_name,
    }))
}

async fn delete_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    state.gate.plan(principal, id).await?;
    state.plans.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Study plan deleted successfully".to_string(),
        deleted_id: id,
    }))
}

async fn duplicate_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NameRequest>,
) -> Result<(StatusCode, Json<StudyPlan>), AppError> {
    state.gate.plan(principal, id).await?;
    let copy = state.plans.duplicate(id, &body.name).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn plan_progress(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProgressResponse>, AppError> {
    state.gate.plan(principal, id).await?;
    let progress = state.plans.progress(id).await?;
    Ok(Json(ProgressResponse {
        study_plan_id: id,
        total: progress.total,
        completed: progress.completed,
    }))
}
