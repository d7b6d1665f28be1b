use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use studyplan_core::placement::PlacementView;

use super::extract::{ApiJson, ApiPath, Authenticated};
use super::{AppError, AppState, DeletedResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/semester-courses", post(add_course))
        .route("/semester-courses/reorder", post(reorder_courses))
        .route(
            "/semester-courses/semester/{semester_id}",
            get(list_for_semester).delete(clear_semester),
        )
        .route("/semester-courses/study-plan/{plan_id}", get(list_for_plan))
        .route(
            "/semester-courses/{id}",
            get(get_course).delete(remove_course),
        )
        .route("/semester-courses/{id}/completion", put(toggle_completion))
        .route("/semester-courses/{id}/complete", put(mark_completed))
        .route("/semester-courses/{id}/uncomplete", put(mark_uncompleted))
        .route("/semester-courses/{id}/move", put(move_course))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCourseRequest {
    pub semester_id: Option<i64>,
    #[serde(default)]
    pub course_id: String,
    pub course_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCourseRequest {
    pub target_semester_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCoursesRequest {
    pub semester_id: Option<i64>,
    #[serde(default)]
    pub course_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedResponse {
    pub message: &'static str,
    pub semester_id: i64,
    pub deleted_count: u64,
}

fn required(value: Option<i64>, field: &str) -> Result<i64, AppError> {
    value.ok_or_else(|| AppError::validation(format!("{field}: is required")))
}

async fn add_course(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(body): ApiJson<AddCourseRequest>,
) -> Result<(StatusCode, Json<PlacementView>), AppError> {
    let semester_id = required(body.semester_id, "semesterId")?;
    state.gate.semester(principal, semester_id).await?;
    let placement = state
        .placements
        .add(semester_id, &body.course_id, body.course_order)
        .await?;
    let view = state.placements.enrich_one(placement).await;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_course(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PlacementView>, AppError> {
    let (placement, _) = state.gate.placement(principal, id).await?;
    Ok(Json(state.placements.enrich_one(placement).await))
}

async fn list_for_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(semester_id): ApiPath<i64>,
) -> Result<Json<Vec<PlacementView>>, AppError> {
    state.gate.semester(principal, semester_id).await?;
    let placements = state.placements.list_for_semester(semester_id).await?;
    Ok(Json(state.placements.enrich(placements).await))
}

async fn list_for_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(plan_id): ApiPath<i64>,
) -> Result<Json<Vec<PlacementView>>, AppError> {
    state.gate.plan(principal, plan_id).await?;
    let placements = state.placements.list_for_plan(plan_id).await?;
    Ok(Json(state.placements.enrich(placements).await))
}

async fn toggle_completion(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PlacementView>, AppError> {
    state.gate.placement(principal, id).await?;
    let placement = state.placements.toggle_completion(id).await?;
    Ok(Json(state.placements.enrich_one(placement).await))
}

async fn mark_completed(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PlacementView>, AppError> {
    state.gate.placement(principal, id).await?;
    let placement = state.placements.set_completion(id, true).await?;
    Ok(Json(state.placements.enrich_one(placement).await))
}

async fn mark_uncompleted(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PlacementView>, AppError> {
    state.gate.placement(principal, id).await?;
    let placement = state.placements.set_completion(id, false).await?;
    Ok(Json(state.placements.enrich_one(placement).await))
}

/// Both the source and the target semester must belong to the caller.
async fn move_course(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<MoveCourseRequest>,
) -> Result<Json<PlacementView>, AppError> {
    let target = required(body.target_semester_id, "targetSemesterId")?;
    state.gate.placement(principal, id).await?;
    state.gate.semester(principal, target).await?;
    let moved = state.placements.move_to(id, target).await?;
    Ok(Json(state.placements.enrich_one(moved).await))
}

async fn remove_course(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    state.gate.placement(principal, id).await?;
    state.placements.remove(id).await?;
    Ok(Json(DeletedResponse {
        message: "Course removed from semester".to_string(),
        deleted_id: id,
    }))
}

async fn clear_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(semester_id): ApiPath<i64>,
) -> Result<Json<ClearedResponse>, AppError> {
    state.gate.semester(principal, semester_id).await?;
    let deleted_count = state.placements.remove_all(semester_id).await?;
    Ok(Json(ClearedResponse {
        message: "All courses removed from semester",
        semester_id,
        deleted_count,
    }))
}

async fn reorder_courses(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(body): ApiJson<ReorderCoursesRequest>,
) -> Result<Json<Vec<PlacementView>>, AppError> {
    let semester_id = required(body.semester_id, "semesterId")?;
    state.gate.semester(principal, semester_id).await?;
    let placements = state
        .placements
        .reorder(semester_id, &body.course_ids)
        .await?;
    Ok(Json(state.placements.enrich(placements).await))
}
