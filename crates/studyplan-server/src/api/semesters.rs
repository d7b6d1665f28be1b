use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};

use studyplan_core::semester::SemesterPatch;
use studyplan_db::models::{Season, Semester};

use super::extract::{ApiJson, ApiPath, Authenticated};
use super::plans::NameRequest;
use super::{AppError, AppState, DeletedResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/semesters", post(create_semester))
        .route("/semesters/reorder", post(reorder_semesters))
        .route("/semesters/study-plan/{plan_id}", get(list_for_plan))
        .route(
            "/semesters/{id}",
            get(get_semester).put(update_semester).delete(delete_semester),
        )
        .route("/semesters/{id}/rename", put(rename_semester))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSemesterRequest {
    pub study_plan_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub winter_or_summer: Option<String>,
    pub semester_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSemesterRequest {
    pub name: Option<String>,
    /// Absent leaves the season alone; `null` or `""` clears it.
    #[serde(default, deserialize_with = "present")]
    pub winter_or_summer: Option<Option<String>>,
    pub semester_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSemestersRequest {
    pub study_plan_id: Option<i64>,
    #[serde(default)]
    pub semester_ids: Vec<i64>,
}

/// Distinguish an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Blank means "no season".
fn parse_season(raw: Option<&str>) -> Result<Option<Season>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e| AppError::validation(format!("winterOrSummer: {e}"))),
    }
}

async fn create_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(body): ApiJson<CreateSemesterRequest>,
) -> Result<(StatusCode, Json<Semester>), AppError> {
    let plan_id = body
        .study_plan_id
        .ok_or_else(|| AppError::validation("studyPlanId: is required"))?;
    let season = parse_season(body.winter_or_summer.as_deref())?;
    state.gate.plan(principal, plan_id).await?;
    let semester = state
        .semesters
        .create_for_plan(plan_id, &body.name, season, body.semester_order)
        .await?;
    Ok((StatusCode::CREATED, Json(semester)))
}

async fn get_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Semester>, AppError> {
    let (semester, _) = state.gate.semester(principal, id).await?;
    Ok(Json(semester))
}

async fn list_for_plan(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(plan_id): ApiPath<i64>,
) -> Result<Json<Vec<Semester>>, AppError> {
    state.gate.plan(principal, plan_id).await?;
    Ok(Json(state.semesters.list_for_plan(plan_id).await?))
}

async fn update_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateSemesterRequest>,
) -> Result<Json<Semester>, AppError> {
    let patch = SemesterPatch {
        name: body.name,
        winter_or_summer: body
            .winter_or_summer
            .map(|raw| parse_season(raw.as_deref()))
            .transpose()?,
        semester_order: body.semester_order,
    };
    state.gate.semester(principal, id).await?;
    Ok(Json(state.semesters.update(id, patch).await?))
}

async fn rename_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NameRequest>,
) -> Result<Json<Semester>, AppError> {
    state.gate.semester(principal, id).await?;
    Ok(Json(state.semesters.rename(id, &body.name).await?))
}

async fn delete_semester(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    state.gate.semester(principal, id).await?;
    state.semesters.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "Semester deleted successfully".to_string(),
        deleted_id: id,
    }))
}

async fn reorder_semesters(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    ApiJson(body): ApiJson<ReorderSemestersRequest>,
) -> Result<Json<Vec<Semester>>, AppError> {
    let plan_id = body
        .study_plan_id
        .ok_or_else(|| AppError::validation("studyPlanId: is required"))?;
    state.gate.plan(principal, plan_id).await?;
    Ok(Json(
        state.semesters.reorder(plan_id, &body.semester_ids).await?,
    ))
}
