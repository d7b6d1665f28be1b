//! Study plan lifecycle.

pub mod service;

use serde::Deserialize;

use studyplan_db::models::StudyPlan;

use crate::error::ServiceError;

pub use service::PlanService;

/// Longest accepted plan name, in characters.
pub const MAX_PLAN_NAME_LEN: usize = 200;

/// How many active plans one owner may hold.
pub const MAX_ACTIVE_PLANS: i64 = 5;

/// Partial update of a plan. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    pub name: Option<String>,
    pub study_program_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Result of [`PlanService::rename`].
#[derive(Debug, Clone)]
pub struct Renamed {
    pub plan: StudyPlan,
    pub old_name: String,
    pub new_name: String,
}

/// Trim and check a plan name.
pub fn validate_plan_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("name: must not be blank"));
    }
    if trimmed.chars().count() > MAX_PLAN_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "name: must be at most {MAX_PLAN_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_owned())
}
