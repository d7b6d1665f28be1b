//! Course placements: ordered children of a semester.

pub mod service;

use serde::Serialize;

use studyplan_db::models::SemesterCourse;

use crate::catalog::ModuleInfo;
use crate::error::ServiceError;

pub use service::PlacementService;

pub const MAX_COURSE_ID_LEN: usize = 255;

/// A placement plus whatever the catalog knows about its course. Catalog
/// fields are `null` when the lookup missed or failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementView {
    #[serde(flatten)]
    pub placement: SemesterCourse,
    pub course_name: Option<String>,
    pub credits: Option<i32>,
    pub professor: Option<String>,
    pub occurrence: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

impl PlacementView {
    pub fn new(placement: SemesterCourse, module: Option<ModuleInfo>) -> Self {
        let module = module.unwrap_or_default();
        Self {
            placement,
            course_name: module.name,
            credits: module.credits,
            professor: module.responsible,
            occurrence: module.occurrence,
            category: module.category,
            subcategory: module.subcategory,
        }
    }
}

/// Course ids are opaque, but must be present and fit the column.
pub fn validate_course_id(course_id: &str) -> Result<String, ServiceError> {
    let trimmed = course_id.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("courseId: must not be blank"));
    }
    if trimmed.chars().count() > MAX_COURSE_ID_LEN {
        return Err(ServiceError::validation(format!(
            "courseId: must be at most {MAX_COURSE_ID_LEN} characters"
        )));
    }
    Ok(trimmed.to_owned())
}
