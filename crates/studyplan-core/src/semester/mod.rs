//! Semesters: ordered children of a plan.

pub mod service;

use studyplan_db::models::Season;

use crate::error::ServiceError;

pub use service::SemesterService;

pub const MAX_SEMESTER_NAME_LEN: usize = 100;

/// Partial update of a semester. Absent fields are left untouched;
/// `winter_or_summer: Some(None)` clears the season.
#[derive(Debug, Clone, Default)]
pub struct SemesterPatch {
    pub name: Option<String>,
    pub winter_or_summer: Option<Option<Season>>,
    pub semester_order: Option<i32>,
}

pub fn validate_semester_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("name: must not be blank"));
    }
    if trimmed.chars().count() > MAX_SEMESTER_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "name: must be at most {MAX_SEMESTER_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Explicit ordinals must be positive. `field` names the request field.
pub fn validate_order(field: &str, order: i32) -> Result<i32, ServiceError> {
    if order < 1 {
        return Err(ServiceError::validation(format!(
            "{field}: must be a positive integer"
        )));
    }
    Ok(order)
}

/// Name of the semester created by the bootstrap, e.g. `Winter 2026`.
pub fn default_semester_name(year: i32) -> String {
    format!("Winter {year}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semester_name_rules() {
        assert_eq!(validate_semester_name(" W1 ").unwrap(), "W1");
        assert!(validate_semester_name("").is_err());
        assert!(validate_semester_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn order_must_be_positive() {
        assert_eq!(validate_order("semesterOrder", 3).unwrap(), 3);
        let err = validate_order("semesterOrder", 0).unwrap_err();
        assert_eq!(err.to_string(), "semesterOrder: must be a positive integer");
    }

    #[test]
    fn default_name() {
        assert_eq!(default_semester_name(2026), "Winter 2026");
    }
}
