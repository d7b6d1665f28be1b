use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Term a semester falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Season {
    Winter,
    Summer,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Winter => "WINTER",
            Self::Summer => "SUMMER",
        };
        f.write_str(s)
    }
}

impl FromStr for Season {
    type Err = SeasonParseError;

    /// Accepts the stored spelling plus the single-letter `W`/`S` shorthand
    /// older clients send. Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WINTER" | "W" => Ok(Self::Winter),
            "SUMMER" | "S" => Ok(Self::Summer),
            _ => Err(SeasonParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Season`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid season: {0:?} (expected WINTER or SUMMER)")]
pub struct SeasonParseError(pub String);

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Root of the hierarchy. Owned by exactly one principal for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    /// Weak reference into the external catalog.
    pub study_program_id: Option<i64>,
    /// Denormalised display name of the program. Best-effort cache only.
    pub study_program_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A semester inside a plan, ordered by `semester_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: i64,
    pub study_plan_id: i64,
    pub name: String,
    pub semester_order: i32,
    pub winter_or_summer: Option<Season>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A placement: one catalog course scheduled inside one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SemesterCourse {
    pub id: i64,
    pub semester_id: i64,
    /// Opaque catalog identifier. Never validated against the catalog.
    pub course_id: String,
    pub is_completed: bool,
    /// Set iff `is_completed`.
    pub completion_date: Option<DateTime<Utc>>,
    pub course_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Placement counts for a whole plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlanProgress {
    pub total: i64,
    pub completed: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_display_roundtrip() {
        for v in [Season::Winter, Season::Summer] {
            let parsed: Season = v.to_string().parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn season_accepts_shorthand_and_case() {
        assert_eq!("w".parse::<Season>().unwrap(), Season::Winter);
        assert_eq!("Summer".parse::<Season>().unwrap(), Season::Summer);
    }

    #[test]
    fn season_invalid() {
        let err = "autumn".parse::<Season>().unwrap_err();
        assert!(err.to_string().contains("autumn"));
    }

    #[test]
    fn season_serializes_uppercase() {
        let json = serde_json::to_string(&Season::Winter).unwrap();
        assert_eq!(json, "\"WINTER\"");
    }

    #[test]
    fn plan_serializes_camel_case() {
        let now = Utc::now();
        let plan = StudyPlan {
            id: 1,
            owner_id: 7,
            name: "My Plan".into(),
            study_program_id: Some(3),
            study_program_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["ownerId"], 7);
        assert_eq!(json["studyProgramId"], 3);
        assert_eq!(json["isActive"], true);
        assert!(json["studyProgramName"].is_null());
    }
}
