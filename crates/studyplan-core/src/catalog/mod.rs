//! Read-only view of the external course catalog.
//!
//! Catalog facts are never stored locally except for the plan's cached
//! program name. Lookups are used to enrich responses only; a failed lookup
//! must leave the enriched fields empty rather than fail the request.

pub mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

pub use http::{CatalogConfig, HttpCatalogClient};

/// A study program as published by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyProgram {
    pub id: i64,
    /// Display name of the program.
    #[serde(default)]
    pub curriculum: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
}

/// Descriptive metadata for one module (course).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_credits")]
    pub credits: Option<i32>,
    /// Responsible lecturer.
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub occurrence: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
}

/// Credits arrive as a number or as a numeric string depending on the
/// catalog endpoint. Anything unparseable becomes `None`.
fn lenient_credits<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Timeout, connection failure, non-404 error status or unreadable body.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Lookup-only client for the catalog. `Ok(None)` means the catalog answered
/// and does not know the id.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn study_program(&self, id: i64) -> Result<Option<StudyProgram>, CatalogError>;

    async fn module(&self, course_id: &str) -> Result<Option<ModuleInfo>, CatalogError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn CatalogClient) {}
};

/// Fixed in-process catalog. Used for offline runs and as a test double;
/// [`StaticCatalog::set_unavailable`] simulates an outage.
#[derive(Default)]
pub struct StaticCatalog {
    programs: HashMap<i64, StudyProgram>,
    modules: HashMap<String, ModuleInfo>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, id: i64, curriculum: &str) -> Self {
        self.programs.insert(
            id,
            StudyProgram {
                id,
                curriculum: Some(curriculum.to_owned()),
                degree: None,
            },
        );
        self
    }

    pub fn with_module(mut self, course_id: &str, info: ModuleInfo) -> Self {
        self.modules.insert(course_id.to_owned(), info);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups attempted so far, failed ones included.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CatalogError::Unavailable("catalog marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogClient for StaticCatalog {
    async fn study_program(&self, id: i64) -> Result<Option<StudyProgram>, CatalogError> {
        self.check()?;
        Ok(self.programs.get(&id).cloned())
    }

    async fn module(&self, course_id: &str) -> Result<Option<ModuleInfo>, CatalogError> {
        self.check()?;
        Ok(self.modules.get(course_id).cloned())
    }
}
