//! REST surface.
//!
//! Every handler authenticates the caller, resolves the target through the
//! [`OwnershipGate`] and only then calls into a service by id.

mod error;
mod extract;
mod plans;
mod semester_courses;
mod semesters;


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use studyplan_core::catalog::CatalogClient;
use studyplan_core::identity::IdentityVerifier;
use studyplan_core::ownership::OwnershipGate;
use studyplan_core::placement::PlacementService;
use studyplan_core::plan::PlanService;
use studyplan_core::semester::SemesterService;
use studyplan_core::store::HierarchyStore;

pub use error::AppError;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub plans: PlanService,
    pub semesters: SemesterService,
    pub placements: PlacementService,
    pub gate: OwnershipGate,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HierarchyStore>,
        catalog: Arc<dyn CatalogClient>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            plans: PlanService::new(store.clone(), catalog.clone()),
            semesters: SemesterService::new(store.clone()),
            placements: PlacementService::new(store.clone(), catalog),
            gate: OwnershipGate::new(store),
            verifier,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub message: String,
    pub deleted_id: i64,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(plans::routes())
        .merge(semesters::routes())
        .merge(semester_courses::routes());

    Router::new()
        .route("/", get(index))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("studyplan listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("studyplan shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "studyplan",
        "version": env!("CARGO_PKG_VERSION"),
        "resources": {
            "plans": "/api/v1/plans",
            "myPlans": "/api/v1/plans/mine",
            "semesters": "/api/v1/semesters",
            "semesterCourses": "/api/v1/semester-courses",
        },
    }))
}
