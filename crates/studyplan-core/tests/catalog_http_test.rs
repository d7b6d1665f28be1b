//! HttpCatalogClient against a throwaway catalog served on loopback.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use studyplan_core::catalog::{CatalogClient, CatalogConfig, CatalogError, HttpCatalogClient};

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn study_program(State(hits): State<Hits>, Path(id): Path<i64>) -> Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    match id {
        10 => Json(json!({
            "id": 10,
            "degree": "Bachelor",
            "curriculum": "Informatics",
            "fieldOfStudies": "Computer Science",
        }))
        .into_response(),
        500 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn module(State(hits): State<Hits>, Path(module_id): Path<String>) -> Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    match module_id.as_str() {
        "IN2003" => Json(json!({
            "moduleId": "IN2003",
            "name": "Theoretische Informatik",
            "credits": "8",
            "responsible": "Prof. A",
            "occurrence": "Sommersemester",
            "category": "Pflichtmodule",
            "subcategory": null,
        }))
        .into_response(),
        "GARBLED" => (StatusCode::OK, "not json").into_response(),
        "SLOW" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::NOT_FOUND.into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_catalog() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/api/v1/study-programs/{id}", get(study_program))
        .route("/api/v1/modules/module/{module_id}", get(module))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn client(base_url: &str) -> HttpCatalogClient {
    let mut config = CatalogConfig::new(base_url);
    config.timeout = Duration::from_millis(300);
    HttpCatalogClient::new(&config).unwrap()
}

#[tokio::test]
async fn study_program_found_and_cached() {
    let (url, hits) = spawn_catalog().await;
    let catalog = client(&url);

    let program = catalog.study_program(10).await.unwrap().unwrap();
    assert_eq!(program.curriculum.as_deref(), Some("Informatics"));
    assert_eq!(program.degree.as_deref(), Some("Bachelor"));

    catalog.study_program(10).await.unwrap().unwrap();
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn unknown_ids_are_none_and_not_cached() {
    let (url, hits) = spawn_catalog().await;
    let catalog = client(&url);

    assert_eq!(catalog.study_program(3).await.unwrap(), None);
    assert_eq!(catalog.module("IN9999").await.unwrap(), None);
    assert_eq!(catalog.module("IN9999").await.unwrap(), None);
    assert_eq!(hits.count(), 3);
}

#[tokio::test]
async fn module_fields_and_string_credits() {
    let (url, _) = spawn_catalog().await;
    let catalog = client(&url);

    let module = catalog.module("IN2003").await.unwrap().unwrap();
    assert_eq!(module.name.as_deref(), Some("Theoretische Informatik"));
    assert_eq!(module.credits, Some(8));
    assert_eq!(module.responsible.as_deref(), Some("Prof. A"));
    assert!(module.subcategory.is_none());
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let (url, _) = spawn_catalog().await;
    let err = client(&url).study_program(500).await.unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)));
}

#[tokio::test]
async fn bad_body_is_unavailable() {
    let (url, _) = spawn_catalog().await;
    let err = client(&url).module("GARBLED").await.unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)));
}

#[tokio::test]
async fn slow_catalog_times_out() {
    let (url, _) = spawn_catalog().await;
    let started = std::time::Instant::now();
    let err = client(&url).module("SLOW").await.unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unreachable_catalog_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .study_program(10)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)));
}
