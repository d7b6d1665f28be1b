//! PgStore behaviour under real PostgreSQL, including concurrent writers.
//!
//! Uses `STUDYPLAN_TEST_PG_URL` when set, otherwise a testcontainers
//! PostgreSQL instance.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use studyplan_core::store::{
    CompletionChange, HierarchyStore, NewPlan, NewSemester, PgStore, SemesterChanges, StoreError,
};
use studyplan_db::models::Season;
use studyplan_test_utils::{create_test_db, drop_test_db};

fn new_plan(owner_id: i64, name: &str) -> NewPlan {
    NewPlan {
        owner_id,
        name: name.to_owned(),
        study_program_id: Some(10),
        study_program_name: None,
    }
}

fn new_semester(plan_id: i64, name: &str) -> NewSemester {
    NewSemester {
        study_plan_id: plan_id,
        name: name.to_owned(),
        season: None,
        order: None,
    }
}

#[tokio::test]
async fn concurrent_semester_inserts_get_distinct_orders() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));
    let plan_id = store.insert_plan(new_plan(1, "Plan"), 5).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert_semester(new_semester(plan_id, &format!("S{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let orders: HashSet<i32> = store
        .list_semesters(plan_id)
        .await
        .unwrap()
        .iter()
        .map(|s| s.semester_order)
        .collect();
    assert_eq!(orders, (1..=12).collect());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_creates_respect_active_limit() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert_plan(new_plan(1, &format!("P{i}")), 5).await
        }));
    }
    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(StoreError::Invalid(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 5);
    assert_eq!(store.count_active_plans(1).await.unwrap(), 5);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn placement_lifecycle() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let plan = store.insert_plan(new_plan(1, "Plan"), 5).await.unwrap();
    let s1 = store.insert_semester(new_semester(plan.id, "S1")).await.unwrap();
    let s2 = store.insert_semester(new_semester(plan.id, "S2")).await.unwrap();

    let a = store.insert_placement(s1.id, "A", None).await.unwrap();
    let b = store.insert_placement(s1.id, "B", None).await.unwrap();
    let c = store.insert_placement(s1.id, "C", None).await.unwrap();
    assert!(matches!(
        store.insert_placement(s1.id, "A", None).await,
        Err(StoreError::Duplicate(_))
    ));

    let reordered = store.reorder_placements(s1.id, &[c.id, a.id, b.id]).await.unwrap();
    let ids: Vec<i64> = reordered.iter().map(|p| p.id).collect();
    assert_eq!(ids, [c.id, a.id, b.id]);

    store.insert_placement(s2.id, "X", None).await.unwrap();
    let moved = store.move_placement(a.id, s2.id).await.unwrap();
    assert_eq!((moved.semester_id, moved.course_order), (s2.id, 2));

    let done = store
        .set_completion(b.id, CompletionChange::Toggle, Utc::now())
        .await
        .unwrap();
    assert!(done.is_completed && done.completion_date.is_some());

    let progress = store.plan_progress(plan.id).await.unwrap();
    assert_eq!((progress.total, progress.completed), (4, 1));

    assert_eq!(store.delete_placements_for_semester(s1.id).await.unwrap(), 2);
    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn semester_reorder_and_update() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let plan = store.insert_plan(new_plan(1, "Plan"), 5).await.unwrap();
    let a = store.insert_semester(new_semester(plan.id, "A")).await.unwrap();
    let b = store.insert_semester(new_semester(plan.id, "B")).await.unwrap();

    let reordered = store.reorder_semesters(plan.id, &[b.id, a.id]).await.unwrap();
    let orders: Vec<(i64, i32)> = reordered.iter().map(|s| (s.id, s.semester_order)).collect();
    assert_eq!(orders, [(b.id, 1), (a.id, 2)]);

    let updated = store
        .update_semester(
            a.id,
            SemesterChanges {
                season: Some(Some(Season::Summer)),
                ..SemesterChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.winter_or_summer, Some(Season::Summer));

    assert!(matches!(
        store
            .update_semester(
                a.id,
                SemesterChanges {
                    name: Some("B".into()),
                    ..SemesterChanges::default()
                },
            )
            .await,
        Err(StoreError::Duplicate(_))
    ));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_and_default_semester() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let plan = store.insert_plan(new_plan(1, "Plan"), 5).await.unwrap();

    let created = store
        .ensure_default_semester(plan.id, "Winter 2026", Season::Winter)
        .await
        .unwrap();
    let semester = created.expect("empty plan gets a semester");
    assert!(
        store
            .ensure_default_semester(plan.id, "Winter 2026", Season::Winter)
            .await
            .unwrap()
            .is_none()
    );
    store.insert_placement(semester.id, "IN2003", None).await.unwrap();

    let copy = store.duplicate_plan(plan.id, "Copy", 5).await.unwrap();
    assert_ne!(copy.id, plan.id);
    assert_eq!(store.list_placements_for_plan(copy.id).await.unwrap().len(), 1);

    assert!(store.delete_plan(plan.id).await.unwrap());
    assert!(!store.delete_plan(plan.id).await.unwrap());
    assert_eq!(store.list_placements_for_plan(copy.id).await.unwrap().len(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn append_after_largest_order_is_rejected() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let plan = store.insert_plan(new_plan(1, "Plan"), 5).await.unwrap();

    store
        .insert_semester(NewSemester {
            order: Some(i32::MAX),
            ..new_semester(plan.id, "Last")
        })
        .await
        .unwrap();
    assert!(matches!(
        store.insert_semester(new_semester(plan.id, "Next")).await,
        Err(StoreError::Invalid(_))
    ));

    let s1 = store
        .insert_semester(NewSemester {
            order: Some(1),
            ..new_semester(plan.id, "S1")
        })
        .await
        .unwrap();
    let a = store.insert_placement(s1.id, "A", None).await.unwrap();
    let full = store.insert_placement(s1.id, "Z", Some(i32::MAX)).await.unwrap();
    assert!(matches!(
        store.insert_placement(s1.id, "B", None).await,
        Err(StoreError::Invalid(_))
    ));

    let s2 = store
        .insert_semester(NewSemester {
            order: Some(2),
            ..new_semester(plan.id, "S2")
        })
        .await
        .unwrap();
    let b = store.insert_placement(s2.id, "B", None).await.unwrap();
    assert!(matches!(
        store.move_placement(b.id, s1.id).await,
        Err(StoreError::Invalid(_))
    ));
    assert_eq!(store.get_placement(b.id).await.unwrap().unwrap().semester_id, s2.id);
    let ids: Vec<i64> = store
        .list_placements(s1.id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, [a.id, full.id]);

    pool.close().await;
    drop_test_db(&db_name).await;
}
