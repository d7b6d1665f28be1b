//! Integration tests for the hierarchy query modules and migrations.
//!
//! These use `STUDYPLAN_TEST_PG_URL` when set, otherwise a testcontainers
//! PostgreSQL instance.

use studyplan_db::models::Season;
use studyplan_db::pool;
use studyplan_db::queries::{self, plans, semester_courses, semesters};
use studyplan_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_hierarchy_tables() {
    let (pool, db_name) = create_test_db().await;

    let counts = pool::table_counts(&pool).await.expect("table_counts");
    let names: Vec<&str> = counts.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, pool::HIERARCHY_TABLES);
    assert!(counts.iter().all(|(_, c)| *c == 0));

    // Running again is a no-op.
    pool::run_migrations(&pool).await.expect("re-run migrations");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plan_crud_and_active_count() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, 7, "Informatics", Some(3), None)
        .await
        .expect("insert_plan");
    assert_eq!(plan.owner_id, 7);
    assert!(plan.is_active);
    assert!(plan.study_program_name.is_none());

    let fetched = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched, plan);

    assert_eq!(plans::count_active_plans(&pool, 7).await.unwrap(), 1);
    assert_eq!(plans::count_active_plans(&pool, 8).await.unwrap(), 0);

    let mut changed = plan.clone();
    changed.name = "Renamed".into();
    changed.is_active = false;
    let updated = plans::update_plan(&pool, &changed).await.unwrap().unwrap();
    assert_eq!(updated.name, "Renamed");
    assert!(updated.updated_at >= plan.updated_at);
    assert_eq!(plans::count_active_plans(&pool, 7).await.unwrap(), 0);

    assert_eq!(
        plans::set_program_name(&pool, plan.id, Some("Computer Science"))
            .await
            .unwrap(),
        1
    );
    let cached = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(cached.study_program_name.as_deref(), Some("Computer Science"));

    assert!(plans::delete_plan(&pool, plan.id).await.unwrap());
    assert!(!plans::delete_plan(&pool, plan.id).await.unwrap());
    assert!(plans::get_plan(&pool, plan.id).await.unwrap().is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn blank_plan_name_is_rejected_by_schema() {
    let (pool, db_name) = create_test_db().await;

    let result = plans::insert_plan(&pool, 1, "   ", None, None).await;
    assert!(result.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn semester_order_and_listing() {
    let (pool, db_name) = create_test_db().await;
    let plan = plans::insert_plan(&pool, 1, "P", None, None).await.unwrap();

    assert_eq!(semesters::max_semester_order(&pool, plan.id).await.unwrap(), 0);

    let s2 = semesters::insert_semester(&pool, plan.id, "Second", 2, Some(Season::Summer))
        .await
        .unwrap();
    let s1 = semesters::insert_semester(&pool, plan.id, "First", 1, Some(Season::Winter))
        .await
        .unwrap();
    assert_eq!(semesters::max_semester_order(&pool, plan.id).await.unwrap(), 2);

    let listed = semesters::list_semesters_for_plan(&pool, plan.id).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![s1.id, s2.id]);
    assert_eq!(listed[1].winter_or_summer, Some(Season::Summer));

    // Same ordinal twice under one plan violates the unique constraint.
    let err = semesters::insert_semester(&pool, plan.id, "Clash", 1, None)
        .await
        .unwrap_err();
    assert!(queries::is_unique_violation(&err));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn semester_swap_inside_transaction() {
    let (pool, db_name) = create_test_db().await;
    let plan = plans::insert_plan(&pool, 1, "P", None, None).await.unwrap();
    let a = semesters::insert_semester(&pool, plan.id, "A", 1, None).await.unwrap();
    let b = semesters::insert_semester(&pool, plan.id, "B", 2, None).await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    plans::lock_plan(&mut *tx, plan.id).await.unwrap().unwrap();
    semesters::set_semester_order(&mut *tx, a.id, 2).await.unwrap();
    semesters::set_semester_order(&mut *tx, b.id, 1).await.unwrap();
    tx.commit().await.expect("deferred constraint allows the swap");

    let listed = semesters::list_semesters_for_plan(&pool, plan.id).await.unwrap();
    assert_eq!(listed[0].id, b.id);
    assert_eq!(listed[1].id, a.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn placements_progress_and_cascade() {
    let (pool, db_name) = create_test_db().await;
    let plan = plans::insert_plan(&pool, 1, "P", None, None).await.unwrap();
    let s1 = semesters::insert_semester(&pool, plan.id, "S1", 1, None).await.unwrap();
    let s2 = semesters::insert_semester(&pool, plan.id, "S2", 2, None).await.unwrap();

    let c1 = semester_courses::insert_semester_course(&pool, s1.id, "CS101", 1)
        .await
        .unwrap();
    let c2 = semester_courses::insert_semester_course(&pool, s2.id, "CS102", 1)
        .await
        .unwrap();

    let dup = semester_courses::insert_semester_course(&pool, s1.id, "CS101", 2)
        .await
        .unwrap_err();
    assert!(queries::is_unique_violation(&dup));

    let found = semester_courses::find_in_semester(&pool, s1.id, "CS101")
        .await
        .unwrap();
    assert_eq!(found.map(|p| p.id), Some(c1.id));

    let now = chrono::Utc::now();
    let done = semester_courses::set_completion(&pool, c1.id, true, Some(now))
        .await
        .unwrap()
        .unwrap();
    assert!(done.is_completed);
    assert!(done.completion_date.is_some());

    // Completion flag and date must agree.
    assert!(
        semester_courses::set_completion(&pool, c2.id, true, None)
            .await
            .is_err()
    );

    let progress = semester_courses::plan_progress(&pool, plan.id).await.unwrap();
    assert_eq!((progress.total, progress.completed), (2, 1));

    let all = semester_courses::list_for_plan(&pool, plan.id).await.unwrap();
    assert_eq!(
        all.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![c1.id, c2.id]
    );

    let moved = semester_courses::relocate(&pool, c1.id, s2.id, 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.semester_id, s2.id);
    assert_eq!(semester_courses::max_course_order(&pool, s2.id).await.unwrap(), 2);
    assert_eq!(semester_courses::max_course_order(&pool, s1.id).await.unwrap(), 0);

    assert!(semesters::delete_semester(&pool, s2.id).await.unwrap());
    assert!(
        semester_courses::get_semester_course(&pool, c2.id)
            .await
            .unwrap()
            .is_none()
    );

    assert!(plans::delete_plan(&pool, plan.id).await.unwrap());
    let counts = pool::table_counts(&pool).await.unwrap();
    assert!(counts.iter().all(|(_, c)| *c == 0));

    pool.close().await;
    drop_test_db(&db_name).await;
}
