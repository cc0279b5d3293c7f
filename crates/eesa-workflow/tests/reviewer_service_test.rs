//! Integration tests for reviewer assignment.

mod common;

use eesa_core::error::EesaError;
use eesa_core::models::student::Cohort;
use eesa_core::models::user::UserRole;
use eesa_db::repository::{SurrealReviewerRepository, SurrealStudentRepository};
use eesa_workflow::{ReviewerService, WorkflowConfig};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use uuid::Uuid;

fn service(
    db: &Surreal<Db>,
    config: WorkflowConfig,
) -> ReviewerService<SurrealStudentRepository<Db>, SurrealReviewerRepository<Db>> {
    ReviewerService::new(
        SurrealStudentRepository::new(db.clone()),
        SurrealReviewerRepository::new(db.clone()),
        config,
    )
}

#[tokio::test]
async fn new_reviewer_displaces_active_one() {
    let db = common::setup().await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;
    let c = common::student(&db, "chitra", 2021, 2021).await;
    let f = common::student(&db, "farah", 2021, 2021).await;
    let other = common::student(&db, "kiran", 2019, 2020).await;
    let reviewers = service(&db, WorkflowConfig::default());
    let cohort = Cohort::new(2021, 2021);

    reviewers
        .assign(&admin, other, Cohort::new(2019, 2020), None)
        .await
        .unwrap();
    let first = reviewers.assign(&admin, c, cohort, None).await.unwrap();
    assert!(first.displaced.is_none());

    let second = reviewers.assign(&admin, f, cohort, None).await.unwrap();
    let displaced = second.displaced.unwrap();
    assert_eq!(displaced.student_id, c);
    assert!(!displaced.is_active);
    assert!(second.assignment.is_active);

    let active = reviewers.active_for_cohort(cohort).await.unwrap().unwrap();
    assert_eq!(active.student_id, f);
    // The other cohort's reviewer is untouched.
    assert_eq!(reviewers.list_active().await.unwrap().len(), 2);
    assert_eq!(
        reviewers.active_cohorts_for(other).await.unwrap(),
        vec![Cohort::new(2019, 2020)]
    );
    assert_eq!(reviewers.history_for_cohort(cohort).await.unwrap().len(), 2);
}

#[tokio::test]
async fn cohort_mismatch_is_rejected_when_enforced() {
    let db = common::setup().await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;
    let senior = common::student(&db, "lata", 2019, 2020).await;
    let junior_cohort = Cohort::new(2021, 2022);

    let err = service(&db, WorkflowConfig::default())
        .assign(&admin, senior, junior_cohort, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Validation { .. }));

    let relaxed = WorkflowConfig {
        enforce_reviewer_cohort_match: false,
        ..WorkflowConfig::default()
    };
    let outcome = service(&db, relaxed)
        .assign(&admin, senior, junior_cohort, None)
        .await
        .unwrap();
    assert_eq!(outcome.assignment.cohort, junior_cohort);
}

#[tokio::test]
async fn assignment_requires_permission() {
    let db = common::setup().await;
    let student = common::student(&db, "chitra", 2021, 2021).await;
    let actor = common::actor(&db, student).await;

    let err = service(&db, WorkflowConfig::default())
        .assign(&actor, student, Cohort::new(2021, 2021), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Forbidden { .. }));
}

#[tokio::test]
async fn reviewer_must_have_student_record() {
    let db = common::setup().await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;
    let teacher = common::user(&db, "anand", UserRole::Teacher).await;

    let err = service(&db, WorkflowConfig::default())
        .assign(&admin, teacher, Cohort::new(2021, 2021), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::NotFound { .. }));

    let err = service(&db, WorkflowConfig::default())
        .assign(&admin, Uuid::new_v4(), Cohort::new(2021, 2021), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::NotFound { .. }));
}

#[tokio::test]
async fn deactivation_keeps_history() {
    let db = common::setup().await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;
    let c = common::student(&db, "chitra", 2021, 2021).await;
    let reviewers = service(&db, WorkflowConfig::default());
    let cohort = Cohort::new(2021, 2021);

    let outcome = reviewers.assign(&admin, c, cohort, None).await.unwrap();
    let deactivated = reviewers
        .deactivate(&admin, outcome.assignment.id, None)
        .await
        .unwrap();
    assert!(!deactivated.is_active);
    assert!(reviewers.active_for_cohort(cohort).await.unwrap().is_none());
    assert_eq!(reviewers.history_for_cohort(cohort).await.unwrap().len(), 1);

    let again = reviewers
        .deactivate(&admin, outcome.assignment.id, None)
        .await
        .unwrap();
    assert!(!again.is_active);
}
