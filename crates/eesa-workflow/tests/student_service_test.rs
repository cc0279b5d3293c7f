//! Integration tests for student academic records.

mod common;

use eesa_core::error::EesaError;
use eesa_core::models::student::{CreateStudent, UpdateStudent};
use eesa_core::models::user::UserRole;
use eesa_db::repository::SurrealStudentRepository;
use eesa_workflow::StudentService;
use uuid::Uuid;

fn enrolment(user_id: Uuid, semester: u8) -> CreateStudent {
    CreateStudent {
        user_id,
        full_name: "Asha Menon".into(),
        scheme: 2021,
        year_of_joining: 2021,
        expected_year_of_passout: 2025,
        ongoing_semester: semester,
    }
}

#[tokio::test]
async fn student_registers_own_record() {
    let db = common::setup().await;
    let service = StudentService::new(SurrealStudentRepository::new(db.clone()));
    let id = common::user(&db, "asha", UserRole::Student).await;
    let actor = common::actor(&db, id).await;

    let student = service
        .register_student(&actor, enrolment(id, 5), None)
        .await
        .unwrap();
    assert_eq!(student.year_of_study, 3);
    assert_eq!(service.get(&actor, id).await.unwrap().full_name, "Asha Menon");
}

#[tokio::test]
async fn registering_someone_else_needs_grant() {
    let db = common::setup().await;
    let service = StudentService::new(SurrealStudentRepository::new(db.clone()));
    let asha = common::user(&db, "asha", UserRole::Student).await;
    let bala = common::user(&db, "bala", UserRole::Student).await;
    let bala = common::actor(&db, bala).await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;

    let err = service
        .register_student(&bala, enrolment(asha, 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Forbidden { .. }));

    service
        .register_student(&admin, enrolment(asha, 1), None)
        .await
        .unwrap();
    let err = service.get(&bala, asha).await.unwrap_err();
    assert!(matches!(err, EesaError::Forbidden { .. }));
}

#[tokio::test]
async fn semester_update_moves_year_of_study() {
    let db = common::setup().await;
    let service = StudentService::new(SurrealStudentRepository::new(db.clone()));
    let id = common::user(&db, "asha", UserRole::Student).await;
    let admin = common::user(&db, "root", UserRole::Admin).await;
    let admin = common::actor(&db, admin).await;
    service
        .register_student(&admin, enrolment(id, 2), None)
        .await
        .unwrap();

    let updated = service
        .update_student(
            &admin,
            id,
            UpdateStudent {
                ongoing_semester: Some(7),
                ..UpdateStudent::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.year_of_study, 4);

    let err = service
        .update_student(
            &admin,
            id,
            UpdateStudent {
                ongoing_semester: Some(9),
                ..UpdateStudent::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Validation { .. }));
}
