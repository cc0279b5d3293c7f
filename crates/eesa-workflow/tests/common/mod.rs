//! Shared fixtures for the workflow integration tests.

#![allow(dead_code)]

use eesa_core::models::principal::Actor;
use eesa_core::models::student::CreateStudent;
use eesa_core::models::user::{CreateUser, UserRole};
use eesa_core::repository::{StudentRepository, UserRepository};
use eesa_db::repository::{
    SurrealGroupRepository, SurrealStudentRepository, SurrealUserRepository,
};
use eesa_workflow::{IdentityService, WorkflowConfig};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub const PASSWORD: &str = "resistance is futile";

/// In-memory DB with the schema applied.
pub async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    eesa_db::run_migrations(&db).await.unwrap();
    db
}

pub fn identity(
    db: &Surreal<Db>,
) -> IdentityService<SurrealUserRepository<Db>, SurrealGroupRepository<Db>> {
    IdentityService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealGroupRepository::new(db.clone()),
        WorkflowConfig::default(),
    )
}

pub async fn user(db: &Surreal<Db>, username: &str, role: UserRole) -> Uuid {
    SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            username: username.into(),
            email: format!("{username}@eesa.test"),
            password: PASSWORD.into(),
            role,
        })
        .await
        .unwrap()
        .id
}

/// A student user with an academic record in the given cohort.
pub async fn student(db: &Surreal<Db>, username: &str, scheme: u16, year_of_joining: u16) -> Uuid {
    let id = user(db, username, UserRole::Student).await;
    SurrealStudentRepository::new(db.clone())
        .create(
            CreateStudent {
                user_id: id,
                full_name: username.to_uppercase(),
                scheme,
                year_of_joining,
                expected_year_of_passout: year_of_joining + 4,
                ongoing_semester: 3,
            },
            None,
        )
        .await
        .unwrap();
    id
}

pub async fn actor(db: &Surreal<Db>, user_id: Uuid) -> Actor {
    identity(db).load_actor(user_id).await.unwrap()
}
