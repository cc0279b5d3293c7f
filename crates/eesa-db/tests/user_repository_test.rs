//! Integration tests for the User repository using in-memory SurrealDB.

use std::collections::BTreeSet;

use eesa_core::error::EesaError;
use eesa_core::models::audit::{AuditAction, AuditDraft, ObjectRef};
use eesa_core::models::permission::{Action, PermissionCode, ResourceType};
use eesa_core::models::user::{CreateUser, UpdateUser, UserRole};
use eesa_core::repository::{AuditLogRepository, Pagination, UserRepository};
use eesa_db::repository::{SurrealAuditLogRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    eesa_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(username: &str, role: UserRole) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: format!("{username}@eesa.test"),
        password: "correct horse battery".into(),
        role,
    }
}

fn draft(actor_id: Uuid, action: AuditAction) -> AuditDraft {
    AuditDraft {
        actor_id,
        action,
        ip_address: Some("10.0.0.1".into()),
        user_agent: None,
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = SurrealUserRepository::new(setup().await);

    let user = repo.create(create_input("asha", UserRole::Student)).await.unwrap();
    assert_eq!(user.username, "asha");
    assert!(user.is_active);
    assert!(!user.is_staff);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched.email, "asha@eesa.test");
    assert_eq!(repo.get_by_username("asha").await.unwrap().id, user.id);
    assert_eq!(repo.get_by_email("asha@eesa.test").await.unwrap().id, user.id);
}

#[tokio::test]
async fn admin_role_derives_flags() {
    let repo = SurrealUserRepository::new(setup().await);
    let admin = repo.create(create_input("root", UserRole::Admin)).await.unwrap();
    assert!(admin.is_staff);
    assert!(admin.is_superuser);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let repo = SurrealUserRepository::new(setup().await);
    repo.create(create_input("asha", UserRole::Student)).await.unwrap();

    let mut dup = create_input("asha", UserRole::Teacher);
    dup.email = "other@eesa.test".into();
    let err = repo.create(dup).await.unwrap_err();
    assert!(matches!(err, EesaError::AlreadyExists { .. }));
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let repo = SurrealUserRepository::new(setup().await);
    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EesaError::NotFound { .. }));
}

#[tokio::test]
async fn audited_update_writes_diff() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);

    let admin = repo.create(create_input("root", UserRole::Admin)).await.unwrap();
    let user = repo.create(create_input("asha", UserRole::Student)).await.unwrap();

    let grant = PermissionCode::new(ResourceType::Event, Action::Add);
    let updated = repo
        .update(
            user.id,
            UpdateUser {
                permissions: Some(BTreeSet::from([grant])),
                ..UpdateUser::default()
            },
            Some(draft(admin.id, AuditAction::Update)),
        )
        .await
        .unwrap();
    assert!(updated.permissions.contains(&grant));

    let history = audit
        .history_for_object(ObjectRef::new(ResourceType::User, user.id), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.action, AuditAction::Update);
    assert_eq!(entry.actor_id, admin.id);
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    let changes = entry.changes.as_ref().unwrap();
    assert!(changes.keys().any(|k| k.starts_with("permissions")));
}

#[tokio::test]
async fn unaudited_update_leaves_log_empty() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);

    let user = repo.create(create_input("asha", UserRole::Student)).await.unwrap();
    repo.update(
        user.id,
        UpdateUser {
            is_active: Some(false),
            ..UpdateUser::default()
        },
        None,
    )
    .await
    .unwrap();

    let history = audit
        .history_for_object(ObjectRef::new(ResourceType::User, user.id), 10)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn list_users_paginates() {
    let repo = SurrealUserRepository::new(setup().await);
    for name in ["a1", "a2", "a3"] {
        repo.create(create_input(name, UserRole::Student)).await.unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}
