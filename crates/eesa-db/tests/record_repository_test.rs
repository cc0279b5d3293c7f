//! Integration tests for the generic registry repository using in-memory
//! SurrealDB.

use chrono::{NaiveDate, NaiveTime, Utc};
use eesa_core::error::EesaError;
use eesa_core::models::academics::{Note, NotePayload};
use eesa_core::models::audit::{AuditAction, AuditDraft, ObjectRef};
use eesa_core::models::events::{Event, EventPayload};
use eesa_core::models::permission::ResourceType;
use eesa_core::models::record::Record;
use eesa_core::repository::{AuditLogRepository, Pagination, PendingFilter, RecordRepository};
use eesa_db::repository::{SurrealAuditLogRepository, SurrealRecordRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    eesa_db::run_migrations(&db).await.unwrap();
    db
}

fn note(owner: Uuid, title: &str) -> Note {
    Record::new(
        owner,
        NotePayload {
            title: title.into(),
            description: None,
            subject_id: Uuid::new_v4(),
            file: "notes/s3/signals.pdf".into(),
        },
    )
}

fn event(owner: Uuid) -> Event {
    Record::new(
        owner,
        EventPayload {
            title: "Tech Talk".into(),
            description: Some("Power electronics in EVs".into()),
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            venue: Some("Seminar Hall".into()),
            max_participants: Some(120),
            is_active: true,
        },
    )
}

fn draft(actor_id: Uuid, action: AuditAction) -> Option<AuditDraft> {
    Some(AuditDraft {
        actor_id,
        action,
        ip_address: None,
        user_agent: None,
    })
}

#[tokio::test]
async fn note_starts_pending() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let owner = Uuid::new_v4();

    let created = repo.create(note(owner, "Signals"), None).await.unwrap();
    assert!(created.is_pending());
    assert_eq!(created.owner_id, owner);
    assert_eq!(created.payload.title, "Signals");
}

#[tokio::test]
async fn event_has_no_approval_state() {
    let repo = SurrealRecordRepository::<_, EventPayload>::new(setup().await);
    let created = repo.create(event(Uuid::new_v4()), None).await.unwrap();
    assert!(created.approval.is_none());
    assert_eq!(created.payload.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());

    let err = repo
        .approve(created.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Validation { .. }));
}

#[tokio::test]
async fn invalid_payload_is_rejected() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let err = repo.create(note(Uuid::new_v4(), "  "), None).await.unwrap_err();
    assert!(matches!(err, EesaError::Validation { .. }));
}

#[tokio::test]
async fn approve_sets_approver_and_audits() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let teacher = Uuid::new_v4();

    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();
    let approved = repo
        .approve(created.id, teacher, Utc::now(), draft(teacher, AuditAction::Approve))
        .await
        .unwrap();
    assert!(approved.is_approved());
    assert_eq!(approved.approval.unwrap().approved_by(), Some(teacher));

    let history = audit
        .history_for_object(ObjectRef::new(ResourceType::Note, created.id), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::Approve);
    assert_eq!(history[0].object_repr, "Signals");
    assert!(history[0].changes.is_some());
}

#[tokio::test]
async fn second_approval_fails() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();

    repo.approve(created.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap();
    let err = repo
        .approve(created.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::AlreadyApproved { .. }));
}

#[tokio::test]
async fn concurrent_approvals_have_one_winner() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();

    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let (a, b) = tokio::join!(
        repo.approve(created.id, first, Utc::now(), draft(first, AuditAction::Approve)),
        repo.approve(created.id, second, Utc::now(), draft(second, AuditAction::Approve)),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser.unwrap_err(), EesaError::AlreadyApproved { .. }));

    let history = audit
        .history_for_object(ObjectRef::new(ResourceType::Note, created.id), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn update_keeps_approval_state() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();
    let approved = repo
        .approve(created.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap();

    let mut payload = approved.payload.clone();
    payload.title = "Signals and Systems".into();
    let updated = repo.update(created.id, payload, None).await.unwrap();
    assert_eq!(updated.payload.title, "Signals and Systems");
    assert!(updated.is_approved());
}

#[tokio::test]
async fn delete_records_given_action() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let owner = Uuid::new_v4();
    let created = repo.create(note(owner, "Signals"), None).await.unwrap();

    repo.delete(created.id, draft(owner, AuditAction::Delete))
        .await
        .unwrap();

    assert!(matches!(
        repo.get_by_id(created.id).await.unwrap_err(),
        EesaError::NotFound { .. }
    ));
    let history = audit.history_for_user(owner, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::Delete);

    let err = repo.delete(created.id, None).await.unwrap_err();
    assert!(matches!(err, EesaError::NotFound { .. }));
}

#[tokio::test]
async fn reject_deletes_pending_record() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let teacher = Uuid::new_v4();
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();

    repo.reject(created.id, draft(teacher, AuditAction::Reject))
        .await
        .unwrap();

    assert!(matches!(
        repo.get_by_id(created.id).await.unwrap_err(),
        EesaError::NotFound { .. }
    ));
    let history = audit.history_for_user(teacher, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::Reject);

    let err = repo.reject(created.id, None).await.unwrap_err();
    assert!(matches!(err, EesaError::NotFound { .. }));
}

#[tokio::test]
async fn reject_refuses_approved_record() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();
    repo.approve(created.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap();

    let err = repo.reject(created.id, None).await.unwrap_err();
    assert!(matches!(err, EesaError::AlreadyApproved { .. }));
    assert!(repo.get_by_id(created.id).await.unwrap().is_approved());
}

#[tokio::test]
async fn approve_and_reject_race_has_one_outcome() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let created = repo.create(note(Uuid::new_v4(), "Signals"), None).await.unwrap();

    let (approver, rejecter) = (Uuid::new_v4(), Uuid::new_v4());
    let (approved, rejected) = tokio::join!(
        repo.approve(created.id, approver, Utc::now(), draft(approver, AuditAction::Approve)),
        repo.reject(created.id, draft(rejecter, AuditAction::Reject)),
    );

    let history = audit
        .history_for_object(ObjectRef::new(ResourceType::Note, created.id), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    match (approved, rejected) {
        (Ok(record), Err(err)) => {
            assert!(matches!(err, EesaError::AlreadyApproved { .. }));
            assert!(record.is_approved());
            assert!(repo.get_by_id(created.id).await.unwrap().is_approved());
            assert_eq!(history[0].action, AuditAction::Approve);
        }
        (Err(err), Ok(())) => {
            assert!(matches!(err, EesaError::NotFound { .. }));
            assert!(matches!(
                repo.get_by_id(created.id).await.unwrap_err(),
                EesaError::NotFound { .. }
            ));
            assert_eq!(history[0].action, AuditAction::Reject);
        }
        other => panic!("expected exactly one winner, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_audit_write_rolls_back_mutation() {
    let db = setup().await;
    let repo = SurrealRecordRepository::<_, NotePayload>::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db.clone());
    let owner = Uuid::new_v4();
    let created = repo.create(note(owner, "Signals"), None).await.unwrap();

    // Make every audit insert violate the schema.
    db.query(
        "DEFINE FIELD OVERWRITE object_repr ON TABLE audit_log TYPE string \
         ASSERT string::len($value) < 3;",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let mut payload = created.payload.clone();
    payload.title = "Signals and Systems".into();
    let err = repo
        .update(created.id, payload, draft(owner, AuditAction::Update))
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Database(_)));

    let current = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(current.payload.title, "Signals");
    assert!(audit.history_for_user(owner, 10).await.unwrap().is_empty());

    let err = repo
        .approve(created.id, owner, Utc::now(), draft(owner, AuditAction::Approve))
        .await
        .unwrap_err();
    assert!(matches!(err, EesaError::Database(_)));
    assert!(repo.get_by_id(created.id).await.unwrap().is_pending());
}

#[tokio::test]
async fn pending_queue_is_oldest_first_and_filtered() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let first = repo.create(note(alice, "First"), None).await.unwrap();
    let second = repo.create(note(bob, "Second"), None).await.unwrap();
    let third = repo.create(note(alice, "Third"), None).await.unwrap();
    repo.approve(third.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap();

    let all = repo
        .list_pending(PendingFilter::default(), Pagination::default())
        .await
        .unwrap();
    let ids: Vec<Uuid> = all.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let only_bob = repo
        .list_pending(
            PendingFilter {
                owners: Some(vec![alice, bob]),
                exclude_owner: Some(alice),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(only_bob.total, 1);
    assert_eq!(only_bob.items[0].id, second.id);

    let nobody = repo
        .list_pending(
            PendingFilter {
                owners: Some(Vec::new()),
                exclude_owner: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert!(nobody.items.is_empty());
}

#[tokio::test]
async fn visible_listing_hides_others_pending() {
    let repo = SurrealRecordRepository::<_, NotePayload>::new(setup().await);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let mine = repo.create(note(alice, "Mine"), None).await.unwrap();
    let theirs = repo.create(note(bob, "Theirs"), None).await.unwrap();
    let public = repo.create(note(bob, "Public"), None).await.unwrap();
    repo.approve(public.id, Uuid::new_v4(), Utc::now(), None)
        .await
        .unwrap();

    let visible = repo.list_visible(alice, Pagination::default()).await.unwrap();
    let ids: Vec<Uuid> = visible.items.iter().map(|r| r.id).collect();
    assert!(ids.contains(&mine.id));
    assert!(ids.contains(&public.id));
    assert!(!ids.contains(&theirs.id));
}
