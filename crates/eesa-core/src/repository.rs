//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Mutations on audited entities take
//! an optional [`AuditDraft`]; implementations complete it with the target
//! (and the field diff for updates) and persist the entry in the same
//! transaction as the mutation, so either both land or neither does.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EesaResult;
use crate::models::{
    audit::{AuditAction, AuditDraft, AuditLogEntry, CreateAuditLogEntry, ObjectRef},
    group::{CreateGroup, Group, UpdateGroup},
    record::{Record, RecordPayload},
    reviewer::{CreateReviewerAssignment, ReviewerAssignment},
    student::{Cohort, CreateStudent, Student, UpdateStudent},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Self-service registration; never audited.
    fn create(&self, input: CreateUser) -> impl Future<Output = EesaResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = EesaResult<User>> + Send;
    fn get_by_username(&self, username: &str) -> impl Future<Output = EesaResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = EesaResult<User>> + Send;
    /// Users are never hard-deleted; deactivate through `is_active`.
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<User>>> + Send;
}

pub trait GroupRepository: Send + Sync {
    fn create(
        &self,
        input: CreateGroup,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = EesaResult<Group>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = EesaResult<Group>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Group>> + Send;
    /// Removes the group and every membership edge pointing at it.
    fn delete(
        &self,
        id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<Group>>> + Send;

    /// Add a user to a group (creates a `member_of` edge). Audited against
    /// the user, with the group list as the changed field.
    fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<()>> + Send;

    fn remove_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<()>> + Send;

    fn get_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<User>>> + Send;

    fn get_user_groups(&self, user_id: Uuid) -> impl Future<Output = EesaResult<Vec<Group>>> + Send;
}

// ---------------------------------------------------------------------------
// Students & reviewers
// ---------------------------------------------------------------------------

pub trait StudentRepository: Send + Sync {
    fn create(
        &self,
        input: CreateStudent,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Student>> + Send;
    fn get(&self, user_id: Uuid) -> impl Future<Output = EesaResult<Student>> + Send;
    fn update(
        &self,
        user_id: Uuid,
        input: UpdateStudent,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Student>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<Student>>> + Send;
    /// User ids of every student in `cohort`, served by the cohort index.
    fn list_user_ids_by_cohort(
        &self,
        cohort: Cohort,
    ) -> impl Future<Output = EesaResult<Vec<Uuid>>> + Send;
}

/// Result of assigning a reviewer: the new assignment and the one it
/// displaced, if the cohort already had an active reviewer.
#[derive(Debug, Clone)]
pub struct ReviewerAssignOutcome {
    pub assignment: ReviewerAssignment,
    pub displaced: Option<ReviewerAssignment>,
}

pub trait ReviewerRepository: Send + Sync {
    /// Deactivate the cohort's current reviewer and insert the new one in
    /// a single transaction. The draft's action is used for the new
    /// assignment; the displaced one is audited as `deactivate`.
    fn assign(
        &self,
        input: CreateReviewerAssignment,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<ReviewerAssignOutcome>> + Send;
    fn deactivate(
        &self,
        id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<ReviewerAssignment>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = EesaResult<ReviewerAssignment>> + Send;
    fn active_for_cohort(
        &self,
        cohort: Cohort,
    ) -> impl Future<Output = EesaResult<Option<ReviewerAssignment>>> + Send;
    fn list_active(&self) -> impl Future<Output = EesaResult<Vec<ReviewerAssignment>>> + Send;
    /// Every assignment ever made for `cohort`, newest first.
    fn history_for_cohort(
        &self,
        cohort: Cohort,
    ) -> impl Future<Output = EesaResult<Vec<ReviewerAssignment>>> + Send;
    /// Cohorts `student_id` currently reviews.
    fn active_cohorts_for(
        &self,
        student_id: Uuid,
    ) -> impl Future<Output = EesaResult<Vec<Cohort>>> + Send;
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// Which pending records a listing should cover.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    /// Restrict to records owned by these users. `None` means everyone.
    pub owners: Option<Vec<Uuid>>,
    pub exclude_owner: Option<Uuid>,
}

pub trait RecordRepository<P: RecordPayload>: Send + Sync {
    fn create(
        &self,
        record: Record<P>,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Record<P>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = EesaResult<Record<P>>> + Send;
    /// Replace the payload. Owner and approval state are untouched.
    fn update(
        &self,
        id: Uuid,
        payload: P,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Record<P>>> + Send;
    /// Hard delete. The audit draft's action is recorded as given.
    fn delete(
        &self,
        id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<Record<P>>>> + Send;
    /// Records readable without a type-level grant: the non-private ones
    /// plus everything owned by `viewer`.
    fn list_visible(
        &self,
        viewer: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<Record<P>>>> + Send;

    /// Atomic `Pending -> Approved`. Fails with `AlreadyApproved` if the
    /// record was approved first, including by a concurrent caller.
    fn approve(
        &self,
        id: Uuid,
        approver: Uuid,
        at: DateTime<Utc>,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<Record<P>>> + Send;

    /// Delete a record only while it is still pending. Fails with
    /// `AlreadyApproved` if it was approved first, including by a
    /// concurrent caller.
    fn reject(
        &self,
        id: Uuid,
        audit: Option<AuditDraft>,
    ) -> impl Future<Output = EesaResult<()>> + Send;

    /// Pending records, oldest first.
    fn list_pending(
        &self,
        filter: PendingFilter,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<Record<P>>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub target: Option<ObjectRef>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a standalone entry. No update operation exists.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = EesaResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = EesaResult<PaginatedResult<AuditLogEntry>>> + Send;
    /// Newest first.
    fn history_for_object(
        &self,
        target: ObjectRef,
        limit: u64,
    ) -> impl Future<Output = EesaResult<Vec<AuditLogEntry>>> + Send;
    /// Entries where `user_id` is the actor, newest first.
    fn history_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = EesaResult<Vec<AuditLogEntry>>> + Send;
    /// Remove entries older than `cutoff`; returns how many were removed.
    /// Callers gate this on superuser status.
    fn purge_before(&self, cutoff: DateTime<Utc>) -> impl Future<Output = EesaResult<u64>> + Send;
}
