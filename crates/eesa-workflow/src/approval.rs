//! Approval workflow for approvable registry records.
//!
//! Approval is `Pending -> Approved`, once. Who may approve is decided by
//! an [`ApprovalPolicy`]: staff-only for most types, staff or a same-cohort
//! peer reviewer for notes. Rejection deletes the pending record and
//! leaves a `reject` entry in the audit log.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use chrono::Utc;
use eesa_core::authz::{can, require};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditAction, AuditDraft, RequestContext};
use eesa_core::models::permission::{Action, ResourceType};
use eesa_core::models::principal::Actor;
use eesa_core::models::record::{Record, RecordPayload};
use eesa_core::models::student::Cohort;
use eesa_core::repository::{
    PaginatedResult, Pagination, PendingFilter, RecordRepository, ReviewerRepository,
    StudentRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::WorkflowError;

/// The set of pending records an actor may act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalScope {
    /// Any pending record of the type.
    Unrestricted,
    /// Records owned by students of these cohorts, never the actor's own.
    Cohorts(BTreeSet<Cohort>),
    None,
}

/// Decides approval eligibility for one resource type.
pub trait ApprovalPolicy: Send + Sync {
    fn scope(
        &self,
        actor: &Actor,
        kind: ResourceType,
    ) -> impl Future<Output = EesaResult<ApprovalScope>> + Send;

    /// Whether `actor` may approve or reject a record owned by `owner_id`.
    fn permits(
        &self,
        actor: &Actor,
        kind: ResourceType,
        owner_id: Uuid,
    ) -> impl Future<Output = EesaResult<bool>> + Send;
}

/// Eligibility through the type-level `change` permission only.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaffApprovalPolicy;

impl ApprovalPolicy for StaffApprovalPolicy {
    async fn scope(&self, actor: &Actor, kind: ResourceType) -> EesaResult<ApprovalScope> {
        Ok(if can(actor, Action::Change, kind, None) {
            ApprovalScope::Unrestricted
        } else {
            ApprovalScope::None
        })
    }

    async fn permits(&self, actor: &Actor, kind: ResourceType, _owner_id: Uuid) -> EesaResult<bool> {
        Ok(can(actor, Action::Change, kind, None))
    }
}

/// Staff eligibility plus the peer-review carve-out: a student holding an
/// active reviewer assignment may approve records of students in that
/// cohort, excluding their own.
pub struct PeerReviewPolicy<S: StudentRepository, V: ReviewerRepository> {
    students: S,
    reviewers: V,
}

impl<S: StudentRepository, V: ReviewerRepository> PeerReviewPolicy<S, V> {
    pub fn new(students: S, reviewers: V) -> Self {
        Self {
            students,
            reviewers,
        }
    }
}

impl<S: StudentRepository, V: ReviewerRepository> ApprovalPolicy for PeerReviewPolicy<S, V> {
    async fn scope(&self, actor: &Actor, kind: ResourceType) -> EesaResult<ApprovalScope> {
        let Some(principal) = actor.principal().filter(|p| p.user.is_active) else {
            return Ok(ApprovalScope::None);
        };
        if principal.role().approves_notes() || can(actor, Action::Change, kind, None) {
            return Ok(ApprovalScope::Unrestricted);
        }

        let cohorts: BTreeSet<Cohort> = self
            .reviewers
            .active_cohorts_for(principal.id())
            .await?
            .into_iter()
            .collect();
        Ok(if cohorts.is_empty() {
            ApprovalScope::None
        } else {
            ApprovalScope::Cohorts(cohorts)
        })
    }

    async fn permits(&self, actor: &Actor, kind: ResourceType, owner_id: Uuid) -> EesaResult<bool> {
        match self.scope(actor, kind).await? {
            ApprovalScope::Unrestricted => Ok(true),
            ApprovalScope::None => Ok(false),
            ApprovalScope::Cohorts(cohorts) => {
                if actor.user_id() == Some(owner_id) {
                    return Ok(false);
                }
                match self.students.get(owner_id).await {
                    Ok(owner) => Ok(cohorts.contains(&owner.cohort())),
                    Err(EesaError::NotFound { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

pub struct ApprovalService<P, R, Q, S>
where
    P: RecordPayload,
    R: RecordRepository<P>,
    Q: ApprovalPolicy,
    S: StudentRepository,
{
    records: R,
    policy: Q,
    students: S,
    _payload: PhantomData<fn() -> P>,
}

impl<P, R, Q, S> ApprovalService<P, R, Q, S>
where
    P: RecordPayload,
    R: RecordRepository<P>,
    Q: ApprovalPolicy,
    S: StudentRepository,
{
    /// `students` resolves cohort membership when listing a peer
    /// reviewer's queue.
    pub fn new(records: R, policy: Q, students: S) -> Self {
        Self {
            records,
            policy,
            students,
            _payload: PhantomData,
        }
    }

    async fn ensure_eligible(&self, actor: &Actor, record: &Record<P>) -> EesaResult<()> {
        if !actor.is_authenticated() {
            return Err(EesaError::forbidden("authentication required"));
        }
        if !self.policy.permits(actor, P::KIND, record.owner_id).await? {
            warn!(
                kind = %P::KIND,
                id = %record.id,
                actor = ?actor.user_id(),
                "Approval eligibility denied"
            );
            return Err(WorkflowError::NotEligible {
                reason: format!("not an eligible approver for this {}", P::KIND),
            }
            .into());
        }
        Ok(())
    }

    /// Approve a pending record. Checks run in order: existence, current
    /// state, eligibility. The write is conditional on the record still
    /// being pending, so a lost race also reports `AlreadyApproved`.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Record<P>> {
        let record = self.records.get_by_id(id).await?;
        if record.is_approved() {
            return Err(EesaError::AlreadyApproved {
                entity: P::KIND.table().into(),
                id: id.to_string(),
            });
        }
        self.ensure_eligible(actor, &record).await?;

        let approver = actor
            .user_id()
            .ok_or_else(|| EesaError::forbidden("authentication required"))?;
        let approved = self
            .records
            .approve(
                id,
                approver,
                Utc::now(),
                AuditDraft::for_actor(actor, AuditAction::Approve, ctx),
            )
            .await?;
        info!(kind = %P::KIND, %id, %approver, "Record approved");
        Ok(approved)
    }

    /// Reject a pending record by deleting it. Approved records cannot be
    /// rejected; the delete is conditional on the record still being
    /// pending.
    pub async fn reject(&self, actor: &Actor, id: Uuid, ctx: Option<&RequestContext>) -> EesaResult<()> {
        let record = self.records.get_by_id(id).await?;
        if record.is_approved() {
            return Err(EesaError::AlreadyApproved {
                entity: P::KIND.table().into(),
                id: id.to_string(),
            });
        }
        self.ensure_eligible(actor, &record).await?;

        self.records
            .reject(id, AuditDraft::for_actor(actor, AuditAction::Reject, ctx))
            .await?;
        info!(kind = %P::KIND, %id, actor = ?actor.user_id(), "Record rejected");
        Ok(())
    }

    /// Pending records `actor` may approve, oldest first.
    pub async fn pending_for(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        let filter = match self.policy.scope(actor, P::KIND).await? {
            ApprovalScope::Unrestricted => PendingFilter::default(),
            ApprovalScope::None => {
                return Ok(PaginatedResult {
                    items: Vec::new(),
                    total: 0,
                    offset: pagination.offset,
                    limit: pagination.limit,
                });
            }
            ApprovalScope::Cohorts(cohorts) => {
                let mut owners = Vec::new();
                for cohort in cohorts {
                    owners.extend(self.students.list_user_ids_by_cohort(cohort).await?);
                }
                PendingFilter {
                    owners: Some(owners),
                    exclude_owner: actor.user_id(),
                }
            }
        };
        self.records.list_pending(filter, pagination).await
    }

    /// Type-level view of the whole pending queue, for moderators.
    pub async fn all_pending(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        require(actor, Action::View, P::KIND, None)?;
        self.records
            .list_pending(PendingFilter::default(), pagination)
            .await
    }
}
