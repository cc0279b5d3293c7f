//! Audit service: standalone events, history queries and the
//! superuser-gated purge.
//!
//! Mutations are audited by the repositories themselves, inside the
//! mutation's transaction. This service covers events with no state
//! change of their own (downloads, verification views) and the read side.

use chrono::{DateTime, Utc};
use eesa_core::authz::{can, require};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{
    AuditAction, AuditDraft, AuditLogEntry, Auditable, FieldChanges, ObjectRef, RequestContext,
};
use eesa_core::models::permission::{Action, ResourceType};
use eesa_core::models::principal::Actor;
use eesa_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;

pub struct AuditService<A: AuditLogRepository> {
    repo: A,
    config: WorkflowConfig,
}

impl<A: AuditLogRepository> AuditService<A> {
    pub fn new(repo: A, config: WorkflowConfig) -> Self {
        Self { repo, config }
    }

    /// Record a standalone event. Anonymous actors are not audited and
    /// yield `None`.
    pub async fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        target: &impl Auditable,
        changes: Option<FieldChanges>,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Option<AuditLogEntry>> {
        let Some(draft) = AuditDraft::for_actor(actor, action, ctx) else {
            debug!(%action, target = %target.object_ref(), "Skipping audit for anonymous actor");
            return Ok(None);
        };
        let entry = self.repo.append(draft.complete(target, changes)).await?;
        Ok(Some(entry))
    }

    /// Newest first. `limit` defaults to the configured object history
    /// size. Requires `view_auditlog`.
    pub async fn history_for_object(
        &self,
        actor: &Actor,
        target: ObjectRef,
        limit: Option<u64>,
    ) -> EesaResult<Vec<AuditLogEntry>> {
        require(actor, Action::View, ResourceType::AuditLog, None)?;
        let limit = limit.unwrap_or(self.config.object_history_limit);
        self.repo.history_for_object(target, limit).await
    }

    /// Entries where `user_id` was the actor, newest first. Users may
    /// read their own activity; anyone else needs `view_auditlog`.
    pub async fn history_for_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        limit: Option<u64>,
    ) -> EesaResult<Vec<AuditLogEntry>> {
        let own = actor
            .principal()
            .is_some_and(|p| p.user.is_active && p.id() == user_id);
        if !own && !can(actor, Action::View, ResourceType::AuditLog, None) {
            warn!(actor = ?actor.user_id(), %user_id, "Audit history denied");
            return Err(EesaError::forbidden(
                "viewing another user's activity requires view_auditlog",
            ));
        }
        let limit = limit.unwrap_or(self.config.user_history_limit);
        self.repo.history_for_user(user_id, limit).await
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<AuditLogEntry>> {
        require(actor, Action::View, ResourceType::AuditLog, None)?;
        self.repo.list(filter, pagination).await
    }

    /// Remove entries older than `cutoff`. Superusers only.
    pub async fn purge_before(&self, actor: &Actor, cutoff: DateTime<Utc>) -> EesaResult<u64> {
        let allowed = actor
            .principal()
            .is_some_and(|p| p.user.is_active && p.is_superuser());
        if !allowed {
            warn!(actor = ?actor.user_id(), "Audit purge denied");
            return Err(EesaError::forbidden("only superusers may purge the audit log"));
        }

        let removed = self.repo.purge_before(cutoff).await?;
        info!(actor = ?actor.user_id(), %cutoff, removed, "Audit log purged");
        Ok(removed)
    }
}
