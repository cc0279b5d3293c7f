//! Permission-checked, audited CRUD over a registry type.

use std::marker::PhantomData;

use eesa_core::authz::{can, require};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditAction, AuditDraft, RequestContext};
use eesa_core::models::permission::Action;
use eesa_core::models::principal::Actor;
use eesa_core::models::record::{Record, RecordPayload};
use eesa_core::repository::{PaginatedResult, Pagination, RecordRepository};
use tracing::info;
use uuid::Uuid;

pub struct RegistryService<P: RecordPayload, R: RecordRepository<P>> {
    repo: R,
    _payload: PhantomData<fn() -> P>,
}

impl<P: RecordPayload, R: RecordRepository<P>> RegistryService<P, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _payload: PhantomData,
        }
    }

    /// Create a record owned by the actor. Approvable types start pending,
    /// so any active user may submit them; other types need the
    /// type-level `add` grant.
    pub async fn create(
        &self,
        actor: &Actor,
        payload: P,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Record<P>> {
        let owner_id = actor
            .principal()
            .filter(|p| p.user.is_active)
            .map(|p| p.id())
            .ok_or_else(|| EesaError::forbidden("authentication required"))?;
        if !P::APPROVABLE {
            require(actor, Action::Add, P::KIND, None)?;
        }
        payload.validate()?;

        let record = self
            .repo
            .create(
                Record::new(owner_id, payload),
                AuditDraft::for_actor(actor, AuditAction::Create, ctx),
            )
            .await?;
        info!(kind = %P::KIND, id = %record.id, %owner_id, "Record created");
        Ok(record)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> EesaResult<Record<P>> {
        let record = self.repo.get_by_id(id).await?;
        require(actor, Action::View, P::KIND, Some(&record))?;
        Ok(record)
    }

    /// Everything for holders of the type-level view grant; otherwise the
    /// non-private records plus the actor's own.
    pub async fn list(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        if can(actor, Action::View, P::KIND, None) {
            return self.repo.list(pagination).await;
        }
        let viewer = actor
            .principal()
            .filter(|p| p.user.is_active)
            .map(|p| p.id())
            .ok_or_else(|| EesaError::forbidden("authentication required"))?;
        self.repo.list_visible(viewer, pagination).await
    }

    /// Replace the payload. Owner and approval state are untouched.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: P,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Record<P>> {
        let current = self.repo.get_by_id(id).await?;
        require(actor, Action::Change, P::KIND, Some(&current))?;

        let record = self
            .repo
            .update(id, payload, AuditDraft::for_actor(actor, AuditAction::Update, ctx))
            .await?;
        info!(kind = %P::KIND, %id, "Record updated");
        Ok(record)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid, ctx: Option<&RequestContext>) -> EesaResult<()> {
        let current = self.repo.get_by_id(id).await?;
        require(actor, Action::Delete, P::KIND, Some(&current))?;

        self.repo
            .delete(id, AuditDraft::for_actor(actor, AuditAction::Delete, ctx))
            .await?;
        info!(kind = %P::KIND, %id, "Record deleted");
        Ok(())
    }
}
