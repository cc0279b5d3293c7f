//! Generic registry record: shared metadata around a typed payload.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::approval::ApprovalState;
use super::audit::{Auditable, ObjectRef};
use super::permission::ResourceType;
use crate::authz::{Owned, Ownership};
use crate::error::{EesaError, EesaResult};

/// Which attribution field a registry type stores its owner in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerField {
    CreatedBy,
    UploadedBy,
    User,
}

/// Type-specific content of a registry record.
pub trait RecordPayload:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: ResourceType;
    const OWNER_FIELD: OwnerField;
    /// Approvable payloads carry an [`ApprovalState`] and start pending.
    const APPROVABLE: bool;

    /// Short human-readable description, used for audit snapshots.
    fn describe(&self) -> String;

    /// Hidden from non-owners even when approved or not approvable.
    fn is_private(&self) -> bool {
        false
    }

    fn validate(&self) -> EesaResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "P: RecordPayload")]
pub struct Record<P: RecordPayload> {
    pub id: Uuid,
    /// Set at creation, never changed afterwards.
    pub owner_id: Uuid,
    /// `Some` exactly when `P::APPROVABLE`.
    pub approval: Option<ApprovalState>,
    pub payload: P,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<P: RecordPayload> Record<P> {
    pub fn new(owner_id: Uuid, payload: P) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            approval: P::APPROVABLE.then_some(ApprovalState::Pending),
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.approval, Some(ApprovalState::Pending))
    }

    pub fn is_approved(&self) -> bool {
        self.approval.is_some_and(|a| a.is_approved())
    }

    /// Check the approval column against the payload type.
    pub fn check_shape(&self) -> EesaResult<()> {
        if self.approval.is_some() != P::APPROVABLE {
            return Err(EesaError::Internal(format!(
                "{} record {} has inconsistent approval state",
                P::KIND,
                self.id
            )));
        }
        Ok(())
    }
}

impl<P: RecordPayload> Owned for Record<P> {
    fn ownership(&self) -> Ownership {
        let owner = Some(self.owner_id);
        match P::OWNER_FIELD {
            OwnerField::CreatedBy => Ownership {
                created_by: owner,
                ..Ownership::default()
            },
            OwnerField::UploadedBy => Ownership {
                uploaded_by: owner,
                ..Ownership::default()
            },
            OwnerField::User => Ownership {
                user: owner,
                ..Ownership::default()
            },
        }
    }

    fn is_private(&self) -> bool {
        self.is_pending() || self.payload.is_private()
    }
}

impl<P: RecordPayload> Auditable for Record<P> {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(P::KIND, self.id)
    }

    fn object_repr(&self) -> String {
        self.payload.describe()
    }
}

/// Shared title check used by most payloads.
pub(crate) fn require_title(title: &str, max_len: usize) -> EesaResult<()> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(EesaError::validation("title", "must not be empty"));
    }
    if len > max_len {
        return Err(EesaError::validation(
            "title",
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(())
}
