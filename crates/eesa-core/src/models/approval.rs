//! Approval state carried by approvable records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `Pending -> Approved`, at most once through the normal workflow.
///
/// Approver and timestamp exist only in the `Approved` variant, so the
/// "both set or both absent" rule holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Pending,
    Approved {
        approved_by: Uuid,
        approved_at: DateTime<Utc>,
    },
}

impl ApprovalState {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalState::Approved { .. })
    }

    pub fn approved_by(&self) -> Option<Uuid> {
        match self {
            ApprovalState::Pending => None,
            ApprovalState::Approved { approved_by, .. } => Some(*approved_by),
        }
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ApprovalState::Pending => None,
            ApprovalState::Approved { approved_at, .. } => Some(*approved_at),
        }
    }

    /// Rebuild from the three stored columns. Returns `None` when the
    /// columns disagree.
    pub fn from_columns(
        is_approved: bool,
        approved_by: Option<Uuid>,
        approved_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (is_approved, approved_by, approved_at) {
            (false, None, None) => Some(ApprovalState::Pending),
            (true, Some(approved_by), Some(approved_at)) => Some(ApprovalState::Approved {
                approved_by,
                approved_at,
            }),
            _ => None,
        }
    }
}
