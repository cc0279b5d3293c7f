//! Workflow error types.

use eesa_core::error::EesaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// The actor passed the permission check but is not an eligible
    /// approver for this particular record.
    #[error("{reason}")]
    NotEligible { reason: String },

    #[error("reviewer belongs to cohort {actual}, not {expected}")]
    CohortMismatch { expected: String, actual: String },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<WorkflowError> for EesaError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidCredentials | WorkflowError::AccountInactive => {
                EesaError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            WorkflowError::WeakPassword { .. } => EesaError::validation("password", err.to_string()),
            WorkflowError::NotEligible { reason } => EesaError::Unauthorized { reason },
            WorkflowError::CohortMismatch { .. } => EesaError::validation("cohort", err.to_string()),
            WorkflowError::Crypto(msg) => EesaError::Internal(msg),
        }
    }
}
