//! Error types for the EESA governance core.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EesaError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// A permission check denied the operation.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// The actor is not eligible to approve or reject the target.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Already approved: {entity} with id {id}")]
    AlreadyApproved { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EesaResult<T> = Result<T, EesaError>;

/// Coarse classification handed back to callers alongside the message.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AuthenticationFailed,
    Forbidden,
    Unauthorized,
    AlreadyApproved,
    Validation,
    Database,
    Internal,
}

/// Structured error payload: a kind plus a human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl EesaError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::AlreadyApproved { .. } => ErrorKind::AlreadyApproved,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Database(_) => ErrorKind::Database,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let field = match self {
            Self::Validation { field, .. } => field.clone(),
            _ => None,
        };
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_carries_field() {
        let err = EesaError::validation("ongoing_semester", "must be between 1 and 8");
        let body = err.body();
        assert_eq!(body.kind, ErrorKind::Validation);
        assert_eq!(body.field.as_deref(), Some("ongoing_semester"));
        assert!(body.message.contains("between 1 and 8"));
    }

    #[test]
    fn body_serializes_snake_case_kind() {
        let err = EesaError::AlreadyApproved {
            entity: "note".into(),
            id: "42".into(),
        };
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(json["kind"], "already_approved");
        assert!(json.get("field").is_none());
    }
}
