//! Database-specific error types and conversions.

use eesa_core::error::EesaError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement in the response failed, including an aborted
    /// transaction.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// A stored row could not be mapped back to its domain type.
    #[error("Invalid stored {entity}: {reason}")]
    Decode { entity: String, reason: String },
}

impl DbError {
    pub(crate) fn decode(entity: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for EesaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EesaError::NotFound { entity, id },
            other => EesaError::Database(other.to_string()),
        }
    }
}
