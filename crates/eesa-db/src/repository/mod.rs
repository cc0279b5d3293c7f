//! SurrealDB repository implementations.

mod audit;
mod group;
mod record;
mod reviewer;
mod student;
mod user;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

pub use audit::SurrealAuditLogRepository;
pub use group::SurrealGroupRepository;
pub use record::SurrealRecordRepository;
pub use reviewer::SurrealReviewerRepository;
pub use student::SurrealStudentRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Row struct for `SELECT meta::id(id) AS record_id` projections.
#[derive(Debug, SurrealValue)]
pub(crate) struct IdRow {
    pub(crate) record_id: String,
}

pub(crate) fn parse_uuid(entity: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::decode(entity, format!("invalid UUID {raw}: {e}")))
}
