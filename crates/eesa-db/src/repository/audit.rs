//! SurrealDB implementation of [`AuditLogRepository`].

use chrono::{DateTime, Utc};
use eesa_core::error::EesaResult;
use eesa_core::models::audit::{
    AuditAction, AuditLogEntry, CreateAuditLogEntry, FieldChanges, ObjectRef,
};
use eesa_core::models::permission::ResourceType;
use eesa_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::audit_write::{audit_content, checked};
use crate::error::DbError;

const ENTITY: &str = "audit_log";

const COLUMNS: &str = "meta::id(id) AS record_id, actor_id, action, target_type, \
    target_id, object_repr, changes, ip_address, user_agent, timestamp";

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    actor_id: String,
    action: String,
    target_type: String,
    target_id: String,
    object_repr: String,
    changes: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|e| DbError::decode(ENTITY, e))?;
        let kind = ResourceType::from_table(&self.target_type).ok_or_else(|| {
            DbError::decode(ENTITY, format!("unknown target type: {}", self.target_type))
        })?;
        let changes = self
            .changes
            .map(serde_json::from_value::<FieldChanges>)
            .transpose()
            .map_err(|e| DbError::decode(ENTITY, e))?;

        Ok(AuditLogEntry {
            id: parse_uuid(ENTITY, &self.record_id)?,
            actor_id: parse_uuid(ENTITY, &self.actor_id)?,
            action,
            target: ObjectRef::new(kind, parse_uuid(ENTITY, &self.target_id)?),
            object_repr: self.object_repr,
            changes,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: self.timestamp,
        })
    }
}

fn rows_into_entries(rows: Vec<AuditRow>) -> Result<Vec<AuditLogEntry>, DbError> {
    rows.into_iter().map(AuditRow::try_into_entry).collect()
}

/// Build the `WHERE` clause for a filter; bound names match the filter
/// fields.
fn filter_clause(filter: &AuditLogFilter) -> String {
    let mut conds = Vec::new();
    if filter.actor_id.is_some() {
        conds.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conds.push("action = $action");
    }
    if filter.target.is_some() {
        conds.push("target_type = $target_type AND target_id = $target_id");
    }
    if filter.from.is_some() {
        conds.push("timestamp >= $from");
    }
    if filter.to.is_some() {
        conds.push("timestamp < $to");
    }
    if conds.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conds.join(" AND "))
    }
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn query_entries(
        &self,
        query: &str,
        binds: Vec<(&'static str, String)>,
        limit: u64,
    ) -> Result<Vec<AuditLogEntry>, DbError> {
        let mut builder = self.db.query(query).bind(("limit", limit));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await?;
        let rows: Vec<AuditRow> = result.take(0)?;
        rows_into_entries(rows)
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> EesaResult<AuditLogEntry> {
        let id = Uuid::now_v7();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('audit_log', $id) CONTENT $content RETURN NONE; \
                 SELECT {COLUMNS} FROM type::record('audit_log', $id);"
            ))
            .bind(("id", id.to_string()))
            .bind(("content", audit_content(input)))
            .await
            .map_err(DbError::from)?;
        let mut result = checked(result)?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<AuditLogEntry>> {
        let clause = filter_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM audit_log {clause} GROUP ALL; \
             SELECT {COLUMNS} FROM audit_log {clause} \
             ORDER BY timestamp DESC, record_id DESC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action.as_str().to_string()));
        }
        if let Some(target) = filter.target {
            builder = builder
                .bind(("target_type", target.kind.table().to_string()))
                .bind(("target_id", target.id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map_or(0, |r| r.total);
        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_entries(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn history_for_object(
        &self,
        target: ObjectRef,
        limit: u64,
    ) -> EesaResult<Vec<AuditLogEntry>> {
        let entries = self
            .query_entries(
                &format!(
                    "SELECT {COLUMNS} FROM audit_log \
                     WHERE target_type = $target_type AND target_id = $target_id \
                     ORDER BY timestamp DESC, record_id DESC LIMIT $limit"
                ),
                vec![
                    ("target_type", target.kind.table().to_string()),
                    ("target_id", target.id.to_string()),
                ],
                limit,
            )
            .await?;
        Ok(entries)
    }

    async fn history_for_user(&self, user_id: Uuid, limit: u64) -> EesaResult<Vec<AuditLogEntry>> {
        let entries = self
            .query_entries(
                &format!(
                    "SELECT {COLUMNS} FROM audit_log WHERE actor_id = $actor_id \
                     ORDER BY timestamp DESC, record_id DESC LIMIT $limit"
                ),
                vec![("actor_id", user_id.to_string())],
                limit,
            )
            .await?;
        Ok(entries)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> EesaResult<u64> {
        let result = self
            .db
            .query(
                "SELECT count() AS total FROM audit_log \
                 WHERE timestamp < $cutoff GROUP ALL; \
                 DELETE audit_log WHERE timestamp < $cutoff RETURN NONE;",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let mut result = checked(result)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let removed = count_rows.first().map_or(0, |r| r.total);

        info!(%cutoff, removed, "Purged audit log entries");
        Ok(removed)
    }
}
