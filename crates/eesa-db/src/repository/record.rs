//! SurrealDB implementation of [`RecordRepository`], generic over the
//! registry payload.
//!
//! Each payload type maps to its own table. The payload is stored as a
//! flexible object; ownership and approval live in shared columns so the
//! pending-queue index does not depend on payload shape.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::approval::ApprovalState;
use eesa_core::models::audit::{AuditDraft, diff_fields};
use eesa_core::models::record::{Record, RecordPayload};
use eesa_core::repository::{PaginatedResult, Pagination, PendingFilter, RecordRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::audit_write::{audit_batch, audited, checked};
use crate::error::DbError;

const ALREADY_APPROVED: &str = "record already approved";
const NOT_PENDING: &str = "record not pending";

#[derive(Debug, SurrealValue)]
struct RecordRow {
    record_id: String,
    owner_id: String,
    payload: serde_json::Value,
    is_approved: Option<bool>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn try_into_record<P: RecordPayload>(self) -> Result<Record<P>, DbError> {
        let entity = P::KIND.table();
        let approved_by = self
            .approved_by
            .as_deref()
            .map(|raw| parse_uuid(entity, raw))
            .transpose()?;

        let approval = match (P::APPROVABLE, self.is_approved) {
            (true, Some(flag)) => Some(
                ApprovalState::from_columns(flag, approved_by, self.approved_at).ok_or_else(
                    || DbError::decode(entity, "approved without approver or timestamp"),
                )?,
            ),
            (false, None) => None,
            (true, None) => return Err(DbError::decode(entity, "missing approval column")),
            (false, Some(_)) => {
                return Err(DbError::decode(entity, "approval column on non-approvable type"));
            }
        };

        let payload: P = serde_json::from_value(self.payload)
            .map_err(|e| DbError::decode(entity, format!("payload: {e}")))?;

        Ok(Record {
            id: parse_uuid(entity, &self.record_id)?,
            owner_id: parse_uuid(entity, &self.owner_id)?,
            approval,
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn payload_value<P: RecordPayload>(payload: &P) -> EesaResult<serde_json::Value> {
    serde_json::to_value(payload)
        .map_err(|e| EesaError::Internal(format!("failed to encode {} payload: {e}", P::KIND)))
}

/// SurrealDB implementation of the registry repository for payload `P`.
pub struct SurrealRecordRepository<C: Connection, P: RecordPayload> {
    db: Surreal<C>,
    _payload: PhantomData<fn() -> P>,
}

impl<C: Connection, P: RecordPayload> Clone for SurrealRecordRepository<C, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _payload: PhantomData,
        }
    }
}

impl<C: Connection, P: RecordPayload> SurrealRecordRepository<C, P> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            _payload: PhantomData,
        }
    }

    fn table() -> &'static str {
        P::KIND.table()
    }

    /// Count plus one page for a `WHERE` clause over this table.
    async fn page(
        &self,
        condition: &str,
        order: &str,
        binds: Vec<(&'static str, serde_json::Value)>,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        let mut query = self
            .db
            .query(format!(
                "SELECT count() AS total FROM type::table($table) {condition} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM type::table($table) {condition} \
                 ORDER BY {order} LIMIT $limit START $offset;"
            ))
            .bind(("table", Self::table().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (key, value) in binds {
            query = query.bind((key, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map_or(0, |r| r.total);
        let rows: Vec<RecordRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RecordRow::try_into_record::<P>)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl<C: Connection, P: RecordPayload> RecordRepository<P> for SurrealRecordRepository<C, P> {
    async fn create(&self, record: Record<P>, audit: Option<AuditDraft>) -> EesaResult<Record<P>> {
        record.check_shape()?;
        record.payload.validate()?;

        let entries: Vec<_> = audit.map(|d| d.complete(&record, None)).into_iter().collect();
        let approval_column = if P::APPROVABLE {
            ", is_approved = false"
        } else {
            ""
        };

        let result = self
            .db
            .query(audited(&format!(
                "CREATE type::record($table, $id) SET \
                 owner_id = $owner_id, payload = $payload{approval_column} \
                 RETURN NONE;"
            )))
            .bind(("table", Self::table().to_string()))
            .bind(("id", record.id.to_string()))
            .bind(("owner_id", record.owner_id.to_string()))
            .bind(("payload", payload_value(&record.payload)?))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(record.id).await
    }

    async fn get_by_id(&self, id: Uuid) -> EesaResult<Record<P>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record($table, $id)")
            .bind(("table", Self::table().to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RecordRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(Self::table(), id))?;
        Ok(row.try_into_record()?)
    }

    async fn update(
        &self,
        id: Uuid,
        payload: P,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Record<P>> {
        payload.validate()?;
        let before = self.get_by_id(id).await?;
        let mut after = before.clone();
        after.payload = payload;

        let entries = match audit {
            Some(draft) => vec![draft.complete(&after, Some(diff_fields(&before, &after)?))],
            None => Vec::new(),
        };

        let result = self
            .db
            .query(audited(
                "LET $updated = (UPDATE type::record($table, $id) SET \
                 payload = $payload, updated_at = time::now() RETURN AFTER); \
                 IF array::len($updated) = 0 { THROW 'record not found'; };",
            ))
            .bind(("table", Self::table().to_string()))
            .bind(("id", id.to_string()))
            .bind(("payload", payload_value(&after.payload)?))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid, audit: Option<AuditDraft>) -> EesaResult<()> {
        let record = self.get_by_id(id).await?;
        let entries: Vec<_> = audit.map(|d| d.complete(&record, None)).into_iter().collect();

        let result = self
            .db
            .query(audited(
                "LET $deleted = (DELETE type::record($table, $id) RETURN BEFORE); \
                 IF array::len($deleted) = 0 { THROW 'record not found'; };",
            ))
            .bind(("table", Self::table().to_string()))
            .bind(("id", id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;

        // A concurrent delete (or reject) may have won the race.
        if let Err(e) = checked(result) {
            return match self.get_by_id(id).await {
                Err(missing @ EesaError::NotFound { .. }) => Err(missing),
                _ => Err(e.into()),
            };
        }
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> EesaResult<PaginatedResult<Record<P>>> {
        self.page("", "created_at DESC", Vec::new(), pagination).await
    }

    async fn list_visible(
        &self,
        viewer: Uuid,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        self.page(
            "WHERE owner_id = $viewer OR \
             (is_approved != false AND payload.is_public != false)",
            "created_at DESC",
            vec![("viewer", viewer.to_string().into())],
            pagination,
        )
        .await
    }

    async fn approve(
        &self,
        id: Uuid,
        approver: Uuid,
        at: DateTime<Utc>,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Record<P>> {
        if !P::APPROVABLE {
            return Err(EesaError::Validation {
                field: None,
                message: format!("{} records do not go through approval", P::KIND),
            });
        }

        let before = self.get_by_id(id).await?;
        if before.is_approved() {
            return Err(EesaError::AlreadyApproved {
                entity: Self::table().into(),
                id: id.to_string(),
            });
        }

        let mut after = before.clone();
        after.approval = Some(ApprovalState::Approved {
            approved_by: approver,
            approved_at: at,
        });
        let entries = match audit {
            Some(draft) => vec![draft.complete(&after, Some(diff_fields(&before, &after)?))],
            None => {
                debug!(table = Self::table(), %id, "Unaudited approval");
                Vec::new()
            }
        };

        // The guard re-checks the flag inside the transaction, so only one
        // of several concurrent approvers can flip it.
        let result = self
            .db
            .query(audited(&format!(
                "LET $updated = (UPDATE type::record($table, $id) SET \
                 is_approved = true, approved_by = $approver, approved_at = $at, \
                 updated_at = time::now() WHERE is_approved = false RETURN AFTER); \
                 IF array::len($updated) = 0 {{ THROW '{ALREADY_APPROVED}'; }};"
            )))
            .bind(("table", Self::table().to_string()))
            .bind(("id", id.to_string()))
            .bind(("approver", approver.to_string()))
            .bind(("at", at))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = checked(result) {
            let current = self.get_by_id(id).await?;
            if current.is_approved() {
                warn!(table = Self::table(), %id, "Lost approval race");
                return Err(EesaError::AlreadyApproved {
                    entity: Self::table().into(),
                    id: id.to_string(),
                });
            }
            return Err(e.into());
        }

        self.get_by_id(id).await
    }

    async fn reject(&self, id: Uuid, audit: Option<AuditDraft>) -> EesaResult<()> {
        if !P::APPROVABLE {
            return Err(EesaError::Validation {
                field: None,
                message: format!("{} records do not go through approval", P::KIND),
            });
        }

        let record = self.get_by_id(id).await?;
        if record.is_approved() {
            return Err(EesaError::AlreadyApproved {
                entity: Self::table().into(),
                id: id.to_string(),
            });
        }
        let entries: Vec<_> = audit.map(|d| d.complete(&record, None)).into_iter().collect();

        let result = self
            .db
            .query(audited(&format!(
                "LET $deleted = (DELETE type::record($table, $id) \
                 WHERE is_approved = false RETURN BEFORE); \
                 IF array::len($deleted) = 0 {{ THROW '{NOT_PENDING}'; }};"
            )))
            .bind(("table", Self::table().to_string()))
            .bind(("id", id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = checked(result) {
            return match self.get_by_id(id).await {
                Ok(current) if current.is_approved() => {
                    warn!(table = Self::table(), %id, "Rejection lost to approval");
                    Err(EesaError::AlreadyApproved {
                        entity: Self::table().into(),
                        id: id.to_string(),
                    })
                }
                Err(missing @ EesaError::NotFound { .. }) => Err(missing),
                _ => Err(e.into()),
            };
        }
        Ok(())
    }

    async fn list_pending(
        &self,
        filter: PendingFilter,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<Record<P>>> {
        if !P::APPROVABLE {
            return Ok(PaginatedResult {
                items: Vec::new(),
                total: 0,
                offset: pagination.offset,
                limit: pagination.limit,
            });
        }

        let mut clauses = vec!["is_approved = false"];
        let mut binds: Vec<(&'static str, serde_json::Value)> = Vec::new();
        if let Some(owners) = filter.owners {
            // An empty owner set matches nothing rather than everything.
            clauses.push("owner_id IN $owners");
            let owners: Vec<String> = owners.iter().map(Uuid::to_string).collect();
            binds.push(("owners", owners.into()));
        }
        if let Some(excluded) = filter.exclude_owner {
            clauses.push("owner_id != $exclude_owner");
            binds.push(("exclude_owner", excluded.to_string().into()));
        }
        let condition = format!("WHERE {}", clauses.join(" AND "));

        self.page(&condition, "created_at ASC", binds, pagination).await
    }
}
