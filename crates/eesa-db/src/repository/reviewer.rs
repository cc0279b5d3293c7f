//! SurrealDB implementation of [`ReviewerRepository`].

use chrono::{DateTime, Utc};
use eesa_core::error::EesaResult;
use eesa_core::models::audit::{AuditAction, AuditDraft, diff_fields};
use eesa_core::models::reviewer::{CreateReviewerAssignment, ReviewerAssignment};
use eesa_core::models::student::Cohort;
use eesa_core::repository::{ReviewerAssignOutcome, ReviewerRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::parse_uuid;
use crate::audit_write::{audit_batch, audited, checked};
use crate::error::DbError;

const ENTITY: &str = "reviewer_assignment";

const ACTIVE_CHANGED: &str = "active reviewer changed";
const MAX_ASSIGN_ATTEMPTS: u32 = 3;

const COLUMNS: &str = "meta::id(id) AS record_id, student_id, scheme, year_of_joining, \
    assigned_by, assigned_at, is_active";

#[derive(Debug, SurrealValue)]
struct ReviewerRow {
    record_id: String,
    student_id: String,
    scheme: u16,
    year_of_joining: u16,
    assigned_by: String,
    assigned_at: DateTime<Utc>,
    is_active: bool,
}

impl ReviewerRow {
    fn try_into_assignment(self) -> Result<ReviewerAssignment, DbError> {
        Ok(ReviewerAssignment {
            id: parse_uuid(ENTITY, &self.record_id)?,
            student_id: parse_uuid(ENTITY, &self.student_id)?,
            cohort: Cohort::new(self.scheme, self.year_of_joining),
            assigned_by: parse_uuid(ENTITY, &self.assigned_by)?,
            assigned_at: self.assigned_at,
            is_active: self.is_active,
        })
    }
}

/// Our own staleness guard, or a storage-level write conflict.
fn is_retryable(err: &DbError) -> bool {
    let msg = err.to_string();
    msg.contains(ACTIVE_CHANGED) || msg.contains("can be retried")
}

fn into_assignments(rows: Vec<ReviewerRow>) -> Result<Vec<ReviewerAssignment>, DbError> {
    rows.into_iter()
        .map(ReviewerRow::try_into_assignment)
        .collect()
}

/// SurrealDB implementation of the reviewer assignment repository.
#[derive(Clone)]
pub struct SurrealReviewerRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReviewerRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn cohort_rows(&self, cohort: Cohort, active_only: bool) -> EesaResult<Vec<ReviewerAssignment>> {
        let active = if active_only { " AND is_active = true" } else { "" };
        let mut result = self
            .db
            .query(format!(
                "SELECT {COLUMNS} FROM reviewer_assignment \
                 WHERE scheme = $scheme AND year_of_joining = $year_of_joining{active} \
                 ORDER BY assigned_at DESC, record_id DESC"
            ))
            .bind(("scheme", cohort.scheme))
            .bind(("year_of_joining", cohort.year_of_joining))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReviewerRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_assignments(rows)?)
    }

    /// One attempt at displacing the cohort's active reviewers and
    /// inserting the new one. The transaction re-reads the active set and
    /// aborts if it no longer matches what the audit entries were built
    /// from; `None` means the caller should retry.
    async fn try_assign(
        &self,
        input: &CreateReviewerAssignment,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Option<(ReviewerAssignment, Vec<ReviewerAssignment>)>> {
        let displaced = self.cohort_rows(input.cohort, true).await?;
        let mut expected: Vec<String> = displaced.iter().map(|d| d.id.to_string()).collect();
        expected.sort();

        let assignment = ReviewerAssignment {
            id: Uuid::now_v7(),
            student_id: input.student_id,
            cohort: input.cohort,
            assigned_by: input.assigned_by,
            assigned_at: Utc::now(),
            is_active: true,
        };

        let mut entries = Vec::new();
        if let Some(draft) = audit {
            for previous in &displaced {
                let mut after = previous.clone();
                after.is_active = false;
                let changes = diff_fields(previous, &after)?;
                let deactivation = AuditDraft {
                    action: AuditAction::Deactivate,
                    ..draft.clone()
                };
                entries.push(deactivation.complete(&after, Some(changes)));
            }
            entries.push(draft.complete(&assignment, None));
        }

        let result = match self
            .db
            .query(audited(&format!(
                "LET $active = (SELECT VALUE meta::id(id) FROM reviewer_assignment \
                 WHERE scheme = $scheme AND year_of_joining = $year_of_joining \
                 AND is_active = true); \
                 IF array::sort($active) != $expected {{ THROW '{ACTIVE_CHANGED}'; }}; \
                 UPDATE reviewer_assignment SET is_active = false \
                 WHERE scheme = $scheme AND year_of_joining = $year_of_joining \
                 AND is_active = true; \
                 CREATE type::record('reviewer_assignment', $id) SET \
                 student_id = $student_id, scheme = $scheme, \
                 year_of_joining = $year_of_joining, assigned_by = $assigned_by, \
                 assigned_at = $assigned_at, is_active = true RETURN NONE;"
            )))
            .bind(("expected", expected))
            .bind(("id", assignment.id.to_string()))
            .bind(("student_id", assignment.student_id.to_string()))
            .bind(("scheme", assignment.cohort.scheme))
            .bind(("year_of_joining", assignment.cohort.year_of_joining))
            .bind(("assigned_by", assignment.assigned_by.to_string()))
            .bind(("assigned_at", assignment.assigned_at))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)
        {
            Ok(result) => checked(result),
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => Ok(Some((assignment, displaced))),
            Err(e) if is_retryable(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl<C: Connection> ReviewerRepository for SurrealReviewerRepository<C> {
    async fn assign(
        &self,
        input: CreateReviewerAssignment,
        audit: Option<AuditDraft>,
    ) -> EesaResult<ReviewerAssignOutcome> {
        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            let Some((assignment, displaced)) = self.try_assign(&input, audit.clone()).await?
            else {
                debug!(cohort = %input.cohort, attempt, "Active reviewer changed, retrying");
                continue;
            };

            info!(
                cohort = %assignment.cohort,
                student_id = %assignment.student_id,
                displaced = ?displaced.iter().map(|d| d.student_id).collect::<Vec<_>>(),
                "Reviewer assigned"
            );
            let assignment = self.get_by_id(assignment.id).await?;
            let displaced = match displaced.first() {
                Some(previous) => Some(self.get_by_id(previous.id).await?),
                None => None,
            };
            return Ok(ReviewerAssignOutcome {
                assignment,
                displaced,
            });
        }

        warn!(cohort = %input.cohort, "Reviewer assignment kept conflicting");
        Err(DbError::Query(format!("{ACTIVE_CHANGED} for cohort {}", input.cohort)).into())
    }

    async fn deactivate(
        &self,
        id: Uuid,
        audit: Option<AuditDraft>,
    ) -> EesaResult<ReviewerAssignment> {
        let before = self.get_by_id(id).await?;
        if !before.is_active {
            return Ok(before);
        }
        let mut after = before.clone();
        after.is_active = false;

        let entries = match audit {
            Some(draft) => vec![draft.complete(&after, Some(diff_fields(&before, &after)?))],
            None => Vec::new(),
        };

        let result = self
            .db
            .query(audited(
                "LET $updated = (UPDATE type::record('reviewer_assignment', $id) \
                 SET is_active = false RETURN AFTER); \
                 IF array::len($updated) = 0 { THROW 'reviewer assignment not found'; };",
            ))
            .bind(("id", id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> EesaResult<ReviewerAssignment> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {COLUMNS} FROM type::record('reviewer_assignment', $id)"
            ))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReviewerRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        Ok(row.try_into_assignment()?)
    }

    async fn active_for_cohort(&self, cohort: Cohort) -> EesaResult<Option<ReviewerAssignment>> {
        Ok(self.cohort_rows(cohort, true).await?.into_iter().next())
    }

    async fn list_active(&self) -> EesaResult<Vec<ReviewerAssignment>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {COLUMNS} FROM reviewer_assignment WHERE is_active = true \
                 ORDER BY scheme ASC, year_of_joining ASC"
            ))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReviewerRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_assignments(rows)?)
    }

    async fn history_for_cohort(&self, cohort: Cohort) -> EesaResult<Vec<ReviewerAssignment>> {
        self.cohort_rows(cohort, false).await
    }

    async fn active_cohorts_for(&self, student_id: Uuid) -> EesaResult<Vec<Cohort>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {COLUMNS} FROM reviewer_assignment \
                 WHERE student_id = $student_id AND is_active = true \
                 ORDER BY scheme ASC, year_of_joining ASC"
            ))
            .bind(("student_id", student_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReviewerRow> = result.take(0).map_err(DbError::from)?;
        let cohorts = into_assignments(rows)?
            .into_iter()
            .map(|a| a.cohort)
            .collect();
        Ok(cohorts)
    }
}
