//! SurrealDB implementation of [`StudentRepository`].
//!
//! A student row shares its record id with the owning user.

use chrono::{DateTime, Utc};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditDraft, CreateAuditLogEntry, diff_fields};
use eesa_core::models::student::{Cohort, CreateStudent, Student, UpdateStudent};
use eesa_core::repository::{PaginatedResult, Pagination, StudentRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, IdRow, parse_uuid};
use crate::audit_write::{audit_batch, audited, checked};
use crate::error::DbError;

const ENTITY: &str = "student";

#[derive(Debug, SurrealValue)]
struct StudentRow {
    record_id: String,
    full_name: String,
    scheme: u16,
    year_of_joining: u16,
    expected_year_of_passout: u16,
    ongoing_semester: u8,
    year_of_study: u8,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StudentRow {
    fn try_into_student(self) -> Result<Student, DbError> {
        Ok(Student {
            user_id: parse_uuid(ENTITY, &self.record_id)?,
            full_name: self.full_name,
            scheme: self.scheme,
            year_of_joining: self.year_of_joining,
            expected_year_of_passout: self.expected_year_of_passout,
            ongoing_semester: self.ongoing_semester,
            year_of_study: self.year_of_study,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const WRITE_FIELDS: &str = "full_name = $full_name, scheme = $scheme, \
    year_of_joining = $year_of_joining, \
    expected_year_of_passout = $expected_year_of_passout, \
    ongoing_semester = $ongoing_semester, year_of_study = $year_of_study";

/// SurrealDB implementation of the Student repository.
#[derive(Clone)]
pub struct SurrealStudentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealStudentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn write(
        &self,
        body: &str,
        student: &Student,
        audit: Option<CreateAuditLogEntry>,
    ) -> EesaResult<Student> {
        let result = self
            .db
            .query(audited(body))
            .bind(("id", student.user_id.to_string()))
            .bind(("full_name", student.full_name.clone()))
            .bind(("scheme", student.scheme))
            .bind(("year_of_joining", student.year_of_joining))
            .bind(("expected_year_of_passout", student.expected_year_of_passout))
            .bind(("ongoing_semester", student.ongoing_semester))
            .bind(("year_of_study", student.year_of_study))
            .bind(("audits", audit_batch(audit)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get(student.user_id).await
    }
}

impl<C: Connection> StudentRepository for SurrealStudentRepository<C> {
    async fn create(&self, input: CreateStudent, audit: Option<AuditDraft>) -> EesaResult<Student> {
        let student = input.into_student()?;

        if self.get(student.user_id).await.is_ok() {
            return Err(EesaError::AlreadyExists {
                entity: format!("student record for user {}", student.user_id),
            });
        }
        let entry = audit.map(|d| d.complete(&student, None));

        self.write(
            &format!(
                "IF !record::exists(type::record('user', $id)) {{ THROW 'user not found'; }}; \
                 CREATE type::record('student', $id) SET {WRITE_FIELDS} RETURN NONE;"
            ),
            &student,
            entry,
        )
        .await
        .map_err(|e| match e {
            EesaError::Database(msg) if msg.contains("user not found") => {
                EesaError::not_found("user", student.user_id)
            }
            other => other,
        })
    }

    async fn get(&self, user_id: Uuid) -> EesaResult<Student> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('student', $id)")
            .bind(("id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, user_id))?;
        Ok(row.try_into_student()?)
    }

    async fn update(
        &self,
        user_id: Uuid,
        input: UpdateStudent,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Student> {
        let before = self.get(user_id).await?;
        let mut after = before.clone();
        input.apply_to(&mut after)?;

        let entry = match audit {
            Some(draft) => Some(draft.complete(&after, Some(diff_fields(&before, &after)?))),
            None => None,
        };

        self.write(
            &format!(
                "LET $updated = (UPDATE type::record('student', $id) SET {WRITE_FIELDS}, \
                 updated_at = time::now() RETURN AFTER); \
                 IF array::len($updated) = 0 {{ THROW 'student not found'; }};"
            ),
            &after,
            entry,
        )
        .await
    }

    async fn list(&self, pagination: Pagination) -> EesaResult<PaginatedResult<Student>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM student GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM student \
                 ORDER BY scheme ASC, year_of_joining ASC, full_name ASC \
                 LIMIT $limit START $offset;",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map_or(0, |r| r.total);
        let rows: Vec<StudentRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(StudentRow::try_into_student)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_user_ids_by_cohort(&self, cohort: Cohort) -> EesaResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM student \
                 WHERE scheme = $scheme AND year_of_joining = $year_of_joining",
            )
            .bind(("scheme", cohort.scheme))
            .bind(("year_of_joining", cohort.year_of_joining))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        let ids = rows
            .iter()
            .map(|row| parse_uuid(ENTITY, &row.record_id))
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(ids)
    }
}
