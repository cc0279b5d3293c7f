//! SurrealDB implementation of [`GroupRepository`].
//!
//! Membership is a `member_of` graph edge from `user` to `group`.

use chrono::{DateTime, Utc};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{
    AuditDraft, CreateAuditLogEntry, FieldChange, FieldChanges, diff_fields,
};
use eesa_core::models::group::{CreateGroup, Group, UpdateGroup};
use eesa_core::models::user::User;
use eesa_core::repository::{GroupRepository, PaginatedResult, Pagination};
use serde_json::json;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::user::{UserRow, parse_permissions, permission_strings};
use super::{CountRow, parse_uuid};
use crate::audit_write::{audit_batch, audited, checked};
use crate::error::DbError;

const ENTITY: &str = "group";

#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    name: String,
    description: String,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(ENTITY, &self.record_id)?,
            name: self.name,
            description: self.description,
            permissions: parse_permissions(ENTITY, self.permissions)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn group_names(groups: &[Group]) -> Vec<String> {
    let mut names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    names.sort();
    names
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn get_user(&self, user_id: Uuid) -> EesaResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", user_id))?;
        Ok(row.try_into_user()?)
    }

    async fn is_member(&self, user_id: Uuid, group_id: Uuid) -> EesaResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id) GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map_or(0, |r| r.total) > 0)
    }

    /// Audit entries for a membership change, recorded against the user
    /// with the sorted group names as the changed field.
    async fn membership_audit(
        &self,
        user: &User,
        group: &Group,
        joining: bool,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Vec<CreateAuditLogEntry>> {
        let Some(draft) = audit else {
            return Ok(Vec::new());
        };
        let current = self.get_user_groups(user.id).await?;
        let old = group_names(&current);
        let mut new: Vec<String> = old.iter().filter(|n| **n != group.name).cloned().collect();
        if joining {
            new.push(group.name.clone());
            new.sort();
        }
        let mut changes = FieldChanges::new();
        changes.insert(
            "groups".into(),
            FieldChange {
                old: json!(old),
                new: json!(new),
            },
        );
        Ok(vec![draft.complete(user, Some(changes))])
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup, audit: Option<AuditDraft>) -> EesaResult<Group> {
        if self.get_by_name(&input.name).await.is_ok() {
            return Err(EesaError::AlreadyExists {
                entity: format!("group '{}'", input.name),
            });
        }

        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            permissions: input.permissions,
            created_at: now,
            updated_at: now,
        };
        let entries: Vec<_> = audit.map(|d| d.complete(&group, None)).into_iter().collect();

        let result = self
            .db
            .query(audited(
                "CREATE type::record('group', $id) SET \
                 name = $name, description = $description, \
                 permissions = $permissions RETURN NONE;",
            ))
            .bind(("id", group.id.to_string()))
            .bind(("name", group.name.clone()))
            .bind(("description", group.description.clone()))
            .bind(("permissions", permission_strings(&group.permissions)))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(group.id).await
    }

    async fn get_by_id(&self, id: Uuid) -> EesaResult<Group> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('group', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        Ok(row.try_into_group()?)
    }

    async fn get_by_name(&self, name: &str) -> EesaResult<Group> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM group WHERE name = $name LIMIT 1")
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, format!("name={name}")))?;
        Ok(row.try_into_group()?)
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
        audit: Option<AuditDraft>,
    ) -> EesaResult<Group> {
        let before = self.get_by_id(id).await?;
        let mut after = before.clone();
        input.apply_to(&mut after);

        if after.name != before.name && self.get_by_name(&after.name).await.is_ok() {
            return Err(EesaError::AlreadyExists {
                entity: format!("group '{}'", after.name),
            });
        }

        let entries = match audit {
            Some(draft) => vec![draft.complete(&after, Some(diff_fields(&before, &after)?))],
            None => Vec::new(),
        };

        let result = self
            .db
            .query(audited(
                "LET $updated = (UPDATE type::record('group', $id) SET \
                 name = $name, description = $description, \
                 permissions = $permissions, updated_at = time::now() \
                 RETURN AFTER); \
                 IF array::len($updated) = 0 { THROW 'group not found'; };",
            ))
            .bind(("id", id.to_string()))
            .bind(("name", after.name.clone()))
            .bind(("description", after.description.clone()))
            .bind(("permissions", permission_strings(&after.permissions)))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid, audit: Option<AuditDraft>) -> EesaResult<()> {
        let group = self.get_by_id(id).await?;
        let entries: Vec<_> = audit.map(|d| d.complete(&group, None)).into_iter().collect();

        let result = self
            .db
            .query(audited(
                "DELETE member_of WHERE out = type::record('group', $id); \
                 DELETE type::record('group', $id);",
            ))
            .bind(("id", id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> EesaResult<PaginatedResult<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM group \
                 ORDER BY name ASC LIMIT $limit START $offset;",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map_or(0, |r| r.total);
        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        audit: Option<AuditDraft>,
    ) -> EesaResult<()> {
        let user = self.get_user(user_id).await?;
        let group = self.get_by_id(group_id).await?;
        if self.is_member(user_id, group_id).await? {
            return Ok(());
        }
        let entries = self.membership_audit(&user, &group, true, audit).await?;

        let result = self
            .db
            .query(audited(
                "LET $from = type::record('user', $user_id); \
                 LET $to = type::record('group', $group_id); \
                 RELATE $from->member_of->$to RETURN NONE;",
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        Ok(())
    }

    async fn remove_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
        audit: Option<AuditDraft>,
    ) -> EesaResult<()> {
        let user = self.get_user(user_id).await?;
        let group = self.get_by_id(group_id).await?;
        if !self.is_member(user_id, group_id).await? {
            return Ok(());
        }
        let entries = self.membership_audit(&user, &group, false, audit).await?;

        let result = self
            .db
            .query(audited(
                "DELETE member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id);",
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        Ok(())
    }

    async fn get_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<User>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member_of \
                 WHERE out = type::record('group', $group_id) GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM member_of \
                     WHERE out = type::record('group', $group_id)\
                 ) \
                 ORDER BY username ASC LIMIT $limit START $offset;",
            )
            .bind(("group_id", group_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map_or(0, |r| r.total);
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn get_user_groups(&self, user_id: Uuid) -> EesaResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE out FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 ) ORDER BY name ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;

        let groups = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(groups)
    }
}
