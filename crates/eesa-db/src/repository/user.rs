//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords are hashed with Argon2id (m=19456 KiB, t=2, p=1) and a fresh
//! random salt. An optional server-side pepper is prepended before hashing
//! and must be supplied again on verification.

use std::collections::BTreeSet;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditDraft, diff_fields};
use eesa_core::models::permission::PermissionCode;
use eesa_core::models::user::{CreateUser, UpdateUser, User, UserRole};
use eesa_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::audit_write::{audit_batch, audited, checked};
use crate::error::DbError;

const ENTITY: &str = "user";

#[derive(Debug, SurrealValue)]
pub(crate) struct UserRow {
    pub(crate) record_id: String,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        let role: UserRole = self.role.parse().map_err(|e| DbError::decode(ENTITY, e))?;
        let permissions = parse_permissions(ENTITY, self.permissions)?;
        Ok(User {
            id: parse_uuid(ENTITY, &self.record_id)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role,
            is_active: self.is_active,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn parse_permissions(
    entity: &str,
    raw: Vec<String>,
) -> Result<BTreeSet<PermissionCode>, DbError> {
    raw.into_iter()
        .map(|code| code.parse().map_err(|e| DbError::decode(entity, e)))
        .collect()
}

pub(crate) fn permission_strings(codes: &BTreeSet<PermissionCode>) -> Vec<String> {
    codes.iter().map(ToString::to_string).collect()
}

/// Hash a password with Argon2id, prepending `pepper` when given.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hashing(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let input = match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| DbError::Hashing(e.to_string()))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn find_one(&self, field: &'static str, value: &str) -> EesaResult<User> {
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM user WHERE {field} = $value LIMIT 1"
            ))
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, format!("{field}={value}")))?;
        Ok(row.try_into_user()?)
    }

    /// Fail with `AlreadyExists` if another user holds the username or
    /// email.
    async fn ensure_unique(&self, username: &str, email: &str, except: Option<Uuid>) -> EesaResult<()> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE (username = $username OR email = $email) \
                 AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("username", username.to_string()))
            .bind(("email", email.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        if rows.first().map_or(0, |r| r.total) > 0 {
            return Err(EesaError::AlreadyExists {
                entity: format!("user with username '{username}' or email '{email}'"),
            });
        }
        Ok(())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> EesaResult<User> {
        self.ensure_unique(&input.username, &input.email, None).await?;

        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 password_hash = $password_hash, role = $role, \
                 is_active = true, is_staff = $is_staff, \
                 is_superuser = $is_superuser, permissions = [] \
                 RETURN NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("is_staff", input.role.is_staff()))
            .bind(("is_superuser", input.role.is_superuser()))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> EesaResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, id))?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_username(&self, username: &str) -> EesaResult<User> {
        self.find_one("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> EesaResult<User> {
        self.find_one("email", email).await
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
        audit: Option<AuditDraft>,
    ) -> EesaResult<User> {
        let before = self.get_by_id(id).await?;
        let mut after = before.clone();
        input.apply_to(&mut after);

        if after.username != before.username || after.email != before.email {
            self.ensure_unique(&after.username, &after.email, Some(id)).await?;
        }

        let entries = match audit {
            Some(draft) => vec![draft.complete(&after, Some(diff_fields(&before, &after)?))],
            None => {
                debug!(user_id = %id, "Unaudited user update");
                Vec::new()
            }
        };

        let result = self
            .db
            .query(audited(
                "LET $updated = (UPDATE type::record('user', $id) SET \
                 username = $username, email = $email, role = $role, \
                 is_active = $is_active, is_staff = $is_staff, \
                 is_superuser = $is_superuser, permissions = $permissions, \
                 updated_at = time::now() RETURN AFTER); \
                 IF array::len($updated) = 0 { THROW 'user not found'; };",
            ))
            .bind(("id", id.to_string()))
            .bind(("username", after.username.clone()))
            .bind(("email", after.email.clone()))
            .bind(("role", after.role.as_str().to_string()))
            .bind(("is_active", after.is_active))
            .bind(("is_staff", after.is_staff))
            .bind(("is_superuser", after.is_superuser))
            .bind(("permissions", permission_strings(&after.permissions)))
            .bind(("audits", audit_batch(entries)))
            .await
            .map_err(DbError::from)?;
        checked(result)?;

        self.get_by_id(id).await
    }

    async fn list(&self, pagination: Pagination) -> EesaResult<PaginatedResult<User>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at ASC LIMIT $limit START $offset;",
            )
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
}
