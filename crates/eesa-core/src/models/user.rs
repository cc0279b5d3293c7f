//! User domain model.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::{Auditable, ObjectRef};
use super::permission::{PermissionCode, ResourceType};
use crate::error::EesaError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRole {
    Student,
    Teacher,
    TechnicalHead,
    Admin,
    Alumni,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Student => "Student",
            UserRole::Teacher => "Teacher",
            UserRole::TechnicalHead => "TechnicalHead",
            UserRole::Admin => "Admin",
            UserRole::Alumni => "Alumni",
        }
    }

    /// Admins and technical heads are staff.
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::TechnicalHead)
    }

    /// Admins are implicit superusers.
    pub fn is_superuser(self) -> bool {
        self == UserRole::Admin
    }

    /// Roles that may approve any note.
    pub fn approves_notes(self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = EesaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(UserRole::Student),
            "Teacher" => Ok(UserRole::Teacher),
            "TechnicalHead" => Ok(UserRole::TechnicalHead),
            "Admin" => Ok(UserRole::Admin),
            "Alumni" => Ok(UserRole::Alumni),
            other => Err(EesaError::validation("role", format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Permissions held directly, outside any group.
    pub permissions: BTreeSet<PermissionCode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.role)
    }
}

impl Auditable for User {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceType::User, self.id)
    }

    fn object_repr(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Changing the role re-derives the staff and superuser flags.
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Replaces the direct permission set when present.
    pub permissions: Option<BTreeSet<PermissionCode>>,
}

impl UpdateUser {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
            user.is_staff = role.is_staff();
            user.is_superuser = role.is_superuser();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(permissions) = &self.permissions {
            user.permissions = permissions.clone();
        }
    }
}
