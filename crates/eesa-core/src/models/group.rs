//! Group domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::{Auditable, ObjectRef};
use super::permission::{PermissionCode, ResourceType};

/// A named bundle of permissions assignable to users. Groups are the
/// role proxy for staff duties ("Events Management", "Academic
/// Management", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<PermissionCode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn grants(&self, code: &PermissionCode) -> bool {
        self.permissions.contains(code)
    }
}

impl Auditable for Group {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceType::Group, self.id)
    }

    fn object_repr(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<PermissionCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole permission set when present.
    pub permissions: Option<BTreeSet<PermissionCode>>,
}

impl UpdateGroup {
    pub fn apply_to(&self, group: &mut Group) {
        if let Some(name) = &self.name {
            group.name = name.clone();
        }
        if let Some(description) = &self.description {
            group.description = description.clone();
        }
        if let Some(permissions) = &self.permissions {
            group.permissions = permissions.clone();
        }
    }
}
