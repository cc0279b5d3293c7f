//! The caller identity handed to every governed operation.

use uuid::Uuid;

use super::group::Group;
use super::permission::PermissionCode;
use super::user::{User, UserRole};

/// An authenticated user together with the groups it belongs to.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub groups: Vec<Group>,
}

impl Principal {
    pub fn new(user: User, groups: Vec<Group>) -> Self {
        Self { user, groups }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn is_superuser(&self) -> bool {
        self.user.is_superuser
    }

    /// True if any group grants `code` or the user holds it directly.
    pub fn holds(&self, code: &PermissionCode) -> bool {
        self.user.permissions.contains(code) || self.groups.iter().any(|g| g.grants(code))
    }

    pub fn in_group(&self, name: &str) -> bool {
        self.is_superuser() || self.groups.iter().any(|g| g.name == name)
    }
}

/// Who is performing an operation. System imports and unauthenticated
/// requests are `Anonymous`.
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    Authenticated(Box<Principal>),
}

impl Actor {
    pub fn authenticated(principal: Principal) -> Self {
        Actor::Authenticated(Box::new(principal))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(p) => Some(p),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.principal().map(Principal::id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }
}

impl From<Principal> for Actor {
    fn from(principal: Principal) -> Self {
        Actor::authenticated(principal)
    }
}
