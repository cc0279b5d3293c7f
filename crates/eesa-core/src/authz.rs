//! Permission evaluation.
//!
//! Decisions are pure functions of the actor and, optionally, the target
//! instance. A missing grant is a deny, never an error.

use uuid::Uuid;

use crate::error::{EesaError, EesaResult};
use crate::models::permission::{Action, PermissionCode, ResourceType};
use crate::models::principal::Actor;

/// Attribution fields an instance may carry. The first present one, in
/// declaration order, is the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub created_by: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub user: Option<Uuid>,
}

impl Ownership {
    pub fn owner(&self) -> Option<Uuid> {
        self.created_by.or(self.uploaded_by).or(self.user)
    }
}

/// Instances subject to object-level refinement.
pub trait Owned {
    fn ownership(&self) -> Ownership;

    /// Private instances are readable only by their owner (and by holders
    /// of a type-level grant).
    fn is_private(&self) -> bool {
        false
    }
}

/// Whether `actor` may perform `action` on `resource_type`, or on
/// `instance` when one is given.
pub fn can(
    actor: &Actor,
    action: Action,
    resource_type: ResourceType,
    instance: Option<&dyn Owned>,
) -> bool {
    let Some(principal) = actor.principal() else {
        return false;
    };
    if !principal.user.is_active {
        return false;
    }
    if principal.is_superuser() {
        return true;
    }
    if principal.holds(&PermissionCode::new(resource_type, action)) {
        return true;
    }

    let Some(instance) = instance else {
        return false;
    };
    let is_owner = instance.ownership().owner() == Some(principal.id());

    if action.is_read() {
        is_owner || !instance.is_private()
    } else {
        is_owner && resource_type.allows_owner_edit()
    }
}

/// [`can`] as a `Result`, failing with `Forbidden`.
pub fn require(
    actor: &Actor,
    action: Action,
    resource_type: ResourceType,
    instance: Option<&dyn Owned>,
) -> EesaResult<()> {
    if can(actor, action, resource_type, instance) {
        return Ok(());
    }
    let code = PermissionCode::new(resource_type, action);
    Err(match actor.principal() {
        None => EesaError::forbidden("authentication required"),
        Some(p) => EesaError::forbidden(format!("{} lacks {code}", p.user.username)),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::models::group::Group;
    use crate::models::principal::Principal;
    use crate::models::user::{User, UserRole};

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{}-{}", role, Uuid::new_v4().simple()),
            email: "someone@eesa.test".into(),
            password_hash: String::new(),
            role,
            is_active: true,
            is_staff: role.is_staff(),
            is_superuser: role.is_superuser(),
            permissions: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn group(name: &str, codes: &[PermissionCode]) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            permissions: codes.iter().copied().collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Doc {
        owner: Ownership,
        private: bool,
    }

    impl Owned for Doc {
        fn ownership(&self) -> Ownership {
            self.owner
        }
        fn is_private(&self) -> bool {
            self.private
        }
    }

    fn uploaded_by(id: Uuid, private: bool) -> Doc {
        Doc {
            owner: Ownership {
                uploaded_by: Some(id),
                ..Ownership::default()
            },
            private,
        }
    }

    const ADD_EVENT: PermissionCode = PermissionCode::new(ResourceType::Event, Action::Add);

    #[test]
    fn anonymous_is_denied_everything() {
        for action in Action::ALL {
            assert!(!can(&Actor::Anonymous, action, ResourceType::Note, None));
        }
        let err = require(&Actor::Anonymous, Action::View, ResourceType::Note, None).unwrap_err();
        assert!(matches!(err, EesaError::Forbidden { .. }));
    }

    #[test]
    fn superuser_is_wildcard() {
        let actor = Actor::from(Principal::new(user(UserRole::Admin), vec![]));
        for rt in ResourceType::ALL {
            for action in Action::ALL {
                assert!(can(&actor, action, rt, None));
            }
        }
    }

    #[test]
    fn inactive_superuser_is_denied() {
        let mut admin = user(UserRole::Admin);
        admin.is_active = false;
        let actor = Actor::from(Principal::new(admin, vec![]));
        assert!(!can(&actor, Action::View, ResourceType::Event, None));
    }

    #[test]
    fn group_grant_allows_type_level_action() {
        let events = group("Events Management", &[ADD_EVENT]);
        let actor = Actor::from(Principal::new(user(UserRole::TechnicalHead), vec![events]));
        assert!(can(&actor, Action::Add, ResourceType::Event, None));
        assert!(!can(&actor, Action::Delete, ResourceType::Event, None));
        assert!(!can(&actor, Action::Add, ResourceType::Alumni, None));
    }

    #[test]
    fn direct_grant_allows_type_level_action() {
        let mut u = user(UserRole::Teacher);
        u.permissions.insert(ADD_EVENT);
        let actor = Actor::from(Principal::new(u, vec![]));
        assert!(can(&actor, Action::Add, ResourceType::Event, None));
    }

    #[test]
    fn revoking_group_grant_keeps_direct_path() {
        let mut u = user(UserRole::Teacher);
        u.permissions.insert(ADD_EVENT);
        let with_group = Principal::new(u.clone(), vec![group("Events", &[ADD_EVENT])]);
        let without_group = Principal::new(u, vec![group("Events", &[])]);
        assert!(can(&with_group.into(), Action::Add, ResourceType::Event, None));
        assert!(can(&without_group.into(), Action::Add, ResourceType::Event, None));
    }

    #[test]
    fn revoking_sole_group_grant_removes_access() {
        let u = user(UserRole::Teacher);
        let without = Principal::new(u, vec![group("Events", &[])]);
        assert!(!can(&without.into(), Action::Add, ResourceType::Event, None));
    }

    #[test]
    fn owner_may_edit_own_content() {
        let u = user(UserRole::Student);
        let doc = uploaded_by(u.id, false);
        let actor = Actor::from(Principal::new(u, vec![]));
        assert!(can(&actor, Action::Change, ResourceType::Note, Some(&doc)));
        assert!(can(&actor, Action::Delete, ResourceType::Note, Some(&doc)));
        // Type-level decisions ignore ownership.
        assert!(!can(&actor, Action::Change, ResourceType::Note, None));
    }

    #[test]
    fn owner_edit_only_on_owner_editable_types() {
        let u = user(UserRole::Alumni);
        let doc = Doc {
            owner: Ownership {
                created_by: Some(u.id),
                ..Ownership::default()
            },
            private: false,
        };
        let actor = Actor::from(Principal::new(u, vec![]));
        assert!(!can(&actor, Action::Change, ResourceType::Alumni, Some(&doc)));
    }

    #[test]
    fn owner_field_priority_is_respected() {
        let creator = user(UserRole::Teacher);
        let uploader = user(UserRole::Student);
        let doc = Doc {
            owner: Ownership {
                created_by: Some(creator.id),
                uploaded_by: Some(uploader.id),
                user: None,
            },
            private: false,
        };
        let creator = Actor::from(Principal::new(creator, vec![]));
        let uploader = Actor::from(Principal::new(uploader, vec![]));
        assert!(can(&creator, Action::Change, ResourceType::Project, Some(&doc)));
        assert!(!can(&uploader, Action::Change, ResourceType::Project, Some(&doc)));
    }

    #[test]
    fn non_owner_reads_public_but_not_private() {
        let owner = user(UserRole::Student);
        let other = Actor::from(Principal::new(user(UserRole::Student), vec![]));
        let public = uploaded_by(owner.id, false);
        let private = uploaded_by(owner.id, true);
        assert!(can(&other, Action::View, ResourceType::Note, Some(&public)));
        assert!(!can(&other, Action::View, ResourceType::Note, Some(&private)));
        assert!(!can(&other, Action::Change, ResourceType::Note, Some(&public)));

        let owner = Actor::from(Principal::new(owner, vec![]));
        assert!(can(&owner, Action::View, ResourceType::Note, Some(&private)));
    }

    #[test]
    fn type_level_view_grant_sees_private_instances() {
        let reviewer = group("Academic", &[PermissionCode::new(ResourceType::Note, Action::View)]);
        let actor = Actor::from(Principal::new(user(UserRole::Teacher), vec![reviewer]));
        let pending = uploaded_by(Uuid::new_v4(), true);
        assert!(can(&actor, Action::View, ResourceType::Note, Some(&pending)));
    }
}
