//! Identity service: registration, authentication, actor resolution and
//! the audited user and group administration operations.

use std::collections::BTreeSet;

use eesa_core::authz::require;
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditAction, AuditDraft, RequestContext};
use eesa_core::models::group::{CreateGroup, Group, UpdateGroup};
use eesa_core::models::permission::{Action, PermissionCode, ResourceType};
use eesa_core::models::principal::{Actor, Principal};
use eesa_core::models::user::{CreateUser, UpdateUser, User, UserRole};
use eesa_core::repository::{GroupRepository, PaginatedResult, Pagination, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::groups::GroupTemplate;
use crate::password;

/// Identity service.
///
/// Generic over repository implementations so the workflow layer has no
/// dependency on the database crate.
pub struct IdentityService<U: UserRepository, G: GroupRepository> {
    users: U,
    groups: G,
    config: WorkflowConfig,
}

impl<U: UserRepository, G: GroupRepository> IdentityService<U, G> {
    pub fn new(users: U, groups: G, config: WorkflowConfig) -> Self {
        Self {
            users,
            groups,
            config,
        }
    }

    /// Self-service registration. Not audited: there is no authenticated
    /// actor yet. Staff roles cannot be self-assigned.
    pub async fn register(&self, input: CreateUser) -> EesaResult<User> {
        password::check_strength(&input.password, self.config.min_password_length)?;
        if input.role.is_staff() {
            return Err(EesaError::validation(
                "role",
                format!("{} accounts cannot be self-registered", input.role),
            ));
        }

        let user = self.users.create(input).await?;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "User registered");
        Ok(user)
    }

    /// Verify credentials, trying the identifier as a username first and
    /// then as an email.
    pub async fn authenticate(&self, username_or_email: &str, password: &str) -> EesaResult<Principal> {
        let user = match self.users.get_by_username(username_or_email).await {
            Ok(u) => u,
            Err(EesaError::NotFound { .. }) => self
                .users
                .get_by_email(username_or_email)
                .await
                .map_err(|_| WorkflowError::InvalidCredentials)?,
            Err(e) => return Err(e),
        };

        let valid =
            password::verify_password(password, &user.password_hash, self.config.pepper.as_deref())?;
        if !valid {
            warn!(user_id = %user.id, "Failed login");
            return Err(WorkflowError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(WorkflowError::AccountInactive.into());
        }

        let groups = self.groups.get_user_groups(user.id).await?;
        Ok(Principal::new(user, groups))
    }

    /// Resolve a user and their groups into an actor.
    pub async fn load_actor(&self, user_id: Uuid) -> EesaResult<Actor> {
        let user = self.users.get_by_id(user_id).await?;
        let groups = self.groups.get_user_groups(user_id).await?;
        Ok(Actor::from(Principal::new(user, groups)))
    }

    pub async fn user_by_username(&self, username: &str) -> EesaResult<User> {
        self.users.get_by_username(username).await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Change a user's role, re-deriving the staff and superuser flags.
    /// Only superusers may hand out the admin role.
    pub async fn change_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: UserRole,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        require(actor, Action::Change, ResourceType::User, None)?;
        if role.is_superuser() && !is_superuser(actor) {
            warn!(actor = ?actor.user_id(), %user_id, "Admin role grant denied");
            return Err(EesaError::forbidden("only superusers may grant the admin role"));
        }
        self.guard_superuser_target(actor, user_id).await?;

        let user = self
            .users
            .update(
                user_id,
                UpdateUser {
                    role: Some(role),
                    ..UpdateUser::default()
                },
                AuditDraft::for_actor(actor, AuditAction::Update, ctx),
            )
            .await?;
        info!(%user_id, %role, "User role changed");
        Ok(user)
    }

    pub async fn deactivate_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        self.set_active(actor, user_id, false, ctx).await
    }

    pub async fn activate_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        self.set_active(actor, user_id, true, ctx).await
    }

    async fn set_active(
        &self,
        actor: &Actor,
        user_id: Uuid,
        active: bool,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        require(actor, Action::Change, ResourceType::User, None)?;
        self.guard_superuser_target(actor, user_id).await?;
        let action = if active {
            AuditAction::Activate
        } else {
            AuditAction::Deactivate
        };

        let user = self
            .users
            .update(
                user_id,
                UpdateUser {
                    is_active: Some(active),
                    ..UpdateUser::default()
                },
                AuditDraft::for_actor(actor, action, ctx),
            )
            .await?;
        info!(%user_id, active, "User activation changed");
        Ok(user)
    }

    pub async fn grant_user_permission(
        &self,
        actor: &Actor,
        user_id: Uuid,
        code: PermissionCode,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        self.edit_user_permissions(actor, user_id, ctx, |set| {
            set.insert(code);
        })
        .await
    }

    pub async fn revoke_user_permission(
        &self,
        actor: &Actor,
        user_id: Uuid,
        code: PermissionCode,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<User> {
        self.edit_user_permissions(actor, user_id, ctx, |set| {
            set.remove(&code);
        })
        .await
    }

    async fn edit_user_permissions(
        &self,
        actor: &Actor,
        user_id: Uuid,
        ctx: Option<&RequestContext>,
        edit: impl FnOnce(&mut BTreeSet<PermissionCode>),
    ) -> EesaResult<User> {
        require(actor, Action::Change, ResourceType::User, None)?;
        let current = self.users.get_by_id(user_id).await?;
        if current.is_superuser && !is_superuser(actor) {
            return Err(EesaError::forbidden("only superusers may modify a superuser"));
        }
        let mut permissions = current.permissions.clone();
        edit(&mut permissions);
        if permissions == current.permissions {
            return Ok(current);
        }
        ensure_delegable(actor, permissions.difference(&current.permissions))?;

        let user = self
            .users
            .update(
                user_id,
                UpdateUser {
                    permissions: Some(permissions),
                    ..UpdateUser::default()
                },
                AuditDraft::for_actor(actor, AuditAction::Update, ctx),
            )
            .await?;
        info!(%user_id, permissions = user.permissions.len(), "User permissions changed");
        Ok(user)
    }

    /// Superuser accounts can only be changed by another superuser.
    async fn guard_superuser_target(&self, actor: &Actor, user_id: Uuid) -> EesaResult<()> {
        let target = self.users.get_by_id(user_id).await?;
        if target.is_superuser && !is_superuser(actor) {
            warn!(actor = ?actor.user_id(), %user_id, "Superuser modification denied");
            return Err(EesaError::forbidden("only superusers may modify a superuser"));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub async fn create_group(
        &self,
        actor: &Actor,
        input: CreateGroup,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Group> {
        require(actor, Action::Add, ResourceType::Group, None)?;
        let group = self
            .groups
            .create(input, AuditDraft::for_actor(actor, AuditAction::Create, ctx))
            .await?;
        info!(group_id = %group.id, name = %group.name, "Group created");
        Ok(group)
    }

    pub async fn delete_group(
        &self,
        actor: &Actor,
        group_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<()> {
        require(actor, Action::Delete, ResourceType::Group, None)?;
        self.groups
            .delete(group_id, AuditDraft::for_actor(actor, AuditAction::Delete, ctx))
            .await?;
        info!(%group_id, "Group deleted");
        Ok(())
    }

    pub async fn grant_group_permission(
        &self,
        actor: &Actor,
        group_id: Uuid,
        code: PermissionCode,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Group> {
        self.edit_group_permissions(actor, group_id, ctx, |set| {
            set.insert(code);
        })
        .await
    }

    pub async fn revoke_group_permission(
        &self,
        actor: &Actor,
        group_id: Uuid,
        code: PermissionCode,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Group> {
        self.edit_group_permissions(actor, group_id, ctx, |set| {
            set.remove(&code);
        })
        .await
    }

    async fn edit_group_permissions(
        &self,
        actor: &Actor,
        group_id: Uuid,
        ctx: Option<&RequestContext>,
        edit: impl FnOnce(&mut BTreeSet<PermissionCode>),
    ) -> EesaResult<Group> {
        require(actor, Action::Change, ResourceType::Group, None)?;
        let current = self.groups.get_by_id(group_id).await?;
        let mut permissions = current.permissions.clone();
        edit(&mut permissions);
        if permissions == current.permissions {
            return Ok(current);
        }
        ensure_delegable(actor, permissions.difference(&current.permissions))?;

        let group = self
            .groups
            .update(
                group_id,
                UpdateGroup {
                    permissions: Some(permissions),
                    ..UpdateGroup::default()
                },
                AuditDraft::for_actor(actor, AuditAction::Update, ctx),
            )
            .await?;
        info!(%group_id, name = %group.name, "Group permissions changed");
        Ok(group)
    }

    pub async fn add_member(
        &self,
        actor: &Actor,
        user_id: Uuid,
        group_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<()> {
        require(actor, Action::Change, ResourceType::Group, None)?;
        self.groups
            .add_member(user_id, group_id, AuditDraft::for_actor(actor, AuditAction::Update, ctx))
            .await?;
        info!(%user_id, %group_id, "User added to group");
        Ok(())
    }

    pub async fn remove_member(
        &self,
        actor: &Actor,
        user_id: Uuid,
        group_id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<()> {
        require(actor, Action::Change, ResourceType::Group, None)?;
        self.groups
            .remove_member(user_id, group_id, AuditDraft::for_actor(actor, AuditAction::Update, ctx))
            .await?;
        info!(%user_id, %group_id, "User removed from group");
        Ok(())
    }

    pub async fn group_by_name(&self, name: &str) -> EesaResult<Group> {
        self.groups.get_by_name(name).await
    }

    pub async fn list_groups(&self, pagination: Pagination) -> EesaResult<PaginatedResult<Group>> {
        self.groups.list(pagination).await
    }

    pub async fn group_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> EesaResult<PaginatedResult<User>> {
        self.groups.get_members(group_id, pagination).await
    }

    /// Create each template group that is missing and reset existing ones
    /// to exactly the template's permissions. Operator bootstrap, so no
    /// audit entries are written.
    pub async fn ensure_groups(&self, templates: &[GroupTemplate]) -> EesaResult<Vec<Group>> {
        let mut groups = Vec::with_capacity(templates.len());
        for template in templates {
            let group = match self.groups.get_by_name(template.name).await {
                Ok(existing) if existing.permissions == template.permissions => existing,
                Ok(existing) => {
                    info!(name = template.name, "Updating group permissions");
                    self.groups
                        .update(
                            existing.id,
                            UpdateGroup {
                                permissions: Some(template.permissions.clone()),
                                ..UpdateGroup::default()
                            },
                            None,
                        )
                        .await?
                }
                Err(EesaError::NotFound { .. }) => {
                    info!(name = template.name, "Creating group");
                    self.groups
                        .create(
                            CreateGroup {
                                name: template.name.to_string(),
                                description: template.description.to_string(),
                                permissions: template.permissions.clone(),
                            },
                            None,
                        )
                        .await?
                }
                Err(e) => return Err(e),
            };
            groups.push(group);
        }
        Ok(groups)
    }
}

fn is_superuser(actor: &Actor) -> bool {
    actor
        .principal()
        .is_some_and(|p| p.user.is_active && p.is_superuser())
}

/// Non-superusers may only hand out codes they hold themselves.
fn ensure_delegable<'a>(
    actor: &Actor,
    added: impl IntoIterator<Item = &'a PermissionCode>,
) -> EesaResult<()> {
    if is_superuser(actor) {
        return Ok(());
    }
    let Some(principal) = actor.principal() else {
        return Err(EesaError::forbidden("authentication required"));
    };
    match added.into_iter().find(|code| !principal.holds(code)) {
        Some(code) => {
            warn!(actor = %principal.id(), %code, "Permission escalation denied");
            Err(EesaError::forbidden(format!("cannot grant {code} without holding it")))
        }
        None => Ok(()),
    }
}
