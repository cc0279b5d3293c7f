//! Audit log domain model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::permission::ResourceType;
use super::principal::Actor;
use crate::error::{EesaError, EesaResult};

/// Maximum stored length of an object representation.
pub const MAX_OBJECT_REPR_LEN: usize = 200;
/// Maximum stored length of a user agent string.
pub const MAX_USER_AGENT_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    Upload,
    Download,
    Verify,
    Feature,
    Unfeature,
    Publish,
    Unpublish,
    Activate,
    Deactivate,
}

impl AuditAction {
    pub const ALL: [AuditAction; 14] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::Approve,
        AuditAction::Reject,
        AuditAction::Upload,
        AuditAction::Download,
        AuditAction::Verify,
        AuditAction::Feature,
        AuditAction::Unfeature,
        AuditAction::Publish,
        AuditAction::Unpublish,
        AuditAction::Activate,
        AuditAction::Deactivate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Upload => "upload",
            AuditAction::Download => "download",
            AuditAction::Verify => "verify",
            AuditAction::Feature => "feature",
            AuditAction::Unfeature => "unfeature",
            AuditAction::Publish => "publish",
            AuditAction::Unpublish => "unpublish",
            AuditAction::Activate => "activate",
            AuditAction::Deactivate => "deactivate",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = EesaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| EesaError::validation("action", format!("unknown audit action: {s}")))
    }
}

/// Typed reference to any audited object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ResourceType,
    pub id: Uuid,
}

impl ObjectRef {
    pub fn new(kind: ResourceType, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.table(), self.id)
    }
}

/// Anything that can be the target of an audit entry.
pub trait Auditable {
    fn object_ref(&self) -> ObjectRef;
    /// Human-readable snapshot kept after the object itself is gone.
    fn object_repr(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field path (dotted for nested objects) to old/new values.
pub type FieldChanges = BTreeMap<String, FieldChange>;

/// Fields never reported in diffs.
const DIFF_IGNORED: &[&str] = &["updated_at"];

/// Compute the field-level changes between two states of the same value.
///
/// Nested objects are flattened into dotted paths; arrays and scalars are
/// compared whole. Keys missing on one side are reported as `null`.
pub fn diff_fields<T: Serialize>(before: &T, after: &T) -> EesaResult<FieldChanges> {
    let before = serde_json::to_value(before).map_err(|e| EesaError::Internal(e.to_string()))?;
    let after = serde_json::to_value(after).map_err(|e| EesaError::Internal(e.to_string()))?;
    let mut changes = FieldChanges::new();
    collect_changes("", &before, &after, &mut changes);
    Ok(changes)
}

fn collect_changes(prefix: &str, before: &Value, after: &Value, out: &mut FieldChanges) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let keys: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
            for key in keys {
                if prefix.is_empty() && DIFF_IGNORED.contains(&key.as_str()) {
                    continue;
                }
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                let old_v = old.get(key).unwrap_or(&Value::Null);
                let new_v = new.get(key).unwrap_or(&Value::Null);
                collect_changes(&path, old_v, new_v, out);
            }
        }
        (old, new) if old != new => {
            out.insert(
                prefix.to_string(),
                FieldChange {
                    old: old.clone(),
                    new: new.clone(),
                },
            );
        }
        _ => {}
    }
}

/// Request metadata persisted on audit entries when available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Build from raw header values. The first hop of `X-Forwarded-For`
    /// wins over the socket address.
    pub fn from_headers(
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        let ip_address = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(remote_addr)
            .map(str::to_string);

        Self {
            ip_address,
            user_agent: user_agent.map(|ua| truncate(ua, MAX_USER_AGENT_LEN)),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// The actor-side half of an audit entry, built before the target is
/// written. Repositories complete it inside the mutation's transaction.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditDraft {
    /// `None` for anonymous actors: their mutations are not audited.
    pub fn for_actor(
        actor: &Actor,
        action: AuditAction,
        ctx: Option<&RequestContext>,
    ) -> Option<Self> {
        let actor_id = actor.user_id()?;
        Some(Self {
            actor_id,
            action,
            ip_address: ctx.and_then(|c| c.ip_address.clone()),
            user_agent: ctx.and_then(|c| c.user_agent.clone()),
        })
    }

    pub fn complete(
        self,
        target: &impl Auditable,
        changes: Option<FieldChanges>,
    ) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            actor_id: self.actor_id,
            action: self.action,
            target: target.object_ref(),
            object_repr: truncate(&target.object_repr(), MAX_OBJECT_REPR_LEN),
            changes: changes.filter(|c| !c.is_empty()),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub target: ObjectRef,
    pub object_repr: String,
    pub changes: Option<FieldChanges>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub target: ObjectRef,
    pub object_repr: String,
    pub changes: Option<FieldChanges>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
