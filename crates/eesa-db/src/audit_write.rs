//! Audit entries written inside mutation transactions.
//!
//! Mutating repositories wrap their statements with [`audited`] and bind
//! the completed entries as `$audits`. Any statement failure, including a
//! `THROW` from a guard, rolls back the mutation and its audit entries
//! together.

use eesa_core::models::audit::CreateAuditLogEntry;
use serde_json::{Map, Value, json};
use surrealdb::IndexedResults as Response;
use uuid::Uuid;

use crate::error::DbError;

const AUDIT_INSERT: &str = "\
FOR $entry IN $audits {
    CREATE type::record('audit_log', $entry.id) CONTENT $entry.content;
};";

/// Wrap `body` in a transaction that also inserts every bound audit entry.
pub(crate) fn audited(body: &str) -> String {
    format!("BEGIN TRANSACTION;\n{body}\n{AUDIT_INSERT}\nCOMMIT TRANSACTION;")
}

/// Serialize entries for binding as `$audits`. Ids are UUIDv7 so entries
/// sharing a timestamp still sort by creation order.
pub(crate) fn audit_batch(entries: impl IntoIterator<Item = CreateAuditLogEntry>) -> Value {
    Value::Array(
        entries
            .into_iter()
            .map(|entry| {
                json!({
                    "id": Uuid::now_v7().to_string(),
                    "content": audit_content(entry),
                })
            })
            .collect(),
    )
}

/// Field map for one entry. Absent optionals are omitted rather than
/// written as null.
pub(crate) fn audit_content(entry: CreateAuditLogEntry) -> Value {
    let mut obj = Map::new();
    obj.insert("actor_id".into(), entry.actor_id.to_string().into());
    obj.insert("action".into(), entry.action.as_str().into());
    obj.insert("target_type".into(), entry.target.kind.table().into());
    obj.insert("target_id".into(), entry.target.id.to_string().into());
    obj.insert("object_repr".into(), entry.object_repr.into());
    if let Some(changes) = entry.changes {
        let changes = changes
            .into_iter()
            .map(|(field, change)| (field, json!({ "old": change.old, "new": change.new })))
            .collect();
        obj.insert("changes".into(), Value::Object(changes));
    }
    if let Some(ip) = entry.ip_address {
        obj.insert("ip_address".into(), ip.into());
    }
    if let Some(ua) = entry.user_agent {
        obj.insert("user_agent".into(), ua.into());
    }
    Value::Object(obj)
}

/// Surface per-statement errors from a response.
pub(crate) fn checked(response: Response) -> Result<Response, DbError> {
    response.check().map_err(|e| DbError::Query(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eesa_core::models::audit::{AuditAction, FieldChange, FieldChanges, ObjectRef};
    use eesa_core::models::permission::ResourceType;

    fn entry(changes: Option<FieldChanges>) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            actor_id: Uuid::new_v4(),
            action: AuditAction::Update,
            target: ObjectRef::new(ResourceType::Note, Uuid::new_v4()),
            object_repr: "Signals and Systems".into(),
            changes,
            ip_address: None,
            user_agent: Some("firefox".into()),
        }
    }

    #[test]
    fn content_omits_absent_fields() {
        let content = audit_content(entry(None));
        assert_eq!(content["target_type"], "note");
        assert_eq!(content["action"], "update");
        assert!(content.get("changes").is_none());
        assert!(content.get("ip_address").is_none());
        assert_eq!(content["user_agent"], "firefox");
    }

    #[test]
    fn content_carries_changes() {
        let mut changes = FieldChanges::new();
        changes.insert(
            "payload.title".into(),
            FieldChange {
                old: json!("Signals"),
                new: json!("Signals and Systems"),
            },
        );
        let content = audit_content(entry(Some(changes)));
        assert_eq!(content["changes"]["payload.title"]["new"], "Signals and Systems");
    }

    #[test]
    fn batch_ids_are_ordered() {
        let batch = audit_batch([entry(None), entry(None)]);
        let ids: Vec<&str> = batch
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn audited_script_is_one_transaction() {
        let script = audited("DELETE type::record('note', $id);");
        assert!(script.starts_with("BEGIN TRANSACTION;"));
        assert!(script.trim_end().ends_with("COMMIT TRANSACTION;"));
        assert!(script.contains("$audits"));
    }
}
