//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Registry payloads are stored as
//! flexible objects next to the shared ownership and approval columns.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['Student', 'Teacher', 'TechnicalHead', 'Admin', \
    'Alumni'];
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_staff ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD is_superuser ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD permissions ON TABLE user TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE string DEFAULT '';
DEFINE FIELD permissions ON TABLE group TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- =======================================================================
-- Students (record id = user id)
-- =======================================================================
DEFINE TABLE student SCHEMAFULL;
DEFINE FIELD full_name ON TABLE student TYPE string;
DEFINE FIELD scheme ON TABLE student TYPE int;
DEFINE FIELD year_of_joining ON TABLE student TYPE int;
DEFINE FIELD expected_year_of_passout ON TABLE student TYPE int;
DEFINE FIELD ongoing_semester ON TABLE student TYPE int \
    ASSERT $value >= 1 AND $value <= 8;
DEFINE FIELD year_of_study ON TABLE student TYPE int \
    ASSERT $value >= 1 AND $value <= 4;
DEFINE FIELD created_at ON TABLE student TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE student TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_student_cohort ON TABLE student \
    COLUMNS scheme, year_of_joining;

-- =======================================================================
-- Reviewer assignments (one active per cohort)
-- =======================================================================
DEFINE TABLE reviewer_assignment SCHEMAFULL;
DEFINE FIELD student_id ON TABLE reviewer_assignment TYPE string;
DEFINE FIELD scheme ON TABLE reviewer_assignment TYPE int;
DEFINE FIELD year_of_joining ON TABLE reviewer_assignment TYPE int;
DEFINE FIELD assigned_by ON TABLE reviewer_assignment TYPE string;
DEFINE FIELD assigned_at ON TABLE reviewer_assignment TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD is_active ON TABLE reviewer_assignment TYPE bool \
    DEFAULT true;
DEFINE INDEX idx_reviewer_cohort ON TABLE reviewer_assignment \
    COLUMNS scheme, year_of_joining, is_active;
DEFINE INDEX idx_reviewer_student ON TABLE reviewer_assignment \
    COLUMNS student_id, is_active;

-- =======================================================================
-- Notes (approvable, owned by uploader)
-- =======================================================================
DEFINE TABLE note SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE note TYPE string;
DEFINE FIELD payload ON TABLE note TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE note TYPE bool DEFAULT false;
DEFINE FIELD approved_by ON TABLE note TYPE option<string>;
DEFINE FIELD approved_at ON TABLE note TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE note TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE note TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_note_owner ON TABLE note COLUMNS owner_id;
DEFINE INDEX idx_note_pending ON TABLE note \
    COLUMNS is_approved, created_at;

-- =======================================================================
-- Academic resources (approvable, owned by uploader)
-- =======================================================================
DEFINE TABLE academic_resource SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE academic_resource TYPE string;
DEFINE FIELD payload ON TABLE academic_resource TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE academic_resource TYPE bool DEFAULT false;
DEFINE FIELD approved_by ON TABLE academic_resource TYPE option<string>;
DEFINE FIELD approved_at ON TABLE academic_resource TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE academic_resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE academic_resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_academic_resource_owner ON TABLE academic_resource COLUMNS owner_id;
DEFINE INDEX idx_academic_resource_pending ON TABLE academic_resource \
    COLUMNS is_approved, created_at;

-- =======================================================================
-- Alumni directory (approvable, owned by creator)
-- =======================================================================
DEFINE TABLE alumni SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE alumni TYPE string;
DEFINE FIELD payload ON TABLE alumni TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE alumni TYPE bool DEFAULT false;
DEFINE FIELD approved_by ON TABLE alumni TYPE option<string>;
DEFINE FIELD approved_at ON TABLE alumni TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE alumni TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE alumni TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_alumni_owner ON TABLE alumni COLUMNS owner_id;
DEFINE INDEX idx_alumni_pending ON TABLE alumni \
    COLUMNS is_approved, created_at;

-- =======================================================================
-- Events
-- =======================================================================
DEFINE TABLE event SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE event TYPE string;
DEFINE FIELD payload ON TABLE event TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE event TYPE option<bool>;
DEFINE FIELD approved_by ON TABLE event TYPE option<string>;
DEFINE FIELD approved_at ON TABLE event TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE event TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_event_owner ON TABLE event COLUMNS owner_id;

-- =======================================================================
-- Placement drives
-- =======================================================================
DEFINE TABLE placement_drive SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE placement_drive TYPE string;
DEFINE FIELD payload ON TABLE placement_drive TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE placement_drive TYPE option<bool>;
DEFINE FIELD approved_by ON TABLE placement_drive TYPE option<string>;
DEFINE FIELD approved_at ON TABLE placement_drive TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE placement_drive TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE placement_drive TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_placement_drive_owner ON TABLE placement_drive COLUMNS owner_id;

-- =======================================================================
-- Gallery items
-- =======================================================================
DEFINE TABLE gallery_item SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE gallery_item TYPE string;
DEFINE FIELD payload ON TABLE gallery_item TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE gallery_item TYPE option<bool>;
DEFINE FIELD approved_by ON TABLE gallery_item TYPE option<string>;
DEFINE FIELD approved_at ON TABLE gallery_item TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE gallery_item TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE gallery_item TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_gallery_item_owner ON TABLE gallery_item COLUMNS owner_id;

-- =======================================================================
-- Projects
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE project TYPE string;
DEFINE FIELD payload ON TABLE project TYPE object FLEXIBLE;
DEFINE FIELD is_approved ON TABLE project TYPE option<bool>;
DEFINE FIELD approved_by ON TABLE project TYPE option<string>;
DEFINE FIELD approved_at ON TABLE project TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_owner ON TABLE project COLUMNS owner_id;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string \
    ASSERT $value IN ['create', 'update', 'delete', 'approve', 'reject', \
    'upload', 'download', 'verify', 'feature', 'unfeature', \
    'publish', 'unpublish', 'activate', 'deactivate'];
DEFINE FIELD target_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['user', 'group', 'student', 'reviewer_assignment', 'subject', \
    'note', 'academic_resource', 'alumni', 'event', 'placement_drive', \
    'gallery_item', 'project', 'audit_log'];
DEFINE FIELD target_id ON TABLE audit_log TYPE string;
DEFINE FIELD object_repr ON TABLE audit_log TYPE string;
DEFINE FIELD changes ON TABLE audit_log TYPE option<object> FLEXIBLE;
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD user_agent ON TABLE audit_log TYPE option<string>;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log \
    COLUMNS actor_id, timestamp;
DEFINE INDEX idx_audit_target ON TABLE audit_log \
    COLUMNS target_type, target_id, timestamp;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Group membership
DEFINE TABLE member_of TYPE RELATION IN user OUT group SCHEMAFULL;
DEFINE INDEX idx_member_of_pair ON TABLE member_of COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Apply every migration newer than the highest version recorded in
/// `_migration` and return how many were applied. Applied versions are
/// recorded, so calling this on an up-to-date database is a no-op.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let latest: Vec<MigrationRecord> = result.take(0)?;
    let current = latest.first().map_or(0, |m| m.version);

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );

        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}': {e}",
                migration.version, migration.name
            ))
        })?;
        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("recording v{}: {e}", migration.version))
            })?;
        applied += 1;
    }

    if applied == 0 {
        info!(version = current, "Schema is up to date");
    }
    Ok(applied)
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
