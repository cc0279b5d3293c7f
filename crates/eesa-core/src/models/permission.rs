//! Permission domain model.
//!
//! A permission is an atomic `(resource type, action)` pair. Codes render
//! as `<action>_<codename>` (e.g. `add_note`) and may be qualified with
//! the owning application label (`academics.add_note`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EesaError;

/// Every resource type governed by the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    User,
    Group,
    Student,
    Reviewer,
    Subject,
    Note,
    AcademicResource,
    Alumni,
    Event,
    PlacementDrive,
    GalleryItem,
    Project,
    AuditLog,
}

impl ResourceType {
    pub const ALL: [ResourceType; 13] = [
        ResourceType::User,
        ResourceType::Group,
        ResourceType::Student,
        ResourceType::Reviewer,
        ResourceType::Subject,
        ResourceType::Note,
        ResourceType::AcademicResource,
        ResourceType::Alumni,
        ResourceType::Event,
        ResourceType::PlacementDrive,
        ResourceType::GalleryItem,
        ResourceType::Project,
        ResourceType::AuditLog,
    ];

    /// Lower-case model name used inside permission codes.
    pub fn codename(self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::Student => "student",
            ResourceType::Reviewer => "reviewer",
            ResourceType::Subject => "subject",
            ResourceType::Note => "note",
            ResourceType::AcademicResource => "academicresource",
            ResourceType::Alumni => "alumni",
            ResourceType::Event => "event",
            ResourceType::PlacementDrive => "placementdrive",
            ResourceType::GalleryItem => "galleryitem",
            ResourceType::Project => "project",
            ResourceType::AuditLog => "auditlog",
        }
    }

    pub fn app_label(self) -> &'static str {
        match self {
            ResourceType::User | ResourceType::Alumni | ResourceType::AuditLog => "accounts",
            ResourceType::Group => "auth",
            ResourceType::Student | ResourceType::Reviewer => "students",
            ResourceType::Subject | ResourceType::Note | ResourceType::AcademicResource => {
                "academics"
            }
            ResourceType::Event => "events",
            ResourceType::PlacementDrive => "placements",
            ResourceType::GalleryItem => "gallery",
            ResourceType::Project => "projects",
        }
    }

    /// Storage table holding instances of this type.
    pub fn table(self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::Student => "student",
            ResourceType::Reviewer => "reviewer_assignment",
            ResourceType::Subject => "subject",
            ResourceType::Note => "note",
            ResourceType::AcademicResource => "academic_resource",
            ResourceType::Alumni => "alumni",
            ResourceType::Event => "event",
            ResourceType::PlacementDrive => "placement_drive",
            ResourceType::GalleryItem => "gallery_item",
            ResourceType::Project => "project",
            ResourceType::AuditLog => "audit_log",
        }
    }

    /// Whether owners may change or delete their own instances without a
    /// blanket grant.
    pub fn allows_owner_edit(self) -> bool {
        matches!(
            self,
            ResourceType::Note
                | ResourceType::AcademicResource
                | ResourceType::Event
                | ResourceType::GalleryItem
                | ResourceType::Project
        )
    }

    pub fn from_codename(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rt| rt.codename() == name)
    }

    pub fn from_table(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rt| rt.table() == name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    View,
    Add,
    Change,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Add, Action::Change, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
        }
    }

    pub fn is_read(self) -> bool {
        self == Action::View
    }
}

impl FromStr for Action {
    type Err = EesaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| EesaError::validation("action", format!("unknown action: {s}")))
    }
}

/// An atomic `(resource type, action)` permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode {
    pub resource_type: ResourceType,
    pub action: Action,
}

impl PermissionCode {
    pub const fn new(resource_type: ResourceType, action: Action) -> Self {
        Self {
            resource_type,
            action,
        }
    }

    /// All four actions on one resource type.
    pub fn full_access(resource_type: ResourceType) -> [PermissionCode; 4] {
        Action::ALL.map(|action| PermissionCode::new(resource_type, action))
    }

    /// `app_label.action_codename`, e.g. `academics.add_note`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.resource_type.app_label(), self)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.action.as_str(), self.resource_type.codename())
    }
}

impl FromStr for PermissionCode {
    type Err = EesaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EesaError::validation("permission", format!("invalid permission code: {s}"));

        let (app_label, codename) = match s.split_once('.') {
            Some((app, code)) => (Some(app), code),
            None => (None, s),
        };
        let (action, model) = codename.split_once('_').ok_or_else(invalid)?;
        let action: Action = action.parse().map_err(|_| invalid())?;
        let resource_type = ResourceType::from_codename(model).ok_or_else(invalid)?;

        if let Some(app) = app_label
            && app != resource_type.app_label()
        {
            return Err(invalid());
        }

        Ok(PermissionCode::new(resource_type, action))
    }
}

impl TryFrom<String> for PermissionCode {
    type Error = EesaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionCode> for String {
    fn from(code: PermissionCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_parses_plain_codes() {
        let code = PermissionCode::new(ResourceType::AcademicResource, Action::Change);
        assert_eq!(code.to_string(), "change_academicresource");
        assert_eq!("change_academicresource".parse::<PermissionCode>().unwrap(), code);
    }

    #[test]
    fn parses_qualified_codes() {
        let code: PermissionCode = "academics.add_note".parse().unwrap();
        assert_eq!(code, PermissionCode::new(ResourceType::Note, Action::Add));
        assert_eq!(code.qualified(), "academics.add_note");
    }

    #[test]
    fn rejects_mismatched_app_label() {
        assert!("events.add_note".parse::<PermissionCode>().is_err());
    }

    #[test]
    fn rejects_unknown_parts() {
        assert!("publish_note".parse::<PermissionCode>().is_err());
        assert!("view_spaceship".parse::<PermissionCode>().is_err());
        assert!("viewnote".parse::<PermissionCode>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let code = PermissionCode::new(ResourceType::Reviewer, Action::Add);
        let json = serde_json::to_value(code).unwrap();
        assert_eq!(json, serde_json::json!("add_reviewer"));
        let back: PermissionCode = serde_json::from_value(json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn table_names_are_unique() {
        for a in ResourceType::ALL {
            assert_eq!(ResourceType::from_table(a.table()), Some(a));
        }
    }
}
