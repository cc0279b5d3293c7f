//! Management group templates.
//!
//! Each template names a group and the full set of permissions it
//! should carry. Bootstrapping resets existing groups to exactly the
//! template set.

use std::collections::BTreeSet;

use eesa_core::models::permission::{PermissionCode, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: BTreeSet<PermissionCode>,
}

impl GroupTemplate {
    fn full_access(
        name: &'static str,
        description: &'static str,
        resource_types: &[ResourceType],
    ) -> Self {
        let permissions = resource_types
            .iter()
            .flat_map(|rt| PermissionCode::full_access(*rt))
            .collect();
        Self {
            name,
            description,
            permissions,
        }
    }
}

/// The standard management groups of the portal.
pub fn management_groups() -> Vec<GroupTemplate> {
    vec![
        GroupTemplate::full_access(
            "Alumni Management",
            "Maintains and verifies the alumni directory",
            &[ResourceType::Alumni],
        ),
        GroupTemplate::full_access(
            "Academic Management",
            "Curates subjects, notes, academic resources and projects",
            &[
                ResourceType::Subject,
                ResourceType::Note,
                ResourceType::AcademicResource,
                ResourceType::Project,
            ],
        ),
        GroupTemplate::full_access(
            "Events Management",
            "Runs the events calendar",
            &[ResourceType::Event],
        ),
        GroupTemplate::full_access(
            "Placements & Careers Management",
            "Publishes placement drives",
            &[ResourceType::PlacementDrive],
        ),
        GroupTemplate::full_access(
            "Gallery Management",
            "Moderates the photo gallery",
            &[ResourceType::GalleryItem],
        ),
        GroupTemplate::full_access(
            "Student Management",
            "Maintains student records and peer reviewer assignments",
            &[ResourceType::Student, ResourceType::Reviewer],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use eesa_core::models::permission::Action;

    #[test]
    fn template_names_are_unique() {
        let templates = management_groups();
        let names: BTreeSet<_> = templates.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), templates.len());
    }

    #[test]
    fn academic_group_can_approve_notes() {
        let academic = management_groups()
            .into_iter()
            .find(|t| t.name == "Academic Management")
            .unwrap();
        assert!(
            academic
                .permissions
                .contains(&PermissionCode::new(ResourceType::Note, Action::Change))
        );
        assert_eq!(academic.permissions.len(), 16);
    }

    #[test]
    fn no_template_touches_identity_or_audit() {
        for template in management_groups() {
            for code in &template.permissions {
                assert!(!matches!(
                    code.resource_type,
                    ResourceType::User | ResourceType::Group | ResourceType::AuditLog
                ));
            }
        }
    }
}
