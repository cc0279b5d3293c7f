//! Peer reviewer assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::{Auditable, ObjectRef};
use super::permission::ResourceType;
use super::student::Cohort;

/// Grants a student peer-approval rights over notes from one cohort.
/// At most one active assignment exists per cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerAssignment {
    pub id: Uuid,
    /// User id of the reviewing student.
    pub student_id: Uuid,
    pub cohort: Cohort,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Auditable for ReviewerAssignment {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceType::Reviewer, self.id)
    }

    fn object_repr(&self) -> String {
        format!("Reviewer {} for {}", self.student_id, self.cohort)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewerAssignment {
    pub student_id: Uuid,
    pub cohort: Cohort,
    pub assigned_by: Uuid,
}
