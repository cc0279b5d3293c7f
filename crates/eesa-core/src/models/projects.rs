//! Student projects.

use serde::{Deserialize, Serialize};

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload, require_title};
use crate::error::{EesaError, EesaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectCategory {
    Web,
    Mobile,
    Embedded,
    MachineLearning,
    Iot,
    PowerSystems,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub role: Option<String>,
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPayload {
    pub title: String,
    pub description: String,
    pub category: ProjectCategory,
    pub github_url: Option<String>,
    pub demo_url: Option<String>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
}

impl RecordPayload for ProjectPayload {
    const KIND: ResourceType = ResourceType::Project;
    const OWNER_FIELD: OwnerField = OwnerField::CreatedBy;
    const APPROVABLE: bool = false;

    fn describe(&self) -> String {
        self.title.clone()
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if self.description.trim().is_empty() {
            return Err(EesaError::validation("description", "must not be empty"));
        }
        Ok(())
    }
}

pub type Project = Record<ProjectPayload>;
