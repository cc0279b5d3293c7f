//! Alumni directory entries.

use serde::{Deserialize, Serialize};

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload};
use crate::error::{EesaError, EesaResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlumniPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub branch: String,
    pub year_of_admission: u16,
    pub year_of_passout: u16,
    pub current_workplace: Option<String>,
    pub job_title: Option<String>,
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub willing_to_mentor: bool,
}

impl AlumniPayload {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl RecordPayload for AlumniPayload {
    const KIND: ResourceType = ResourceType::Alumni;
    const OWNER_FIELD: OwnerField = OwnerField::CreatedBy;
    const APPROVABLE: bool = true;

    fn describe(&self) -> String {
        format!("{} ({})", self.full_name(), self.year_of_passout)
    }

    fn validate(&self) -> EesaResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(EesaError::validation("name", "first and last name are required"));
        }
        if !self.email.contains('@') {
            return Err(EesaError::validation("email", "not a valid email address"));
        }
        if self.year_of_passout < self.year_of_admission {
            return Err(EesaError::validation(
                "year_of_passout",
                "cannot precede the year of admission",
            ));
        }
        Ok(())
    }
}

pub type Alumni = Record<AlumniPayload>;
