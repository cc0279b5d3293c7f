//! Placement drives.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload, require_title};
use crate::error::{EesaError, EesaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    Internship,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementDrivePayload {
    pub company: String,
    pub title: String,
    pub description: String,
    pub job_type: JobType,
    pub package_lpa: Option<f64>,
    pub registration_start: NaiveDate,
    pub registration_end: NaiveDate,
    pub drive_date: NaiveDate,
    #[serde(default)]
    pub eligible_batches: Vec<u16>,
    #[serde(default)]
    pub is_featured: bool,
}

impl RecordPayload for PlacementDrivePayload {
    const KIND: ResourceType = ResourceType::PlacementDrive;
    const OWNER_FIELD: OwnerField = OwnerField::CreatedBy;
    const APPROVABLE: bool = false;

    fn describe(&self) -> String {
        format!("{} - {}", self.company, self.title)
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if self.registration_end < self.registration_start {
            return Err(EesaError::validation(
                "registration_end",
                "must not precede registration_start",
            ));
        }
        if self.drive_date < self.registration_end {
            return Err(EesaError::validation(
                "drive_date",
                "must not precede registration_end",
            ));
        }
        Ok(())
    }
}

pub type PlacementDrive = Record<PlacementDrivePayload>;
