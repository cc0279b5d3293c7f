//! Notes and academic resources.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload, require_title};
use crate::error::{EesaError, EesaResult};

/// A student-uploaded note for a subject. Needs approval before it is
/// visible to anyone but its uploader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotePayload {
    pub title: String,
    pub description: Option<String>,
    pub subject_id: Uuid,
    /// Opaque storage reference.
    pub file: String,
}

impl RecordPayload for NotePayload {
    const KIND: ResourceType = ResourceType::Note;
    const OWNER_FIELD: OwnerField = OwnerField::UploadedBy;
    const APPROVABLE: bool = true;

    fn describe(&self) -> String {
        self.title.clone()
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if self.file.trim().is_empty() {
            return Err(EesaError::validation("file", "a file reference is required"));
        }
        Ok(())
    }
}

pub type Note = Record<NotePayload>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Notes,
    Textbook,
    Pyq,
    Syllabus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicResourcePayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: ResourceCategory,
    pub subject_id: Option<Uuid>,
    pub module_number: Option<u8>,
    pub exam_year: Option<u16>,
    pub author: Option<String>,
    pub file: String,
}

impl RecordPayload for AcademicResourcePayload {
    const KIND: ResourceType = ResourceType::AcademicResource;
    const OWNER_FIELD: OwnerField = OwnerField::UploadedBy;
    const APPROVABLE: bool = true;

    fn describe(&self) -> String {
        self.title.clone()
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if let Some(module) = self.module_number
            && !(1..=6).contains(&module)
        {
            return Err(EesaError::validation(
                "module_number",
                "must be between 1 and 6",
            ));
        }
        if self.file.trim().is_empty() {
            return Err(EesaError::validation("file", "a file reference is required"));
        }
        Ok(())
    }
}

pub type AcademicResource = Record<AcademicResourcePayload>;
