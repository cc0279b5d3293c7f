//! Gallery images.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload, require_title};
use crate::error::{EesaError, EesaResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItemPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_featured: bool,
    pub is_public: bool,
}

impl RecordPayload for GalleryItemPayload {
    const KIND: ResourceType = ResourceType::GalleryItem;
    const OWNER_FIELD: OwnerField = OwnerField::UploadedBy;
    const APPROVABLE: bool = false;

    fn describe(&self) -> String {
        self.title.clone()
    }

    fn is_private(&self) -> bool {
        !self.is_public
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if self.image.trim().is_empty() {
            return Err(EesaError::validation("image", "an image reference is required"));
        }
        Ok(())
    }
}

pub type GalleryItem = Record<GalleryItemPayload>;
