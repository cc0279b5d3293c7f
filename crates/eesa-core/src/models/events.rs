//! Department events.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::permission::ResourceType;
use super::record::{OwnerField, Record, RecordPayload, require_title};
use crate::error::{EesaError, EesaResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub venue: Option<String>,
    pub max_participants: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl RecordPayload for EventPayload {
    const KIND: ResourceType = ResourceType::Event;
    const OWNER_FIELD: OwnerField = OwnerField::CreatedBy;
    const APPROVABLE: bool = false;

    fn describe(&self) -> String {
        format!("{} ({})", self.title, self.date)
    }

    fn validate(&self) -> EesaResult<()> {
        require_title(&self.title, 200)?;
        if self.max_participants == Some(0) {
            return Err(EesaError::validation(
                "max_participants",
                "must be positive when set",
            ));
        }
        Ok(())
    }
}

pub type Event = Record<EventPayload>;
