//! Day metadata override model

use serde::{Deserialize, Serialize};

use super::check_day_index;

/// User edit of a day's descriptive focus text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMetaOverride {
    #[serde(rename = "dayIndex")]
    pub day_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl DayMetaOverride {
    pub fn validate(&self) -> crate::Result<()> {
        check_day_index(self.day_index)
    }
}
