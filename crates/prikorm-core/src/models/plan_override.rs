//! Plan override model

use serde::{Deserialize, Serialize};

use super::{check_day_index, check_time_label};

/// User edit of the scheduled plan text for one (day, time of day) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOverride {
    #[serde(rename = "dayIndex")]
    pub day_index: u32,
    pub time: String,
    #[serde(rename = "planText", default)]
    pub plan_text: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl PlanOverride {
    pub fn key(&self) -> (u32, String) {
        (self.day_index, self.time.clone())
    }

    pub fn validate(&self) -> crate::Result<()> {
        check_day_index(self.day_index)?;
        check_time_label(&self.time)
    }
}
