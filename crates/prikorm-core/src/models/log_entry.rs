//! Feeding log entry model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{check_day_index, check_time_label};
use crate::util::normalize_text_option;

/// Observed reaction to a feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Ok,
    Rash,
    Tummy,
    Stool,
    Other,
}

impl Reaction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rash => "rash",
            Self::Tummy => "tummy",
            Self::Stool => "stool",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reaction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "rash" => Ok(Self::Rash),
            "tummy" => Ok(Self::Tummy),
            "stool" => Ok(Self::Stool),
            "other" => Ok(Self::Other),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown reaction '{other}'"
            ))),
        }
    }
}

/// Natural key of a log entry: one slot per (day, date, time of day).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey {
    pub day_index: u32,
    pub date: NaiveDate,
    pub time: String,
}

impl LogKey {
    pub fn new(day_index: u32, date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            day_index,
            date,
            time: time.into(),
        }
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.day_index, self.date, self.time)
    }
}

/// One feeding occurrence on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "dayIndex")]
    pub day_index: u32,
    #[serde(rename = "dateISO")]
    pub date: NaiveDate,
    pub time: String,
    /// Plan text shown for this slot when the entry was created
    #[serde(rename = "planText", default, skip_serializing_if = "Option::is_none")]
    pub plan_text: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// Free-form quantity, e.g. "40 g"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Last modification (Unix ms)
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl LogEntry {
    /// Create an empty (not done) entry for a slot.
    pub fn new(key: LogKey, updated_at: i64) -> Self {
        Self {
            day_index: key.day_index,
            date: key.date,
            time: key.time,
            plan_text: None,
            done: false,
            amount: None,
            reaction: None,
            note: None,
            updated_at,
        }
    }

    pub fn key(&self) -> LogKey {
        LogKey::new(self.day_index, self.date, self.time.clone())
    }

    pub fn validate(&self) -> crate::Result<()> {
        check_day_index(self.day_index)?;
        check_time_label(&self.time)
    }
}

/// Partial update of the detail fields of a log entry.
///
/// `None` leaves a field untouched. Empty text clears `amount`/`note`;
/// `Some(None)` clears the reaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDetails {
    pub done: Option<bool>,
    pub amount: Option<String>,
    pub reaction: Option<Option<Reaction>>,
    pub note: Option<String>,
}

impl LogDetails {
    pub const fn is_empty(&self) -> bool {
        self.done.is_none()
            && self.amount.is_none()
            && self.reaction.is_none()
            && self.note.is_none()
    }

    pub(crate) fn apply_to(self, entry: &mut LogEntry) {
        if let Some(done) = self.done {
            entry.done = done;
        }
        if let Some(amount) = self.amount {
            entry.amount = normalize_text_option(Some(amount));
        }
        if let Some(reaction) = self.reaction {
            entry.reaction = reaction;
        }
        if let Some(note) = self.note {
            entry.note = normalize_text_option(Some(note));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    #[test]
    fn log_entry_uses_wire_field_names() {
        let mut entry = LogEntry::new(LogKey::new(3, date("2024-01-05"), "07:00"), 100);
        entry.reaction = Some(Reaction::Tummy);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dayIndex": 3,
                "dateISO": "2024-01-05",
                "time": "07:00",
                "done": false,
                "reaction": "tummy",
                "updatedAt": 100
            })
        );
    }

    #[test]
    fn log_entry_defaults_missing_optional_fields() {
        let entry: LogEntry = serde_json::from_value(serde_json::json!({
            "id": 42,
            "dayIndex": 1,
            "dateISO": "2024-02-01",
            "time": "12:00"
        }))
        .unwrap();

        assert!(!entry.done);
        assert_eq!(entry.updated_at, 0);
        assert_eq!(entry.amount, None);
    }

    #[test]
    fn validate_rejects_day_zero_and_blank_time() {
        let entry = LogEntry::new(LogKey::new(0, date("2024-01-01"), "07:00"), 1);
        assert!(entry.validate().is_err());

        let entry = LogEntry::new(LogKey::new(1, date("2024-01-01"), "  "), 1);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn details_patch_clears_with_empty_text() {
        let mut entry = LogEntry::new(LogKey::new(1, date("2024-01-01"), "07:00"), 1);
        entry.amount = Some("40 g".to_string());
        entry.reaction = Some(Reaction::Rash);

        LogDetails {
            amount: Some("  ".to_string()),
            reaction: Some(None),
            note: Some(" ate well ".to_string()),
            ..LogDetails::default()
        }
        .apply_to(&mut entry);

        assert_eq!(entry.amount, None);
        assert_eq!(entry.reaction, None);
        assert_eq!(entry.note.as_deref(), Some("ate well"));
    }

    #[test]
    fn reaction_parses_case_insensitively() {
        assert_eq!("Stool".parse::<Reaction>().unwrap(), Reaction::Stool);
        assert!("hiccups".parse::<Reaction>().is_err());
    }
}
