//! Snapshot codec: the versioned wire envelope exchanged with the remote slot.

use chrono::{DateTime, NaiveDate};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::{
    keys, DayMetaRepository, LogRepository, PlanOverrideRepository, SettingsRepository,
    SqliteDayMetaRepository, SqliteLogRepository, SqlitePlanOverrideRepository,
    SqliteSettingsRepository,
};
use crate::error::{Error, Result};
use crate::models::{DayMetaOverride, LogEntry, PlanOverride};

/// Format version written into every exported snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full exported state of the three entity tables plus the plan dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub version: u32,
    /// Export time (Unix ms)
    #[serde(rename = "exportedAt")]
    pub exported_at: i64,
    #[serde(rename = "startDateISO", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "selectedDateISO", skip_serializing_if = "Option::is_none")]
    pub selected_date: Option<NaiveDate>,
    pub logs: Vec<LogEntry>,
    #[serde(rename = "planOverrides")]
    pub plan_overrides: Vec<PlanOverride>,
    #[serde(rename = "dayMeta")]
    pub day_meta: Vec<DayMetaOverride>,
}

impl Snapshot {
    /// Empty snapshot stamped with the current format version.
    pub fn empty(exported_at: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at,
            ..Self::default()
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON document through [`import_snapshot`].
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        import_snapshot(&value)
    }
}

/// Validate and decode a raw remote payload.
///
/// Only a payload that is not a JSON object is rejected. Missing or
/// non-array entity fields decode as empty arrays, records that fail to
/// decode are dropped individually, and unknown fields are ignored.
pub fn import_snapshot(raw: &Value) -> Result<Snapshot> {
    let Value::Object(envelope) = raw else {
        return Err(Error::MalformedPayload(format!(
            "expected a JSON object, got {}",
            json_type_name(raw)
        )));
    };

    Ok(Snapshot {
        version: read_version(envelope),
        exported_at: envelope.get("exportedAt").map_or(0, read_timestamp),
        start_date: read_date(envelope, "startDateISO"),
        selected_date: read_date(envelope, "selectedDateISO"),
        logs: read_records(envelope, "logs", LogEntry::validate),
        plan_overrides: read_records(envelope, "planOverrides", PlanOverride::validate),
        day_meta: read_records(envelope, "dayMeta", DayMetaOverride::validate),
    })
}

/// Read every table in full, plus the two plan dates.
pub fn read_snapshot(conn: &Connection, exported_at: i64) -> Result<Snapshot> {
    let settings = SqliteSettingsRepository::new(conn);
    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        exported_at,
        start_date: settings.get_date(keys::START_DATE)?,
        selected_date: settings.get_date(keys::SELECTED_DATE)?,
        logs: SqliteLogRepository::new(conn).list()?,
        plan_overrides: SqlitePlanOverrideRepository::new(conn).list()?,
        day_meta: SqliteDayMetaRepository::new(conn).list()?,
    })
}

fn read_version(envelope: &Map<String, Value>) -> u32 {
    envelope
        .get("version")
        .or_else(|| envelope.get("v"))
        .and_then(Value::as_u64)
        .and_then(|version| u32::try_from(version).ok())
        .unwrap_or(SNAPSHOT_VERSION)
}

/// Epoch milliseconds, or an RFC 3339 string as older clients wrote it.
fn read_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or_default(),
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|parsed| parsed.timestamp_millis())
            .unwrap_or_default(),
        _ => 0,
    }
}

fn read_date(envelope: &Map<String, Value>, field: &str) -> Option<NaiveDate> {
    let text = envelope.get(field)?.as_str()?;
    match text.trim().parse() {
        Ok(date) => Some(date),
        Err(error) => {
            tracing::warn!("Ignoring unparsable {field} '{text}': {error}");
            None
        }
    }
}

fn read_records<T, V>(envelope: &Map<String, Value>, field: &str, validate: V) -> Vec<T>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<()>,
{
    let items = match envelope.get(field) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(
                "Snapshot field '{field}' is {} instead of an array; treating as empty",
                json_type_name(other)
            );
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let decoded = serde_json::from_value::<T>(item.clone())
            .map_err(Error::from)
            .and_then(|record| validate(&record).map(|()| record));
        match decoded {
            Ok(record) => records.push(record),
            Err(error) => tracing::warn!("Dropping {field}[{index}] from snapshot: {error}"),
        }
    }
    records
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogKey, Reaction};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn import_rejects_non_object_payloads() {
        for raw in [json!(null), json!([1, 2]), json!("snapshot"), json!(7)] {
            let error = import_snapshot(&raw).unwrap_err();
            assert!(matches!(error, Error::MalformedPayload(_)), "{raw}");
        }
    }

    #[test]
    fn import_defaults_missing_and_malformed_arrays() {
        let snapshot = import_snapshot(&json!({
            "version": 1,
            "exportedAt": 5,
            "logs": [
                {"dayIndex": 3, "dateISO": "2024-01-05", "time": "07:00", "done": true, "updatedAt": 200}
            ],
            "dayMeta": {"not": "an array"}
        }))
        .unwrap();

        assert_eq!(snapshot.logs.len(), 1);
        assert!(snapshot.plan_overrides.is_empty());
        assert!(snapshot.day_meta.is_empty());
        assert_eq!(snapshot.exported_at, 5);
    }

    #[test]
    fn import_drops_only_the_broken_records() {
        let snapshot = import_snapshot(&json!({
            "logs": [
                {"dayIndex": 0, "dateISO": "2024-01-05", "time": "07:00", "updatedAt": 1},
                {"dayIndex": 1, "dateISO": "not a date", "time": "07:00", "updatedAt": 1},
                {"dayIndex": 1, "dateISO": "2024-01-05", "time": "07:00", "reaction": "hiccups"},
                {"dayIndex": 1, "dateISO": "2024-01-05", "time": "11:00", "reaction": "ok", "extra": true}
            ],
            "planOverrides": [
                {"dayIndex": 2, "time": "12:00", "planText": "Pear", "updatedAt": 4},
                "garbage"
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.logs.len(), 1);
        assert_eq!(snapshot.logs[0].time, "11:00");
        assert_eq!(snapshot.logs[0].reaction, Some(Reaction::Ok));
        assert_eq!(snapshot.plan_overrides.len(), 1);
    }

    #[test]
    fn import_accepts_legacy_envelope() {
        let snapshot = import_snapshot(&json!({
            "v": 1,
            "exportedAt": "2024-01-05T10:00:00.000Z",
            "startDateISO": "2024-01-01",
            "selectedDateISO": "yesterday",
            "logs": [],
            "planOverrides": [],
            "dayMeta": [{"id": 9, "dayIndex": 4, "updatedAt": 1}]
        }))
        .unwrap();

        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.exported_at, 1_704_448_800_000);
        assert_eq!(snapshot.start_date, "2024-01-01".parse().ok());
        assert_eq!(snapshot.selected_date, None);
        assert_eq!(snapshot.day_meta[0].focus, None);
    }

    #[test]
    fn export_then_import_preserves_content() {
        let mut entry = LogEntry::new(LogKey::new(3, "2024-01-05".parse().unwrap(), "07:00"), 100);
        entry.done = true;
        entry.amount = Some("40 g".to_string());
        let snapshot = Snapshot {
            start_date: "2024-01-01".parse().ok(),
            logs: vec![entry],
            plan_overrides: vec![PlanOverride {
                day_index: 5,
                time: "12:00".to_string(),
                plan_text: "A".to_string(),
                updated_at: 300,
            }],
            ..Snapshot::empty(42)
        };

        let wire = snapshot.to_value().unwrap();
        assert_eq!(wire["startDateISO"], json!("2024-01-01"));
        assert!(wire.get("selectedDateISO").is_none());
        assert_eq!(import_snapshot(&wire).unwrap(), snapshot);
    }
}
