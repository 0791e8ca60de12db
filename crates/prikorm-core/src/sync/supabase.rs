//! Remote slot backed by a Supabase (PostgREST) table.
//!
//! Expected table shape:
//!
//! ```sql
//! create table family_state (
//!     family_code text primary key,
//!     payload jsonb not null,
//!     updated_at timestamptz not null default now()
//! );
//! ```

use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RemoteConfig;

use super::remote::{RemoteError, RemoteRecord, RemoteResult, RemoteStore};
use super::Snapshot;

#[derive(Clone)]
pub struct SupabaseRemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for SupabaseRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseRemoteStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SupabaseRemoteStore {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn select_url(&self, family_code: &str) -> String {
        format!(
            "{}?family_code=eq.{}&select=payload,updated_at",
            self.config.rest_endpoint(),
            urlencoding::encode(family_code)
        )
    }

    fn upsert_url(&self) -> String {
        format!("{}?on_conflict=family_code", self.config.rest_endpoint())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
            .header("Accept", "application/json")
    }
}

impl RemoteStore for SupabaseRemoteStore {
    async fn fetch_snapshot(&self, family_code: &str) -> RemoteResult<Option<RemoteRecord>> {
        let response = self
            .authorized(self.client.get(self.select_url(family_code)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let rows = response.json::<Vec<SlotRow>>().await?;
        rows.into_iter().next().map(SlotRow::into_record).transpose()
    }

    async fn put_snapshot(
        &self,
        family_code: &str,
        snapshot: &Snapshot,
        updated_at: i64,
    ) -> RemoteResult<i64> {
        let payload = serde_json::to_value(snapshot)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let body = [UpsertRow {
            family_code,
            payload,
            updated_at: format_timestamp(updated_at)?,
        }];

        let response = self
            .authorized(self.client.post(self.upsert_url()))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let rows = response.json::<Vec<SlotRow>>().await?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_record()?.updated_at),
            None => Ok(updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    family_code: &'a str,
    payload: Value,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct SlotRow {
    payload: Value,
    updated_at: Value,
}

impl SlotRow {
    fn into_record(self) -> RemoteResult<RemoteRecord> {
        Ok(RemoteRecord {
            updated_at: parse_timestamp(&self.updated_at)?,
            payload: self.payload,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Accept either a timestamptz string or a number of Unix milliseconds.
fn parse_timestamp(value: &Value) -> RemoteResult<i64> {
    match value {
        Value::Number(number) => number.as_i64().ok_or_else(|| {
            RemoteError::InvalidPayload(format!("updated_at out of range: {number}"))
        }),
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|timestamp| timestamp.timestamp_millis())
            .map_err(|error| {
                RemoteError::InvalidPayload(format!("invalid updated_at {raw:?}: {error}"))
            }),
        other => Err(RemoteError::InvalidPayload(format!(
            "unexpected updated_at value: {other}"
        ))),
    }
}

fn format_timestamp(millis: i64) -> RemoteResult<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|timestamp| timestamp.to_rfc3339())
        .ok_or_else(|| {
            RemoteError::InvalidPayload(format!("timestamp out of range: {millis}"))
        })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", crate::util::compact_text(trimmed), status.as_u16())
    }
}
