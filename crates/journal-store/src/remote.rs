//! Hosted relational store, spoken to over PostgREST.
//!
//! Requests carry the project's anon key as `apikey` and the signed-in user's
//! access token as bearer; row-level security on the server scopes every
//! query to that user. The `user_id=eq.` filters below are still sent so a
//! misconfigured policy cannot widen a read or a delete.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use journal_shared::constants::JOURNAL_TABLE;
use journal_shared::{CalendarDate, UserId};
use reqwest::{Method, Request, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::JournalBackend;
use crate::error::{Result, StoreError};
use crate::feed::ChangeFeed;
use crate::models::{ChangeNotice, JournalRecord, NewEntry, PayloadFormat};

const RECORD_COLUMNS: &str = "id,user_id,date,messages,created_at,updated_at";

/// Connection settings for the hosted project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public anon key; sent as `apikey` on every request.
    pub anon_key: String,
}

impl RemoteConfig {
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.url.trim_end_matches('/'))
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

pub struct RestBackend {
    http: reqwest::Client,
    config: RemoteConfig,
    access_token: Arc<RwLock<Option<String>>>,
    feed: ChangeFeed,
}

impl RestBackend {
    pub fn new(config: RemoteConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: RemoteConfig) -> Self {
        Self {
            http,
            config,
            access_token: Arc::new(RwLock::new(None)),
            feed: ChangeFeed::default(),
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Bearer token used for subsequent requests; `None` falls back to the
    /// anon key.
    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn bearer(&self) -> String {
        let token = match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        token.unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, self.config.rest_url(JOURNAL_TABLE))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
    }

    // ------------------------------------------------------------------
    // Request construction (no I/O)
    // ------------------------------------------------------------------

    fn upsert_request(&self, entry: &NewEntry) -> Result<Request> {
        let row = UpsertRow {
            user_id: entry.user_id.as_str(),
            date: entry.date.to_string(),
            messages: &entry.messages,
            updated_at: entry.updated_at,
        };
        Ok(self
            .request(Method::POST)
            .query(&[("on_conflict", "user_id,date")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .build()?)
    }

    fn fetch_request(&self, user_id: &UserId, date: CalendarDate) -> Result<Request> {
        Ok(self
            .request(Method::GET)
            .query(&[
                ("select", RECORD_COLUMNS.to_string()),
                ("user_id", eq(user_id.as_str())),
                ("date", eq(&date.to_string())),
                ("limit", "1".to_string()),
            ])
            .build()?)
    }

    fn list_request(&self, user_id: &UserId) -> Result<Request> {
        Ok(self
            .request(Method::GET)
            .query(&[
                ("select", "date".to_string()),
                ("user_id", eq(user_id.as_str())),
                ("order", "date.desc".to_string()),
            ])
            .build()?)
    }

    fn delete_request(&self, user_id: &UserId) -> Result<Request> {
        Ok(self
            .request(Method::DELETE)
            .query(&[("user_id", eq(user_id.as_str())), ("select", "id".to_string())])
            .header("Prefer", "return=representation")
            .build()?)
    }
}

#[async_trait]
impl JournalBackend for RestBackend {
    async fn upsert_entry(&self, entry: NewEntry) -> Result<()> {
        let resp = self.http.execute(self.upsert_request(&entry)?).await?;
        check_status(resp).await?;

        tracing::debug!(user = %entry.user_id.short(), date = %entry.date, "remote entry upserted");
        self.feed.upserted(&entry.user_id, entry.date);
        Ok(())
    }

    async fn fetch_entry(
        &self,
        user_id: &UserId,
        date: CalendarDate,
    ) -> Result<Option<JournalRecord>> {
        let resp = self.http.execute(self.fetch_request(user_id, date)?).await?;
        let rows: Vec<RemoteRow> = check_status(resp).await?.json().await?;
        rows.into_iter().next().map(RemoteRow::into_record).transpose()
    }

    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<CalendarDate>> {
        let resp = self.http.execute(self.list_request(user_id)?).await?;
        let rows: Vec<DateRow> = check_status(resp).await?.json().await?;
        rows.iter()
            .map(|r| CalendarDate::parse(&r.date).map_err(StoreError::from))
            .collect()
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<u64> {
        let resp = self.http.execute(self.delete_request(user_id)?).await?;
        let removed: Vec<serde_json::Value> = check_status(resp).await?.json().await?;
        tracing::info!(user = %user_id.short(), removed = removed.len(), "remote entries cleared");
        self.feed.cleared(user_id);
        Ok(removed.len() as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    user_id: &'a str,
    date: String,
    messages: &'a str,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DateRow {
    date: String,
}

#[derive(Debug, Deserialize)]
struct RemoteRow {
    id: Uuid,
    user_id: String,
    date: String,
    messages: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RemoteRow {
    fn into_record(self) -> Result<JournalRecord> {
        let user_id = UserId::new(self.user_id)
            .ok_or_else(|| StoreError::MalformedRow("empty user_id".to_string()))?;
        // The column is jsonb. Envelopes arrive as JSON strings; rows from
        // clients that predate envelopes hold the conversation array itself.
        // Anything else is passed through serialized and rejected by the codec.
        let (messages, format) = match self.messages {
            serde_json::Value::String(s) => (s, PayloadFormat::Envelope),
            array @ serde_json::Value::Array(_) => (array.to_string(), PayloadFormat::PlainJson),
            other => (other.to_string(), PayloadFormat::Envelope),
        };
        Ok(JournalRecord {
            id: self.id,
            user_id,
            date: CalendarDate::parse(&self.date)?,
            messages,
            format,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = %body, "remote store request failed");
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
