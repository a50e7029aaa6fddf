//! Backend wrapper for exercising failure and pre-envelope paths.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use journal_shared::{CalendarDate, UserId};
use journal_store::{
    ChangeNotice, JournalBackend, JournalRecord, NewEntry, PayloadFormat, Result, SqliteBackend,
    StoreError,
};
use tokio::sync::broadcast;
use uuid::Uuid;

/// In-memory SQLite backend that can refuse reads and can hold rows whose
/// `messages` column is a bare conversation array.
pub struct ScriptedBackend {
    inner: SqliteBackend,
    fail_fetches: AtomicBool,
    plain_rows: Mutex<HashMap<(UserId, CalendarDate), String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            inner: SqliteBackend::open_in_memory().unwrap(),
            fail_fetches: AtomicBool::new(false),
            plain_rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &SqliteBackend {
        &self.inner
    }

    /// While set, every `fetch_entry` answers 503.
    pub fn fail_fetches(&self, on: bool) {
        self.fail_fetches.store(on, Ordering::SeqCst);
    }

    pub fn seed_plain(&self, user_id: &UserId, date: CalendarDate, json: &str) {
        self.plain_rows
            .lock()
            .unwrap()
            .insert((user_id.clone(), date), json.to_string());
    }

    pub fn has_plain(&self, user_id: &UserId, date: CalendarDate) -> bool {
        self.plain_rows
            .lock()
            .unwrap()
            .contains_key(&(user_id.clone(), date))
    }
}

#[async_trait]
impl JournalBackend for ScriptedBackend {
    async fn upsert_entry(&self, entry: NewEntry) -> Result<()> {
        self.plain_rows
            .lock()
            .unwrap()
            .remove(&(entry.user_id.clone(), entry.date));
        self.inner.upsert_entry(entry).await
    }

    async fn fetch_entry(
        &self,
        user_id: &UserId,
        date: CalendarDate,
    ) -> Result<Option<JournalRecord>> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let plain = self
            .plain_rows
            .lock()
            .unwrap()
            .get(&(user_id.clone(), date))
            .cloned();
        if let Some(messages) = plain {
            return Ok(Some(JournalRecord {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                date,
                messages,
                format: PayloadFormat::PlainJson,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }));
        }
        self.inner.fetch_entry(user_id, date).await
    }

    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<CalendarDate>> {
        let mut dates = self.inner.list_dates(user_id).await?;
        dates.extend(
            self.plain_rows
                .lock()
                .unwrap()
                .keys()
                .filter(|(u, _)| u == user_id)
                .map(|(_, d)| *d),
        );
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<u64> {
        let plain = {
            let mut rows = self.plain_rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|(u, _), _| u != user_id);
            (before - rows.len()) as u64
        };
        Ok(plain + self.inner.delete_all(user_id).await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.subscribe()
    }
}
