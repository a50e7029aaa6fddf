//! The seam between journal logic and wherever rows actually live.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use journal_shared::{CalendarDate, UserId};
use tokio::sync::broadcast;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::feed::ChangeFeed;
use crate::models::{ChangeNotice, JournalRecord, NewEntry};

/// Row storage for journal records, one row per `(user_id, date)`.
///
/// Implementations must make [`upsert_entry`](JournalBackend::upsert_entry)
/// atomic at the row level: concurrent upserts of the same key leave exactly
/// one row holding the last committed payload.
#[async_trait]
pub trait JournalBackend: Send + Sync {
    async fn upsert_entry(&self, entry: NewEntry) -> Result<()>;

    async fn fetch_entry(&self, user_id: &UserId, date: CalendarDate)
        -> Result<Option<JournalRecord>>;

    /// Dates holding a record for `user_id`, newest first.
    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<CalendarDate>>;

    /// Remove every record of `user_id`; zero rows is not an error.
    async fn delete_all(&self, user_id: &UserId) -> Result<u64>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice>;
}

/// On-device backend over the SQLite [`Database`].
#[derive(Clone)]
pub struct SqliteBackend {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            feed: ChangeFeed::default(),
        }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Database::open_at(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self> {
        Database::open_in_memory().map(Self::new)
    }

    /// Direct handle for maintenance work. Do not hold across an `.await`.
    pub fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl JournalBackend for SqliteBackend {
    async fn upsert_entry(&self, entry: NewEntry) -> Result<()> {
        self.lock()?.upsert_entry(&entry)?;
        tracing::debug!(user = %entry.user_id.short(), date = %entry.date, "entry upserted");
        self.feed.upserted(&entry.user_id, entry.date);
        Ok(())
    }

    async fn fetch_entry(
        &self,
        user_id: &UserId,
        date: CalendarDate,
    ) -> Result<Option<JournalRecord>> {
        self.lock()?.get_entry(user_id, date)
    }

    async fn list_dates(&self, user_id: &UserId) -> Result<Vec<CalendarDate>> {
        self.lock()?.list_entry_dates(user_id)
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<u64> {
        let removed = self.lock()?.delete_entries_for_user(user_id)? as u64;
        tracing::info!(user = %user_id.short(), removed, "entries cleared");
        self.feed.cleared(user_id);
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_upserts_leave_one_row() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let date = CalendarDate::parse("2024-05-01").unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let b = backend.clone();
            handles.push(tokio::spawn(async move {
                b.upsert_entry(NewEntry::now(uid("u1"), date, format!("payload-{i}")))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(backend.lock().unwrap().count_entries(&uid("u1")).unwrap(), 1);
        let record = backend.fetch_entry(&uid("u1"), date).await.unwrap().unwrap();
        assert!(record.messages.starts_with("payload-"));
    }

    #[tokio::test]
    async fn test_writes_publish_notices() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let mut rx = backend.subscribe();
        let date = CalendarDate::parse("2024-05-01").unwrap();

        backend
            .upsert_entry(NewEntry::now(uid("u1"), date, "x".into()))
            .await
            .unwrap();
        backend.delete_all(&uid("u1")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Upserted);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Deleted);
    }

    #[tokio::test]
    async fn test_file_backed_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let date = CalendarDate::parse("2024-05-01").unwrap();

        {
            let backend = SqliteBackend::open_at(&path).unwrap();
            backend
                .upsert_entry(NewEntry::now(uid("u1"), date, "kept".into()))
                .await
                .unwrap();
        }

        let backend = SqliteBackend::open_at(&path).unwrap();
        let record = backend.fetch_entry(&uid("u1"), date).await.unwrap().unwrap();
        assert_eq!(record.messages, "kept");
    }
}
