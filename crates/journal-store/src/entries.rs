//! CRUD operations for [`JournalRecord`] rows.

use chrono::{DateTime, Utc};
use journal_shared::{CalendarDate, UserId};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{JournalRecord, NewEntry, PayloadFormat};

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert the day's record or replace its `messages` and `updated_at`.
    ///
    /// One statement, so concurrent saves for the same `(user_id, date)`
    /// never produce two rows; the last commit wins. `id` and `created_at`
    /// of an existing row are kept.
    pub fn upsert_entry(&self, entry: &NewEntry) -> Result<()> {
        self.conn().execute(
            "INSERT INTO journal_entries (id, user_id, date, messages, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, date) DO UPDATE SET
                 messages   = excluded.messages,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                entry.user_id.as_str(),
                entry.date.to_string(),
                entry.messages,
                entry.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete every record of `user_id`. Returns the number of rows removed.
    pub fn delete_entries_for_user(&self, user_id: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM journal_entries WHERE user_id = ?1",
            params![user_id.as_str()],
        )?;
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_entry(&self, user_id: &UserId, date: CalendarDate) -> Result<Option<JournalRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT id, user_id, date, messages, created_at, updated_at
                 FROM journal_entries
                 WHERE user_id = ?1 AND date = ?2",
                params![user_id.as_str(), date.to_string()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Dates that have a record for `user_id`, newest first.
    pub fn list_entry_dates(&self, user_id: &UserId) -> Result<Vec<CalendarDate>> {
        let mut stmt = self.conn().prepare(
            "SELECT date
             FROM journal_entries
             WHERE user_id = ?1
             ORDER BY date DESC",
        )?;

        let rows = stmt.query_map(params![user_id.as_str()], |row| row.get::<_, String>(0))?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(CalendarDate::parse(&row?)?);
        }
        Ok(dates)
    }

    pub fn count_entries(&self, user_id: &UserId) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM journal_entries WHERE user_id = ?1",
            params![user_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Overwrite a stored envelope verbatim. Only meant for repair tooling and
    /// corruption tests; normal writes go through [`Database::upsert_entry`].
    pub fn replace_raw_messages(
        &self,
        user_id: &UserId,
        date: CalendarDate,
        messages: &str,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE journal_entries SET messages = ?3 WHERE user_id = ?1 AND date = ?2",
            params![user_id.as_str(), date.to_string(), messages],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
}

/// Map a `rusqlite::Row` to a [`JournalRecord`].
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalRecord> {
    let id_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let date_str: String = row.get(2)?;
    let messages: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
    let user_id = UserId::new(user_str)
        .ok_or_else(|| conversion_error(1, StoreError::MalformedRow("empty user_id".into())))?;
    let date = CalendarDate::parse(&date_str).map_err(|e| conversion_error(2, e))?;
    let created_at = parse_timestamp(&created_str).map_err(|e| conversion_error(4, e))?;
    let updated_at = parse_timestamp(&updated_str).map_err(|e| conversion_error(5, e))?;

    Ok(JournalRecord {
        id,
        user_id,
        date,
        messages,
        format: PayloadFormat::Envelope,
        created_at,
        updated_at,
    })
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
