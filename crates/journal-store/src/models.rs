//! Row types persisted in the `journal_entries` table.

use chrono::{DateTime, Utc};
use journal_shared::{CalendarDate, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JournalRecord
// ---------------------------------------------------------------------------

/// One user's conversation for one calendar day.
///
/// Unique on `(user_id, date)`. The whole conversation is rewritten on every
/// save, so there is no partial update path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub date: CalendarDate,
    /// Stored payload, interpreted according to `format`.
    pub messages: String,
    #[serde(default)]
    pub format: PayloadFormat,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a row's `messages` column was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Envelope text produced by the codec. Opaque to the store.
    #[default]
    Envelope,
    /// Bare conversation JSON array written by clients that predate
    /// envelopes. Replaced by an envelope on the next save of that day.
    PlainJson,
}

// ---------------------------------------------------------------------------
// NewEntry
// ---------------------------------------------------------------------------

/// Input to an upsert. `created_at` is set by the store on first insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub user_id: UserId,
    pub date: CalendarDate,
    pub messages: String,
    pub updated_at: DateTime<Utc>,
}

impl NewEntry {
    pub fn now(user_id: UserId, date: CalendarDate, messages: String) -> Self {
        Self {
            user_id,
            date,
            messages,
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Change notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Upserted,
    Deleted,
}

/// Payload-free notice that a user's rows changed. Receivers re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub user_id: UserId,
    /// `None` when the change spans every date (bulk delete).
    pub date: Option<CalendarDate>,
    pub kind: ChangeKind,
}
