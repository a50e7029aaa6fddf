//! v001 -- Initial schema creation.
//!
//! Creates `journal_entries`, keyed for upsert on `(user_id, date)`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS journal_entries (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id    TEXT NOT NULL,               -- opaque auth-provider id
    date       TEXT NOT NULL,               -- YYYY-MM-DD, device-local
    messages   TEXT NOT NULL,               -- codec envelope
    created_at TEXT NOT NULL,               -- RFC-3339
    updated_at TEXT NOT NULL,               -- RFC-3339

    UNIQUE (user_id, date)
);

CREATE INDEX IF NOT EXISTS idx_journal_entries_user_date
    ON journal_entries(user_id, date DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
