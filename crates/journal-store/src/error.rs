use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Transport failure talking to the hosted store.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosted store answered with a non-success status.
    #[error("Remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A stored row could not be mapped back to a record.
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// The local connection mutex was poisoned by a panicking writer.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
