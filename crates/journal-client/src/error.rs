use journal_shared::CodecError;
use journal_store::StoreError;
use thiserror::Error;

/// Errors surfaced by journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("No authenticated user")]
    AuthenticationRequired,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl JournalError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_integrity())
    }

    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::Codec(CodecError::Decoding(_)))
    }
}

/// Startup configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, JournalError>;
