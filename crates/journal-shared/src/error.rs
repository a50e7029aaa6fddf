use thiserror::Error;

/// Failures of the envelope codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Integrity check failed: data tampered or wrong key")]
    Integrity,
}

impl CodecError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity)
    }
}
