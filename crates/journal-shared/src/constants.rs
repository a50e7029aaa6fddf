/// Application name
pub const APP_NAME: &str = "AI Journal";

/// Prefix of the per-user salt fed into key derivation.
/// Changing it makes every stored record unreadable.
pub const KEY_SALT_PREFIX: &str = "AI-Journal-Salt-";

/// Nonce size in bytes for v1 (legacy, hash-only) envelopes
pub const LEGACY_NONCE_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size in bytes (v2 envelopes)
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Envelope format written by earlier mobile clients (no `version` field)
pub const ENVELOPE_VERSION_LEGACY: u8 = 1;

/// Envelope format with an AEAD-sealed payload
pub const ENVELOPE_VERSION_SEALED: u8 = 2;

/// Key derivation context (BLAKE3) for the v2 cipher key
pub const KDF_CONTEXT_ENVELOPE_KEY: &str = "journal-envelope-key-v2";

/// Calendar date key format, device-local
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Remote table holding one row per (user, day)
pub const JOURNAL_TABLE: &str = "journal_entries";

/// Characters of the first user message shown in history previews
pub const PREVIEW_CHARS: usize = 80;
