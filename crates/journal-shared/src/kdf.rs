use sha2::{Digest, Sha256};

use crate::constants::{KDF_CONTEXT_ENVELOPE_KEY, KEY_SALT_PREFIX, SYMMETRIC_KEY_SIZE};
use crate::types::UserId;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// Per-user key material: lowercase hex SHA-256 of `user_id || salt`.
///
/// Anyone who knows the user id can recompute it. It keeps stored rows from
/// being casually readable, nothing more.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// 256-bit key for the v2 AEAD, derived from the hex material with
    /// BLAKE3 domain separation.
    pub fn cipher_key(&self) -> SymmetricKey {
        let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_ENVELOPE_KEY);
        hasher.update(self.0.as_bytes());
        let hash = hasher.finalize();
        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        key.copy_from_slice(&hash.as_bytes()[..SYMMETRIC_KEY_SIZE]);
        key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

pub fn derive_key(user_id: &UserId) -> KeyMaterial {
    let salt = format!("{KEY_SALT_PREFIX}{user_id}");
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(salt.as_bytes());
    KeyMaterial(hex::encode(hasher.finalize()))
}
