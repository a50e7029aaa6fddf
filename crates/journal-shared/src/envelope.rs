//! At-rest envelope for a day's conversation.
//!
//! Stored text is `base64(JSON{version?, nonce, data, hash})` where
//! `hash = hex(SHA-256(data || nonce || key))`. Two layouts share that shape:
//!
//! - v1 (no `version` field): `data` is the conversation JSON in the clear and
//!   the hash is the only protection. Written by earlier mobile clients.
//! - v2: `data` is base64 XChaCha20-Poly1305 ciphertext of the same JSON,
//!   bound to the user id as associated data.
//!
//! Every version stays readable; the [`Codec`] only picks what gets written.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::{LEGACY_NONCE_SIZE, NONCE_SIZE};
use crate::error::CodecError;
use crate::kdf::{derive_key, KeyMaterial};
use crate::types::{Conversation, EnvelopeVersion, UserId};

/// Decoded form of the stored text blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    pub nonce: String,
    pub data: String,
    pub hash: String,
}

impl Envelope {
    pub fn to_text(&self) -> Result<String, CodecError> {
        let json = serde_json::to_string(self).map_err(|e| CodecError::Encoding(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let raw = STANDARD
            .decode(text.trim())
            .map_err(|e| CodecError::Decoding(format!("invalid base64: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| CodecError::Decoding(format!("invalid envelope: {e}")))
    }

    pub fn envelope_version(&self) -> Result<EnvelopeVersion, CodecError> {
        match self.version {
            None => Ok(EnvelopeVersion::Legacy),
            Some(v) => EnvelopeVersion::from_byte(v)
                .ok_or_else(|| CodecError::Decoding(format!("unsupported envelope version {v}"))),
        }
    }
}

/// Builds and opens envelopes. Reads every known version, writes `version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    version: EnvelopeVersion,
}

impl Codec {
    pub fn new(version: EnvelopeVersion) -> Self {
        Self { version }
    }

    pub fn encrypt(
        &self,
        conversation: &Conversation,
        user_id: &UserId,
    ) -> Result<String, CodecError> {
        self.seal(conversation, user_id)?.to_text()
    }

    pub fn seal(&self, conversation: &Conversation, user_id: &UserId) -> Result<Envelope, CodecError> {
        let key = derive_key(user_id);
        let plaintext =
            serde_json::to_string(conversation).map_err(|e| CodecError::Encoding(e.to_string()))?;

        let envelope = match self.version {
            EnvelopeVersion::Legacy => {
                let nonce = hex::encode(random_bytes::<LEGACY_NONCE_SIZE>());
                let hash = integrity_hash(&plaintext, &nonce, &key);
                Envelope {
                    version: None,
                    nonce,
                    data: plaintext,
                    hash,
                }
            }
            EnvelopeVersion::Sealed => {
                let nonce_bytes = random_bytes::<NONCE_SIZE>();
                let cipher = XChaCha20Poly1305::new(&key.cipher_key().into());
                let ciphertext = cipher
                    .encrypt(
                        XNonce::from_slice(&nonce_bytes),
                        Payload {
                            msg: plaintext.as_bytes(),
                            aad: user_id.as_str().as_bytes(),
                        },
                    )
                    .map_err(|_| CodecError::Encoding("cipher failure".to_string()))?;

                let nonce = hex::encode(nonce_bytes);
                let data = STANDARD.encode(ciphertext);
                let hash = integrity_hash(&data, &nonce, &key);
                Envelope {
                    version: Some(self.version.as_byte()),
                    nonce,
                    data,
                    hash,
                }
            }
        };
        Ok(envelope)
    }

    pub fn decrypt(&self, text: &str, user_id: &UserId) -> Result<Conversation, CodecError> {
        self.open(&Envelope::from_text(text)?, user_id)
    }

    pub fn open(&self, envelope: &Envelope, user_id: &UserId) -> Result<Conversation, CodecError> {
        let version = envelope.envelope_version()?;
        let key = derive_key(user_id);

        let expected = integrity_hash(&envelope.data, &envelope.nonce, &key);
        if !bool::from(expected.as_bytes().ct_eq(envelope.hash.as_bytes())) {
            return Err(CodecError::Integrity);
        }

        let plaintext = match version {
            EnvelopeVersion::Legacy => envelope.data.clone(),
            EnvelopeVersion::Sealed => open_sealed(envelope, user_id, &key)?,
        };

        serde_json::from_str(&plaintext)
            .map_err(|e| CodecError::Decoding(format!("payload is not a conversation: {e}")))
    }
}

/// Parse a bare conversation array written before envelopes existed. There
/// is nothing to verify; the caller decides which rows may be read this way.
pub fn parse_plain(json: &str) -> Result<Conversation, CodecError> {
    serde_json::from_str(json)
        .map_err(|e| CodecError::Decoding(format!("payload is not a conversation: {e}")))
}

fn open_sealed(envelope: &Envelope, user_id: &UserId, key: &KeyMaterial) -> Result<String, CodecError> {
    let nonce_bytes = hex::decode(&envelope.nonce)
        .map_err(|e| CodecError::Decoding(format!("invalid nonce: {e}")))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CodecError::Decoding(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    let ciphertext = STANDARD
        .decode(&envelope.data)
        .map_err(|e| CodecError::Decoding(format!("invalid ciphertext encoding: {e}")))?;

    let cipher = XChaCha20Poly1305::new(&key.cipher_key().into());
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad: user_id.as_str().as_bytes(),
            },
        )
        .map_err(|_| CodecError::Integrity)?;

    String::from_utf8(plaintext).map_err(|e| CodecError::Decoding(e.to_string()))
}

/// `hex(SHA-256(data || nonce || key))`. The concatenation order is part of
/// the stored format.
pub(crate) fn integrity_hash(data: &str, nonce: &str, key: &KeyMaterial) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(key.as_hex().as_bytes());
    hex::encode(hasher.finalize())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
