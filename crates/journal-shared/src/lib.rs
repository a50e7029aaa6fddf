//! # journal-shared
//!
//! Data model and the at-rest codec for journal records.
//!
//! A day's [`Conversation`] is wrapped into a text envelope by
//! [`envelope::Codec`] before it leaves the device. The envelope key is a pure
//! function of the user id (see [`kdf`]), so no secret is ever stored or sent.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod types;

pub use envelope::Codec;
pub use error::CodecError;
pub use kdf::{derive_key, KeyMaterial};
pub use types::{CalendarDate, Conversation, EnvelopeVersion, Message, UserId};
