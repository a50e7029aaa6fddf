//! # journal-store
//!
//! Persistence for journal records: one row per `(user_id, date)`.
//!
//! Records are written through the [`JournalBackend`] seam. Two backends ship
//! here: [`SqliteBackend`] for on-device storage and tests, and
//! [`RestBackend`] for the hosted relational store (PostgREST). Both treat
//! the `messages` column as an opaque envelope string produced by
//! `journal_shared::Codec`; nothing in this crate sees plaintext.

pub mod backend;
pub mod database;
pub mod entries;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod remote;

mod error;

pub use backend::{JournalBackend, SqliteBackend};
pub use database::Database;
pub use error::{Result, StoreError};
pub use feed::ChangeFeed;
pub use models::*;
pub use remote::{RemoteConfig, RestBackend};
