//! # journal-client
//!
//! The journal as the user sees it: a store scoped to the signed-in user,
//! today's chat session, the history list, and change-driven refreshes.

pub mod auth;
pub mod config;
pub mod generator;
pub mod history;
pub mod session;
pub mod store;
pub mod watch;

mod error;

pub use auth::{AuthProvider, GoTrueClient, Session, SessionAuth};
pub use config::{AppConfig, BackendKind, CompletionConfig};
pub use error::{ConfigError, JournalError, Result};
pub use generator::ResponseGenerator;
pub use history::{load_history, JournalPreview};
pub use session::DaySession;
pub use store::JournalStore;
pub use watch::{Refresh, Refresher};
