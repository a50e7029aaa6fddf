//! Per-day summaries for the history list.

use futures::future::join_all;
use journal_shared::constants::PREVIEW_CHARS;
use journal_shared::{CalendarDate, Conversation};
use journal_store::JournalBackend;
use serde::Serialize;

use crate::auth::AuthProvider;
use crate::store::JournalStore;

pub const EMPTY_PREVIEW: &str = "No entries for this day";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalPreview {
    pub date: CalendarDate,
    /// Start of the first user message of the day.
    pub preview: String,
    /// Number of user messages.
    pub message_count: usize,
}

impl JournalPreview {
    pub fn from_conversation(date: CalendarDate, conversation: &Conversation) -> Self {
        let preview = match conversation.first_user_message() {
            Some(message) => truncate_preview(&message.text),
            None => EMPTY_PREVIEW.to_string(),
        };
        Self {
            date,
            preview,
            message_count: conversation.user_message_count(),
        }
    }
}

/// Previews for every journaled day, newest first. Days that fail to load
/// show up as empty previews.
pub async fn load_history<B, A>(store: &JournalStore<B, A>) -> Vec<JournalPreview>
where
    B: JournalBackend,
    A: AuthProvider,
{
    let mut dates = store.list_dates().await;
    dates.sort_unstable_by(|a, b| b.cmp(a));

    join_all(dates.into_iter().map(|date| async move {
        let conversation = store.load_by_date(date).await;
        JournalPreview::from_conversation(date, &conversation)
    }))
    .await
}

fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
