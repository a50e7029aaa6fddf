//! Today's chat: greet on first open, then user message → assistant reply.

use journal_shared::{CalendarDate, Conversation, Message};
use journal_store::JournalBackend;
use tracing::{info, warn};

use crate::auth::AuthProvider;
use crate::error::{JournalError, Result};
use crate::generator::ResponseGenerator;
use crate::store::JournalStore;

pub const GREETING: &str = "Hello! I'm your AI journaling assistant. How are you feeling today? \
I'm here to listen and help you reflect on your thoughts and feelings. 🌟";

pub struct DaySession<B, A> {
    store: JournalStore<B, A>,
    generator: ResponseGenerator,
}

impl<B: JournalBackend, A: AuthProvider> DaySession<B, A> {
    pub fn new(store: JournalStore<B, A>, generator: ResponseGenerator) -> Self {
        if !generator.is_remote() {
            info!("completion API not configured, using fallback responses");
        }
        Self { store, generator }
    }

    pub fn store(&self) -> &JournalStore<B, A> {
        &self.store
    }

    /// Today's conversation. An empty day is seeded with the greeting and
    /// saved; failing to save the greeting is logged and not fatal. A failed
    /// read is returned as is, so a day that merely could not be read is never
    /// overwritten with a greeting.
    pub async fn open_today(&self) -> Result<Conversation> {
        self.open_on(CalendarDate::today()).await
    }

    pub async fn open_on(&self, date: CalendarDate) -> Result<Conversation> {
        let conversation = self.store.try_load_by_date(date).await?;
        if !conversation.is_empty() {
            return Ok(conversation);
        }

        let seeded = Conversation::from(vec![Message::assistant(GREETING)]);
        if let Err(e) = self.store.save_on(date, &seeded).await {
            warn!(%date, error = %e, "Error saving greeting");
        }
        Ok(seeded)
    }

    /// Append `text` as a user message, save, reply, save again. Read and
    /// write failures propagate.
    pub async fn send(&self, text: &str) -> Result<Conversation> {
        self.send_on(CalendarDate::today(), text).await
    }

    pub async fn send_on(&self, date: CalendarDate, text: &str) -> Result<Conversation> {
        if text.trim().is_empty() {
            return Err(JournalError::EmptyMessage);
        }

        // Every save rewrites the whole day, so start from what is actually
        // stored; a failed read aborts the send instead of dropping the day.
        let current = self.store.try_load_by_date(date).await?;
        let updated = current.with(Message::user(text));
        self.store.save_on(date, &updated).await?;

        let reply = self.generator.generate(text, &current).await;
        let finished = updated.with(Message::assistant(reply));
        self.store.save_on(date, &finished).await?;

        Ok(finished)
    }
}
