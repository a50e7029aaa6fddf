//! One encrypted journal record per user per calendar day.
//!
//! Every operation is scoped to whoever [`AuthProvider`] says is signed in.
//! Writes without a user fail with [`JournalError::AuthenticationRequired`];
//! reads without a user come back empty.

use std::sync::Arc;

use journal_shared::{envelope, CalendarDate, Codec, Conversation, UserId};
use journal_store::{ChangeNotice, JournalBackend, NewEntry, PayloadFormat};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::auth::AuthProvider;
use crate::error::{JournalError, Result};

pub struct JournalStore<B, A> {
    backend: Arc<B>,
    auth: Arc<A>,
    codec: Codec,
}

impl<B, A> Clone for JournalStore<B, A> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            auth: Arc::clone(&self.auth),
            codec: self.codec,
        }
    }
}

impl<B: JournalBackend, A: AuthProvider> JournalStore<B, A> {
    pub fn new(backend: Arc<B>, auth: Arc<A>, codec: Codec) -> Self {
        Self {
            backend,
            auth,
            codec,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.auth.current_user_id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.backend.subscribe()
    }

    // ------------------------------------------------------------------
    // Write path: errors propagate
    // ------------------------------------------------------------------

    /// Replace today's record with `conversation`.
    pub async fn save(&self, conversation: &Conversation) -> Result<()> {
        self.save_on(CalendarDate::today(), conversation).await
    }

    /// Replace the record for `date` with `conversation`.
    pub async fn save_on(&self, date: CalendarDate, conversation: &Conversation) -> Result<()> {
        let user_id = self
            .auth
            .current_user_id()
            .ok_or(JournalError::AuthenticationRequired)?;

        let envelope = self.codec.encrypt(conversation, &user_id)?;
        self.backend
            .upsert_entry(NewEntry::now(user_id.clone(), date, envelope))
            .await
            .map_err(|e| {
                error!(user = %user_id.short(), %date, error = %e, "Error saving journal entry");
                JournalError::from(e)
            })?;

        debug!(
            user = %user_id.short(),
            %date,
            messages = conversation.len(),
            "journal entry saved"
        );
        Ok(())
    }

    /// Delete every record of the signed-in user. Succeeds when there is
    /// nothing to delete. Returns the number of records removed.
    pub async fn clear_all(&self) -> Result<u64> {
        let user_id = self
            .auth
            .current_user_id()
            .ok_or(JournalError::AuthenticationRequired)?;

        self.backend.delete_all(&user_id).await.map_err(|e| {
            error!(user = %user_id.short(), error = %e, "Error clearing journal entries");
            JournalError::from(e)
        })
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Conversation stored for `date`; empty when there is none. Corrupt or
    /// foreign envelopes and store failures are returned as errors. Rows
    /// holding a bare conversation array are read as-is and sealed on the
    /// next save.
    pub async fn try_load_by_date(&self, date: CalendarDate) -> Result<Conversation> {
        let Some(user_id) = self.auth.current_user_id() else {
            return Ok(Conversation::new());
        };

        let Some(record) = self.backend.fetch_entry(&user_id, date).await? else {
            return Ok(Conversation::new());
        };
        let conversation = match record.format {
            PayloadFormat::Envelope => self.codec.decrypt(&record.messages, &user_id)?,
            PayloadFormat::PlainJson => {
                debug!(user = %user_id.short(), %date, "reading pre-envelope record");
                envelope::parse_plain(&record.messages)?
            }
        };
        Ok(conversation)
    }

    /// Like [`try_load_by_date`](Self::try_load_by_date) but never fails:
    /// errors are logged and read as "no entries".
    pub async fn load_by_date(&self, date: CalendarDate) -> Conversation {
        self.try_load_by_date(date).await.unwrap_or_else(|e| {
            warn!(%date, error = %e, "Error getting journal entry");
            Conversation::new()
        })
    }

    pub async fn load_today(&self) -> Conversation {
        self.load_by_date(CalendarDate::today()).await
    }

    /// Dates with a record, newest first, in the order the backend returns.
    pub async fn try_list_dates(&self) -> Result<Vec<CalendarDate>> {
        let Some(user_id) = self.auth.current_user_id() else {
            return Ok(Vec::new());
        };
        Ok(self.backend.list_dates(&user_id).await?)
    }

    pub async fn list_dates(&self) -> Vec<CalendarDate> {
        self.try_list_dates().await.unwrap_or_else(|e| {
            warn!(error = %e, "Error getting journal dates");
            Vec::new()
        })
    }
}
