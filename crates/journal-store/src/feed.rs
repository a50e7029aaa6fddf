//! In-process change notifications.
//!
//! Backends publish a [`ChangeNotice`] after every successful write. Sends
//! never block: a slow subscriber lags and is told so by the broadcast
//! channel instead of holding up the writer.

use journal_shared::{CalendarDate, UserId};
use tokio::sync::broadcast;

use crate::models::{ChangeKind, ChangeNotice};

/// Default number of notices buffered per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notice: ChangeNotice) {
        // Err only means nobody is listening.
        let receivers = self.tx.send(notice).unwrap_or(0);
        tracing::trace!(receivers, "change notice published");
    }

    pub fn upserted(&self, user_id: &UserId, date: CalendarDate) {
        self.publish(ChangeNotice {
            user_id: user_id.clone(),
            date: Some(date),
            kind: ChangeKind::Upserted,
        });
    }

    pub fn cleared(&self, user_id: &UserId) {
        self.publish(ChangeNotice {
            user_id: user_id.clone(),
            date: None,
            kind: ChangeKind::Deleted,
        });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
