//! Turns raw change notices into debounced "re-read now" signals.
//!
//! A burst of writes (one send saves twice) becomes a single [`Refresh`]
//! after the feed has been quiet for the debounce window. The output channel
//! holds one refresh; while the consumer is busy, further bursts are merged
//! into a pending refresh instead of queueing up re-reads.

use std::collections::BTreeSet;
use std::time::Duration;

use journal_shared::{CalendarDate, UserId};
use journal_store::ChangeNotice;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refresh {
    /// Days named by the coalesced notices.
    pub dates: BTreeSet<CalendarDate>,
    /// Everything may have changed (bulk delete or missed notices).
    pub full: bool,
    /// Number of notices folded into this refresh.
    pub coalesced: usize,
}

impl Refresh {
    pub fn touches(&self, date: CalendarDate) -> bool {
        self.full || self.dates.contains(&date)
    }

    fn absorb(&mut self, signal: Signal) {
        self.coalesced += 1;
        match signal {
            Signal::Notice(ChangeNotice {
                date: Some(date), ..
            }) => {
                self.dates.insert(date);
            }
            Signal::Notice(_) | Signal::Lagged => self.full = true,
        }
    }

    fn merge(&mut self, other: Refresh) {
        self.dates.extend(other.dates);
        self.full |= other.full;
        self.coalesced += other.coalesced;
    }
}

enum Signal {
    Notice(ChangeNotice),
    Lagged,
}

/// Background task feeding a bounded refresh channel. Aborted on drop.
pub struct Refresher {
    handle: JoinHandle<()>,
}

impl Refresher {
    pub fn spawn(
        notices: broadcast::Receiver<ChangeNotice>,
        user_id: UserId,
        debounce: Duration,
    ) -> (Self, mpsc::Receiver<Refresh>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(notices, user_id, debounce, tx));
        (Self { handle }, rx)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    mut notices: broadcast::Receiver<ChangeNotice>,
    user_id: UserId,
    debounce: Duration,
    tx: mpsc::Sender<Refresh>,
) {
    let mut pending: Option<Refresh> = None;

    loop {
        let first = match pending.take() {
            Some(undelivered) => {
                tokio::select! {
                    biased;
                    permit = tx.reserve() => {
                        match permit {
                            Ok(permit) => permit.send(undelivered),
                            Err(_) => return,
                        }
                        continue;
                    }
                    signal = next_relevant(&mut notices, &user_id) => {
                        pending = Some(undelivered);
                        signal
                    }
                }
            }
            None => next_relevant(&mut notices, &user_id).await,
        };

        let Some(first) = first else { break };

        let mut batch = Refresh::default();
        batch.absorb(first);

        let mut closed = false;
        loop {
            match tokio::time::timeout(debounce, next_relevant(&mut notices, &user_id)).await {
                Ok(Some(signal)) => batch.absorb(signal),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        debug!(
            user = %user_id.short(),
            coalesced = batch.coalesced,
            full = batch.full,
            "refresh ready"
        );
        pending = Some(match pending.take() {
            Some(mut older) => {
                older.merge(batch);
                older
            }
            None => batch,
        });

        if closed {
            break;
        }
    }

    if let Some(last) = pending {
        let _ = tx.send(last).await;
    }
}

/// Next notice for `user_id`; `None` once the feed is gone.
async fn next_relevant(
    notices: &mut broadcast::Receiver<ChangeNotice>,
    user_id: &UserId,
) -> Option<Signal> {
    loop {
        match notices.recv().await {
            Ok(notice) if notice.user_id == *user_id => return Some(Signal::Notice(notice)),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "change feed lagged, forcing full refresh");
                return Some(Signal::Lagged);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
