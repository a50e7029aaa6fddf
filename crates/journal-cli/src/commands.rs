use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use journal_client::auth::AuthProvider;
use journal_client::{load_history, DaySession, JournalStore, Refresher};
use journal_shared::{CalendarDate, Conversation, Message};
use journal_store::JournalBackend;

pub async fn today<B: JournalBackend, A: AuthProvider>(session: &DaySession<B, A>) -> Result<()> {
    let conversation = session.open_today().await?;
    print!("{}", render(conversation.messages()));
    Ok(())
}

pub async fn send<B: JournalBackend, A: AuthProvider>(
    session: &DaySession<B, A>,
    text: &str,
) -> Result<()> {
    let conversation = session.send(text).await?;
    if let Some(reply) = conversation.messages().last() {
        print!("{}", render(std::slice::from_ref(reply)));
    }
    Ok(())
}

pub async fn show<B: JournalBackend, A: AuthProvider>(
    store: &JournalStore<B, A>,
    date: CalendarDate,
) -> Result<()> {
    let conversation = store
        .try_load_by_date(date)
        .await
        .with_context(|| format!("reading {date}"))?;
    if conversation.is_empty() {
        println!("No entries for {date}");
    } else {
        print!("{}", render(conversation.messages()));
    }
    Ok(())
}

pub async fn dates<B: JournalBackend, A: AuthProvider>(store: &JournalStore<B, A>) -> Result<()> {
    for date in store.try_list_dates().await? {
        println!("{date}");
    }
    Ok(())
}

pub async fn history<B: JournalBackend, A: AuthProvider>(
    store: &JournalStore<B, A>,
    json: bool,
) -> Result<()> {
    let previews = load_history(store).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&previews)?);
        return Ok(());
    }
    for p in previews {
        println!("{}  [{:>2}]  {}", p.date, p.message_count, p.preview);
    }
    Ok(())
}

pub async fn clear<B: JournalBackend, A: AuthProvider>(
    store: &JournalStore<B, A>,
    yes: bool,
) -> Result<()> {
    if !yes {
        bail!("refusing to delete every record without --yes");
    }
    let removed = store.clear_all().await?;
    println!("Deleted {removed} record(s)");
    Ok(())
}

/// Today's conversation, kept on screen while lines from stdin are sent.
/// New assistant messages are printed when the refresh watcher fires. Past
/// midnight the next line opens the new day.
pub async fn chat<B: JournalBackend, A: AuthProvider>(
    session: &DaySession<B, A>,
    debounce: Duration,
) -> Result<()> {
    let store = session.store();
    let user_id = store
        .current_user_id()
        .context("chat needs a signed-in user")?;
    let (_refresher, mut refreshes) = Refresher::spawn(store.subscribe(), user_id, debounce);

    let mut day = DayCursor::new(CalendarDate::today());
    let opened = session.open_on(day.date()).await?;
    print!("{}", render(opened.messages()));
    let mut shown = opened.len();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let text = match line? {
                    Some(text) if text.trim().is_empty() => continue,
                    Some(text) => text,
                    None => break,
                };
                if day.advance(CalendarDate::today()) {
                    let opened = session.open_on(day.date()).await?;
                    println!("--- {} ---", day.date());
                    print!("{}", render(opened.messages()));
                    shown = opened.len();
                }
                if let Err(e) = session.send_on(day.date(), &text).await {
                    warn!(error = %e, "Message not saved");
                }
            }
            Some(refresh) = refreshes.recv() => {
                if !refresh.touches(day.date()) {
                    continue;
                }
                let current = store.load_by_date(day.date()).await;
                let (text, now_shown) = render_new(&current, shown);
                print!("{text}");
                shown = now_shown;
            }
            _ = &mut ctrl_c => break,
        }
    }
    Ok(())
}

/// The day `chat` writes to; moves forward when the calendar does.
#[derive(Debug, Clone, Copy)]
struct DayCursor {
    date: CalendarDate,
}

impl DayCursor {
    fn new(date: CalendarDate) -> Self {
        Self { date }
    }

    fn date(&self) -> CalendarDate {
        self.date
    }

    /// Returns `true` when `today` is a later day than the current one.
    fn advance(&mut self, today: CalendarDate) -> bool {
        if today > self.date {
            self.date = today;
            true
        } else {
            false
        }
    }
}

fn render(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = if m.is_user { "you" } else { "journal" };
            format!("{who:>7}: {}\n", m.text)
        })
        .collect()
}

/// Assistant messages past `shown`; the user already sees what they typed.
/// A conversation that shrank (cleared elsewhere) is rendered from scratch.
fn render_new(conversation: &Conversation, shown: usize) -> (String, usize) {
    let messages = conversation.messages();
    if messages.len() < shown {
        return (render(messages), messages.len());
    }
    let fresh: Vec<Message> = messages[shown..]
        .iter()
        .filter(|m| !m.is_user)
        .cloned()
        .collect();
    (render(&fresh), messages.len())
}
