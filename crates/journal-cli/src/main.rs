//! # journal
//!
//! Command-line front end for the AI journal.
//!
//!   today               - open today's conversation (greets on first open)
//!   send <text>         - add a message to today and print the reply
//!   show <YYYY-MM-DD>   - print one day's conversation
//!   dates               - list journaled days, newest first
//!   history [--json]    - one preview line per journaled day
//!   clear --yes         - delete every record of the signed-in user
//!   chat                - interactive day view fed by the refresh watcher
//!
//! Storage, completion and envelope settings come from the environment (see
//! `journal_client::config`).

mod commands;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use journal_client::{
    AppConfig, BackendKind, DaySession, GoTrueClient, JournalStore, ResponseGenerator, Session,
    SessionAuth,
};
use journal_shared::constants::APP_NAME;
use journal_shared::{CalendarDate, Codec, UserId};
use journal_store::{Database, JournalBackend, RestBackend, SqliteBackend};

#[derive(Parser, Debug)]
#[command(name = "journal", version, about = "Daily journal with an AI companion")]
struct Cli {
    /// User id for the local backend
    #[arg(long, env = "JOURNAL_USER")]
    user: Option<String>,

    /// Account email for the hosted backend
    #[arg(long, env = "JOURNAL_EMAIL")]
    email: Option<String>,

    /// Account password for the hosted backend
    #[arg(long, env = "JOURNAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open today's conversation
    Today,

    /// Add a message to today's conversation and print the reply
    Send {
        /// Message text
        text: String,
    },

    /// Print the conversation stored for a day
    Show {
        /// Day in YYYY-MM-DD form
        date: CalendarDate,
    },

    /// List days that have a record, newest first
    Dates,

    /// Preview every journaled day
    History {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete all of your records
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Chat interactively; stdin lines are sent as messages
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,journal_client=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = AppConfig::from_env().context("loading configuration")?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the backend and sign in, then dispatch
    // -----------------------------------------------------------------------
    match config.backend {
        BackendKind::Local => {
            let backend = open_local(&config)?;
            let user_id = cli
                .user
                .as_deref()
                .and_then(UserId::new)
                .context("--user or JOURNAL_USER is required for the local backend")?;
            let auth = SessionAuth::signed_in(Session::local(user_id));
            run(Arc::new(backend), Arc::new(auth), &config, cli.command).await
        }
        BackendKind::Remote => {
            let remote = config
                .remote
                .clone()
                .context("remote backend selected without SUPABASE_URL")?;
            let (Some(email), Some(password)) = (cli.email.as_deref(), cli.password.as_deref())
            else {
                bail!("--email and --password are required for the remote backend");
            };

            let gotrue = GoTrueClient::new(remote.clone());
            let session = gotrue.sign_in_with_password(email, password).await?;

            let backend = RestBackend::new(remote);
            backend.set_access_token(session.access_token.clone());
            let auth = SessionAuth::signed_in(session.clone());

            let result = run(Arc::new(backend), Arc::new(auth), &config, cli.command).await;

            if let Err(e) = gotrue.sign_out(&session).await {
                warn!(error = %e, "Failed to revoke session");
            }
            result
        }
    }
}

fn open_local(config: &AppConfig) -> Result<SqliteBackend> {
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)
            .with_context(|| format!("opening database {}", path.display()))?,
        None => Database::new().context("opening database in the data directory")?,
    };
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Journal database opened");
    }
    Ok(SqliteBackend::new(db))
}

async fn run<B: JournalBackend + 'static>(
    backend: Arc<B>,
    auth: Arc<SessionAuth>,
    config: &AppConfig,
    command: Command,
) -> Result<()> {
    let store = JournalStore::new(backend, auth, Codec::new(config.envelope_version));
    let generator = ResponseGenerator::from_config(&config.completion);

    match command {
        Command::Today => {
            let session = DaySession::new(store, generator);
            commands::today(&session).await
        }
        Command::Send { text } => {
            let session = DaySession::new(store, generator);
            commands::send(&session, &text).await
        }
        Command::Show { date } => commands::show(&store, date).await,
        Command::Dates => commands::dates(&store).await,
        Command::History { json } => commands::history(&store, json).await,
        Command::Clear { yes } => commands::clear(&store, yes).await,
        Command::Chat => {
            let session = DaySession::new(store, generator);
            commands::chat(&session, config.refresh_debounce).await
        }
    }
}
