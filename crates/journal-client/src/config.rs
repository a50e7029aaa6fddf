//! Client configuration loaded from environment variables.
//!
//! Optional settings fall back to defaults with a warning. A remote backend
//! without its URL or anon key is a hard error at startup rather than a
//! client that fails on first use.

use std::path::PathBuf;
use std::time::Duration;

use journal_shared::EnvelopeVersion;
use journal_store::RemoteConfig;

use crate::error::ConfigError;

/// Placeholder shipped in sample env files; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REFRESH_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite file on this device.
    Local,
    /// Hosted relational store (PostgREST + GoTrue).
    Remote,
}

#[derive(Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    /// `None` selects the local fallback generator.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl CompletionConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where records live.
    /// Env: `JOURNAL_BACKEND` (`local` | `remote`)
    /// Default: `local`
    pub backend: BackendKind,

    /// SQLite file for the local backend.
    /// Env: `JOURNAL_DB_PATH`
    /// Default: platform data directory.
    pub database_path: Option<PathBuf>,

    /// Hosted project settings; always `Some` when `backend` is `Remote`.
    /// Env: `SUPABASE_URL`, `SUPABASE_ANON_KEY`
    pub remote: Option<RemoteConfig>,

    /// Completion API settings.
    /// Env: `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`
    pub completion: CompletionConfig,

    /// Envelope layout used for new writes. Reads accept every version.
    /// Env: `JOURNAL_ENVELOPE_VERSION` (`1` | `2`)
    /// Default: `2`
    pub envelope_version: EnvelopeVersion,

    /// Quiet period used to coalesce change notifications.
    /// Env: `JOURNAL_REFRESH_DEBOUNCE_MS`
    /// Default: `250`
    pub refresh_debounce: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            database_path: None,
            remote: None,
            completion: CompletionConfig::default(),
            envelope_version: EnvelopeVersion::default(),
            refresh_debounce: DEFAULT_REFRESH_DEBOUNCE,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(kind) = get("JOURNAL_BACKEND") {
            config.backend = match kind.to_ascii_lowercase().as_str() {
                "local" | "sqlite" => BackendKind::Local,
                "remote" | "supabase" => BackendKind::Remote,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "JOURNAL_BACKEND",
                        value: kind,
                    })
                }
            };
        }

        if let Some(path) = get("JOURNAL_DB_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        let remote = config.backend == BackendKind::Remote;
        match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => config.remote = Some(RemoteConfig { url, anon_key }),
            (None, _) if remote => return Err(ConfigError::Missing("SUPABASE_URL")),
            (_, None) if remote => return Err(ConfigError::Missing("SUPABASE_ANON_KEY")),
            _ => {}
        }

        config.completion.api_key = get("OPENAI_API_KEY").filter(|k| k != PLACEHOLDER_API_KEY);
        if config.completion.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not configured, using fallback responses");
        }
        if let Some(base) = get("OPENAI_BASE_URL") {
            config.completion.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.completion.model = model;
        }

        if let Some(val) = get("JOURNAL_ENVELOPE_VERSION") {
            match val.parse::<u8>().ok().and_then(EnvelopeVersion::from_byte) {
                Some(v) => config.envelope_version = v,
                None => tracing::warn!(
                    value = %val,
                    "Invalid JOURNAL_ENVELOPE_VERSION, using default"
                ),
            }
        }

        if let Some(val) = get("JOURNAL_REFRESH_DEBOUNCE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.refresh_debounce = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid JOURNAL_REFRESH_DEBOUNCE_MS, using default"
                ),
            }
        }

        Ok(config)
    }
}
