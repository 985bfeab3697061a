//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! tuning constants with env overrides.

use crate::formatter::ReplyFormat;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Shapes API key
    pub shapesinc_api_key: String,
    /// Username of the shape this bot relays to
    pub shapesinc_shape_username: String,
    /// Base URL of the Shapes API
    #[serde(default = "default_shapes_api_url")]
    pub shapes_api_url: String,

    /// JSON file holding the activated channel ids
    #[serde(default = "default_active_channels_file")]
    pub active_channels_file: String,

    /// Leading glyph other AI bots put on their own messages
    pub bot_sentinel: Option<String>,
    /// Comma-separated substrings identifying bot usernames
    #[serde(rename = "bot_name_patterns")]
    pub bot_name_patterns_str: Option<String>,
    /// `|`-separated phrases this bot uses in its own replies
    #[serde(rename = "bot_reply_phrases")]
    pub bot_reply_phrases_str: Option<String>,

    /// Comma-separated hosts serving images without a file extension
    #[serde(rename = "image_hosts")]
    pub image_hosts_str: Option<String>,
    /// `multi` (default) or `single`
    pub reply_format: Option<String>,
}

fn default_shapes_api_url() -> String {
    "https://api.shapes.inc/v1".to_string()
}

fn default_active_channels_file() -> String {
    "active_channels.json".to_string()
}

/// Sentinel used when none is configured
pub const DEFAULT_BOT_SENTINEL: &str = "🤖";
/// Bot name patterns used when none are configured
pub const DEFAULT_BOT_NAME_PATTERNS: &[&str] = &["bot", "shapes"];
/// Image hosts used when none are configured
pub const DEFAULT_IMAGE_HOSTS: &[&str] = &["files.shapes.inc"];

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shape_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg. `APP__SHAPES_API_URL=...`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables; empty ones count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Model name the Shapes API expects for this shape
    #[must_use]
    pub fn shape_model(&self) -> String {
        format!("shapesinc/{}", self.shapesinc_shape_username)
    }

    /// Sentinel glyph, falling back to [`DEFAULT_BOT_SENTINEL`]
    #[must_use]
    pub fn bot_sentinel(&self) -> String {
        self.bot_sentinel
            .clone()
            .unwrap_or_else(|| DEFAULT_BOT_SENTINEL.to_string())
    }

    /// Bot name patterns.
    ///
    /// Entries are returned as written, empty ones included; the loop guard
    /// is responsible for rejecting them.
    #[must_use]
    pub fn bot_name_patterns(&self) -> Vec<String> {
        self.bot_name_patterns_str.as_ref().map_or_else(
            || to_owned_list(DEFAULT_BOT_NAME_PATTERNS),
            |s| s.split(',').map(|p| p.trim().to_string()).collect(),
        )
    }

    /// Reply phrases, or `None` to use the built-in set
    #[must_use]
    pub fn bot_reply_phrases(&self) -> Option<Vec<String>> {
        self.bot_reply_phrases_str.as_ref().map(|s| {
            s.split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ToString::to_string)
                .collect()
        })
    }

    /// Hosts treated as image hosts
    #[must_use]
    pub fn image_hosts(&self) -> Vec<String> {
        self.image_hosts_str.as_ref().map_or_else(
            || to_owned_list(DEFAULT_IMAGE_HOSTS),
            |s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(ToString::to_string)
                    .collect()
            },
        )
    }

    /// Selected formatter strategy
    #[must_use]
    pub fn reply_format(&self) -> ReplyFormat {
        ReplyFormat::from_setting(self.reply_format.as_deref())
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// Known bot registry
/// Size the periodic sweep trims the registry down to
pub const KNOWN_BOT_SOFT_CAP: usize = 500;
/// Size that triggers an inline cleanup
pub const KNOWN_BOT_HARD_CAP: usize = 1000;
/// Seconds between periodic sweeps
pub const KNOWN_BOT_SWEEP_SECS: u64 = 300;

// Admission limits
/// Concurrent calls to the Shapes API
pub const API_CONCURRENCY: usize = 5;
/// Concurrent calls to the Telegram API
pub const PLATFORM_CONCURRENCY: usize = 10;
/// Concurrent writes of the channel file
pub const FILE_IO_CONCURRENCY: usize = 1;

/// HTTP timeout for the Shapes API
pub const LLM_HTTP_TIMEOUT_SECS: u64 = 60;

// Telegram API retries
/// Attempts after the first failure
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// First backoff delay
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Get the registry soft cap from env or default.
///
/// Environment variable: `KNOWN_BOT_SOFT_CAP`.
#[must_use]
pub fn get_known_bot_soft_cap() -> usize {
    env_or("KNOWN_BOT_SOFT_CAP", KNOWN_BOT_SOFT_CAP)
}

/// Get the registry hard cap from env or default.
///
/// Environment variable: `KNOWN_BOT_HARD_CAP`.
#[must_use]
pub fn get_known_bot_hard_cap() -> usize {
    env_or("KNOWN_BOT_HARD_CAP", KNOWN_BOT_HARD_CAP)
}

/// Get the sweep interval from env or default.
///
/// Environment variable: `KNOWN_BOT_SWEEP_SECS`.
#[must_use]
pub fn get_known_bot_sweep_secs() -> u64 {
    env_or("KNOWN_BOT_SWEEP_SECS", KNOWN_BOT_SWEEP_SECS).max(1)
}

/// Environment variable: `API_CONCURRENCY`.
#[must_use]
pub fn get_api_concurrency() -> usize {
    env_or("API_CONCURRENCY", API_CONCURRENCY)
}

/// Environment variable: `PLATFORM_CONCURRENCY`.
#[must_use]
pub fn get_platform_concurrency() -> usize {
    env_or("PLATFORM_CONCURRENCY", PLATFORM_CONCURRENCY)
}

/// Environment variable: `FILE_IO_CONCURRENCY`.
#[must_use]
pub fn get_file_io_concurrency() -> usize {
    env_or("FILE_IO_CONCURRENCY", FILE_IO_CONCURRENCY)
}

/// Get the Shapes API timeout from env or default.
///
/// Environment variable: `LLM_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_llm_http_timeout_secs() -> u64 {
    env_or("LLM_HTTP_TIMEOUT_SECS", LLM_HTTP_TIMEOUT_SECS)
}
