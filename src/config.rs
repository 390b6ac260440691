//! Configuration and settings management
//!
//! Loads settings from environment variables and defines polling and
//! formatting constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base URL of the statistics/audit API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Web-app audit page offered as a fallback when generation fails
    #[serde(default = "default_webapp_audit_url")]
    pub webapp_audit_url: String,
}

fn default_api_base_url() -> String {
    "https://api.luckblock.io".to_string()
}

fn default_webapp_audit_url() -> String {
    "https://app.luckblock.io/audit".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use luckblock_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

// Audit polling configuration
/// Interval between audit status checks
pub const AUDIT_POLL_INTERVAL_SECS: u64 = 2;
/// Maximum characters of an issue description kept in the report
pub const AUDIT_ISSUE_MAX_CHARS: usize = 200;

// Telegram API retry configuration
/// Initial backoff delay for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retry attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// HTTP timeout for the analyzer API, from `ANALYZER_HTTP_TIMEOUT_SECS` (default 30s)
#[must_use]
pub fn get_analyzer_http_timeout_secs() -> u64 {
    std::env::var("ANALYZER_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}
