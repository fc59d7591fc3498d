//! Application configuration.
//!
//! All settings have defaults suitable for local development and can be
//! overridden through environment variables (loaded from `.env` by the
//! binary before this module is consulted).

use std::time::Duration;

use crate::dispatcher::discord::DiscordConfig;
use crate::monitor::poller::PollerConfig;
use crate::provider::twitch::TwitchConfig;
use crate::{Error, Result};

/// Default SQLite database URL.
const DEFAULT_DATABASE_URL: &str = "sqlite:stream-notify.db?mode=rwc";

/// Default directory for rotated log files.
const DEFAULT_LOG_DIR: &str = "logs";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Directory for rotated log files.
    pub log_dir: String,
    /// Polling engine configuration.
    pub poller: PollerConfig,
    /// Status provider credentials.
    pub twitch: TwitchConfig,
    /// Notification dispatcher credentials.
    pub discord: DiscordConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Fails only on missing credentials; every tunable falls back to its
    /// default.
    pub fn from_env() -> Result<Self> {
        let poller = PollerConfig {
            poll_interval: env_duration_secs("POLL_INTERVAL_SECS")
                .unwrap_or(PollerConfig::default().poll_interval),
            min_offline_duration: env_duration_secs("MIN_OFFLINE_DURATION_SECS")
                .unwrap_or(PollerConfig::default().min_offline_duration),
            ..PollerConfig::default()
        };

        let twitch = TwitchConfig {
            client_id: require_env("TWITCH_CLIENT_ID")?,
            access_token: require_env("TWITCH_ACCESS_TOKEN")?,
            ..TwitchConfig::default()
        };

        let discord = DiscordConfig {
            bot_token: require_env("DISCORD_BOT_TOKEN")?,
            ..DiscordConfig::default()
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string()),
            poller,
            twitch,
            discord,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::config(format!("{key} must be set")))
}

fn env_duration_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable duration override");
            None
        }
    }
}
