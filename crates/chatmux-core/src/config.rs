use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::DEFAULT_MAX_RECONNECT_ATTEMPTS;

pub const DEFAULT_MESSAGE_LIMIT: usize = 50;
pub const DEFAULT_CHAT_LIMIT: usize = 50;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MAX_PANES: usize = 4;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(rename = "server-url", alias = "server_url", default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(rename = "message-limit", alias = "message_limit", default)]
    pub message_limit: Option<usize>,

    #[serde(rename = "chat-limit", alias = "chat_limit", default)]
    pub chat_limit: Option<usize>,

    /// Accepts the older `poll_interval` spelling as well.
    #[serde(
        rename = "poll-interval-secs",
        alias = "poll_interval_secs",
        alias = "poll_interval",
        default
    )]
    pub poll_interval_secs: Option<u64>,

    #[serde(rename = "max-panes", alias = "max_panes", default)]
    pub max_panes: Option<usize>,

    #[serde(rename = "show-timestamps", alias = "show_timestamps", default)]
    pub show_timestamps: Option<bool>,

    #[serde(
        rename = "accept-invalid-certs",
        alias = "accept_invalid_certs",
        default
    )]
    pub accept_invalid_certs: Option<bool>,

    #[serde(rename = "log-level", alias = "log_level", default)]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeConfig>,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RealtimeConfig {
    #[serde(
        rename = "max-reconnect-attempts",
        alias = "max_reconnect_attempts",
        default
    )]
    pub max_reconnect_attempts: Option<u32>,

    #[serde(
        rename = "event-queue-capacity",
        alias = "event_queue_capacity",
        default
    )]
    pub event_queue_capacity: Option<usize>,
}

impl RealtimeConfig {
    pub fn effective_max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
            .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }

    pub fn effective_event_queue_capacity(&self) -> usize {
        match self.event_queue_capacity {
            Some(0) | None => DEFAULT_EVENT_QUEUE_CAPACITY,
            Some(n) => n,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("server url is not set (config `server-url` or CHATMUX_SERVER_URL)")]
    ServerUrlMissing,
    #[error("server url must start with http:// or https://: {url}")]
    InvalidServerUrl { url: String },
    #[error("password is not set (config `password` or CHATMUX_PASSWORD)")]
    PasswordMissing,
    #[error("max-panes must be > 0")]
    InvalidMaxPanes,
}

/// Values supplied outside the config file. Each one replaces the file's
/// value when set.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub password: Option<String>,
    pub log_level: Option<String>,
}

impl ConfigFile {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: ConfigFile = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_panes == Some(0) {
            return Err(ConfigError::InvalidMaxPanes);
        }
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(url) = non_empty(overrides.server_url) {
            self.server_url = Some(url);
        }
        if let Some(pw) = non_empty(overrides.password) {
            self.password = Some(pw);
        }
        if let Some(level) = non_empty(overrides.log_level) {
            self.log_level = Some(level);
        }
        self
    }

    pub fn effective_message_limit(&self) -> usize {
        positive_or(self.message_limit, DEFAULT_MESSAGE_LIMIT)
    }

    pub fn effective_chat_limit(&self) -> usize {
        positive_or(self.chat_limit, DEFAULT_CHAT_LIMIT)
    }

    pub fn effective_poll_interval(&self) -> Duration {
        let secs = match self.poll_interval_secs {
            Some(0) | None => DEFAULT_POLL_INTERVAL_SECS,
            Some(n) => n,
        };
        Duration::from_secs(secs)
    }

    pub fn effective_max_panes(&self) -> usize {
        positive_or(self.max_panes, DEFAULT_MAX_PANES)
    }

    pub fn effective_show_timestamps(&self) -> bool {
        self.show_timestamps.unwrap_or(true)
    }

    pub fn effective_accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs.unwrap_or(true)
    }

    pub fn effective_realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }

    /// Server URL and password, required by every command that talks to
    /// the server. The URL loses any trailing slash.
    pub fn server_credentials(&self) -> Result<ServerCredentials, ConfigError> {
        let url = self
            .server_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::ServerUrlMissing)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidServerUrl {
                url: url.to_owned(),
            });
        }
        let password = self
            .password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::PasswordMissing)?;

        Ok(ServerCredentials {
            base_url: url.trim_end_matches('/').to_owned(),
            password: password.to_owned(),
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ServerCredentials {
    pub base_url: String,
    pub password: String,
}

impl std::fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("base_url", &self.base_url)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn positive_or(v: Option<usize>, default: usize) -> usize {
    match v {
        Some(0) | None => default,
        Some(n) => n,
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
