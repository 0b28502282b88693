mod chat;
mod chat_list;
mod client;
mod core;
mod editor;
mod router;
mod runtime;
mod theme;
mod view;
mod windows;

use std::sync::Arc;

use anyhow::Context as _;
use chatmux_core::config::{ConfigFile, ServerCredentials};
use time::UtcOffset;

use crate::api::ApiClient;
use crate::realtime::{RealtimeClient, RealtimeOptions, WebSocketTransport};

pub use self::client::ChatBackend;
pub use self::core::Settings;

pub fn settings_from_config(cfg: &ConfigFile, utc_offset: UtcOffset) -> Settings {
    Settings {
        message_limit: cfg.effective_message_limit(),
        chat_limit: cfg.effective_chat_limit(),
        poll_interval: cfg.effective_poll_interval(),
        max_panes: cfg.effective_max_panes(),
        show_timestamps: cfg.effective_show_timestamps(),
        utc_offset,
    }
}

pub async fn run(
    cfg: &ConfigFile,
    creds: &ServerCredentials,
    utc_offset: UtcOffset,
) -> anyhow::Result<()> {
    let api = ApiClient::new(creds, cfg.effective_accept_invalid_certs())?;
    let transport = WebSocketTransport::new(creds).context("realtime endpoint")?;
    let (realtime, events) = RealtimeClient::new(
        Arc::new(transport),
        RealtimeOptions::from(&cfg.effective_realtime()),
    );

    runtime::run(
        Arc::new(api),
        Arc::new(realtime),
        events,
        settings_from_config(cfg, utc_offset),
    )
    .await
}
