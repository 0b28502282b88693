use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use chatmux_core::config::ServerCredentials;
use futures_util::{future, SinkExt as _, StreamExt as _};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{FrameSink, FrameStream, Transport};

const SOCKET_PATH: &str = "socket.io/";
const ENGINE_VERSION: &str = "4";
/// Covers TCP connect, TLS and the upgrade handshake together.
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Event endpoint for `base_url`: `http(s)` becomes `ws(s)`, authenticated
/// with the server password as the `guid` query parameter.
pub fn realtime_url(base_url: &str, password: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("invalid server url {base_url:?}"))?;

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(anyhow!("unsupported server url scheme {other:?}")),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow!("cannot switch {base_url:?} to {scheme}"))?;

    let path = format!("{}/{SOCKET_PATH}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_VERSION)
        .append_pair("transport", "websocket")
        .append_pair("guid", password);
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: Url,
}

impl WebSocketTransport {
    pub fn new(creds: &ServerCredentials) -> Result<Self> {
        Ok(Self {
            url: realtime_url(&creds.base_url, &creds.password)?,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn dial(&self) -> Result<(FrameSink, FrameStream)> {
        let (ws, _resp) =
            tokio::time::timeout(DIAL_TIMEOUT, tokio_tungstenite::connect_async(self.url.as_str()))
                .await
                .map_err(|_| anyhow!("websocket dial timed out after {}s", DIAL_TIMEOUT.as_secs()))?
                .context("websocket dial")?;
        let (write, read) = ws.split();

        let sink = write.with(|text: String| future::ready(Ok::<_, anyhow::Error>(Message::Text(text))));

        // Text frames only; a close frame ends the stream.
        let stream = read
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(_) => None,
                    Err(err) => Some(Err(anyhow::Error::new(err).context("websocket read"))),
                })
            });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
