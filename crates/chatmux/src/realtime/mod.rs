//! Persistent event connection with heartbeat replies and reconnect.
//!
//! One background task owns the read side of the connection and performs
//! every reconnect itself. The write side lives behind a mutex shared by the
//! task (heartbeat and handshake replies) and [`RealtimeClient::close`].

mod websocket;

use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chatmux_core::backoff::ReconnectPolicy;
use chatmux_core::config::RealtimeConfig;
use chatmux_protocol::{parse_frame, Frame, ServerEvent};
use futures_util::{Sink, SinkExt as _, Stream, StreamExt as _};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub use websocket::{realtime_url, WebSocketTransport};

pub type FrameSink = Pin<Box<dyn Sink<String, Error = anyhow::Error> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a fresh connection and returns its text frame halves.
    async fn dial(&self) -> Result<(FrameSink, FrameStream)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct RealtimeOptions {
    pub policy: ReconnectPolicy,
    pub event_queue_capacity: usize,
}

impl From<&RealtimeConfig> for RealtimeOptions {
    fn from(cfg: &RealtimeConfig) -> Self {
        Self {
            policy: ReconnectPolicy::new(cfg.effective_max_reconnect_attempts()),
            event_queue_capacity: cfg.effective_event_queue_capacity(),
        }
    }
}

impl Default for RealtimeOptions {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

pub struct RealtimeClient {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    sink: Arc<Mutex<Option<FrameSink>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_tx: watch::Sender<bool>,
    events_tx: mpsc::Sender<ServerEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    /// Returns the client and the receiving end of its bounded event queue.
    pub fn new(
        transport: Arc<dyn Transport>,
        options: RealtimeOptions,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (events_tx, events_rx) = mpsc::channel(options.event_queue_capacity.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);

        let client = Self {
            transport,
            policy: options.policy,
            sink: Arc::new(Mutex::new(None)),
            state_tx: Arc::new(state_tx),
            shutdown_tx,
            events_tx,
            task: Mutex::new(None),
        };
        (client, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Dials once and starts the read loop. A no-op while a read loop is
    /// still running; after `close()` or exhausted retries it starts over.
    pub async fn connect(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        self.shutdown_tx.send_replace(false);
        self.state_tx.send_replace(ConnectionState::Connecting);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let dialed = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => Err(anyhow!("closed while dialing")),
            dialed = self.transport.dial() => dialed,
        };
        let (sink, stream) = match dialed {
            Ok(halves) => halves,
            Err(err) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(err.context("realtime connect"));
            }
        };
        *self.sink.lock().await = Some(sink);
        self.state_tx.send_replace(ConnectionState::Open);
        info!("realtime connection open");

        let ctx = ReadLoop {
            transport: self.transport.clone(),
            policy: self.policy,
            sink: self.sink.clone(),
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            events_tx: self.events_tx.clone(),
        };
        *task = Some(tokio::spawn(ctx.run(stream)));
        Ok(())
    }

    /// Stops reconnecting, closes the live connection, and waits for the
    /// read loop to exit. A dial in flight is abandoned. Safe to call when
    /// not connected.
    pub async fn close(&self) {
        self.shutdown_tx.send_replace(true);

        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(err) = sink.close().await {
                debug!(error = %format!("{err:#}"), "closing realtime sink");
            }
        }

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            // A `connect()` that held the lock may have cleared the flag.
            self.shutdown_tx.send_replace(true);
            if let Err(err) = task.await {
                warn!(error = %err, "realtime read loop panicked");
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

struct ReadLoop {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    sink: Arc<Mutex<Option<FrameSink>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: mpsc::Sender<ServerEvent>,
}

impl ReadLoop {
    async fn run(mut self, mut stream: FrameStream) {
        loop {
            if self.is_shutdown() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown_rx) => break,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(text)) => {
                    self.handle_frame(&text).await;
                    continue;
                }
                Some(Err(err)) => {
                    warn!(error = %format!("{err:#}"), "realtime read failed");
                }
                None => {
                    info!("realtime connection closed by server");
                }
            }

            match self.reconnect().await {
                Some(next_stream) => stream = next_stream,
                None => break,
            }
        }

        *self.sink.lock().await = None;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        debug!("realtime read loop stopped");
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    async fn handle_frame(&self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, frame = %preview(text), "dropping malformed frame");
                return;
            }
        };

        if let Some(reply) = frame.reply() {
            self.send(reply).await;
        }

        match frame {
            Frame::Event(wire) => self.publish(ServerEvent::from(wire)),
            Frame::Open(_) => debug!("handshake received"),
            Frame::NamespaceJoined => debug!("namespace joined"),
            Frame::Ping | Frame::Pong => trace!("heartbeat"),
            Frame::Unknown(raw) => debug!(frame = %preview(&raw), "ignoring frame"),
        }
    }

    fn publish(&self, event: ServerEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.name(), "event queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event queue receiver gone");
            }
        }
    }

    async fn send(&self, frame: &str) {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return;
        };
        if let Err(err) = sink.send(frame.to_owned()).await {
            warn!(error = %format!("{err:#}"), "realtime write failed");
        }
    }

    /// Runs the backoff schedule until a dial succeeds, the attempts run
    /// out, or shutdown is signalled.
    async fn reconnect(&mut self) -> Option<FrameStream> {
        *self.sink.lock().await = None;

        let policy = self.policy;
        for (attempt, delay) in policy.schedule() {
            if self.is_shutdown() {
                return None;
            }
            self.state_tx
                .send_replace(ConnectionState::Reconnecting(attempt));
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown_rx) => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let dialed = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown_rx) => return None,
                dialed = self.transport.dial() => dialed,
            };
            match dialed {
                Ok((sink, stream)) => {
                    *self.sink.lock().await = Some(sink);
                    self.state_tx.send_replace(ConnectionState::Open);
                    info!(attempt, "realtime connection restored");
                    return Some(stream);
                }
                Err(err) => {
                    warn!(attempt, error = %format!("{err:#}"), "reconnect failed");
                }
            }
        }

        warn!(
            attempts = policy.max_attempts,
            "giving up on realtime connection"
        );
        None
    }
}

/// Resolves once shutdown is signalled or the client is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        return text.to_owned();
    }
    let cut: String = text.chars().take(MAX).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_frames() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(200);
        let got = preview(&long);
        assert!(got.ends_with("..."));
        assert_eq!(got.chars().count(), 123);
    }

    #[test]
    fn options_follow_realtime_config() {
        let opts = RealtimeOptions::from(&RealtimeConfig {
            max_reconnect_attempts: Some(3),
            event_queue_capacity: Some(0),
        });
        assert_eq!(opts.policy.max_attempts, 3);
        assert_eq!(opts.event_queue_capacity, 50);
    }
}
