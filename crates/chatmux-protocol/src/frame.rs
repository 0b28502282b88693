//! Text frames of the realtime sub-protocol.
//!
//! Frames carry a short type marker followed by an optional body:
//!
//! | frame        | meaning                               |
//! |--------------|---------------------------------------|
//! | `0{...}`     | handshake open (server settings)      |
//! | `40...`      | default namespace joined              |
//! | `2`          | heartbeat ping                        |
//! | `3`          | heartbeat pong                        |
//! | `42[n, p]`   | application event `n` with payload `p`|

use serde_json::Value;
use thiserror::Error;

use crate::WireEvent;

pub const MARKER_OPEN: &str = "0";
pub const MARKER_NAMESPACE: &str = "40";
pub const MARKER_PING: &str = "2";
pub const MARKER_PONG: &str = "3";
pub const MARKER_EVENT: &str = "42";

/// Sent in reply to the handshake to join the default namespace.
pub const JOIN_DEFAULT_NAMESPACE: &str = MARKER_NAMESPACE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Open(String),
    NamespaceJoined,
    Ping,
    Pong,
    Event(WireEvent),
    Unknown(String),
}

impl Frame {
    /// The frame the client must answer with immediately, if any.
    pub fn reply(&self) -> Option<&'static str> {
        match self {
            Frame::Open(_) => Some(JOIN_DEFAULT_NAMESPACE),
            Frame::Ping => Some(MARKER_PONG),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("event frame is not a json array: {0}")]
    NotAnArray(#[source] serde_json::Error),
    #[error("event frame array is empty")]
    MissingName,
    #[error("event name is not a string")]
    NameNotString,
}

pub fn parse_frame(raw: &str) -> Result<Frame, FrameError> {
    if let Some(body) = raw.strip_prefix(MARKER_EVENT) {
        return parse_event(body).map(Frame::Event);
    }
    if raw.starts_with(MARKER_NAMESPACE) {
        return Ok(Frame::NamespaceJoined);
    }
    if let Some(body) = raw.strip_prefix(MARKER_OPEN) {
        return Ok(Frame::Open(body.to_owned()));
    }
    match raw {
        MARKER_PING => Ok(Frame::Ping),
        MARKER_PONG => Ok(Frame::Pong),
        _ => Ok(Frame::Unknown(raw.to_owned())),
    }
}

fn parse_event(body: &str) -> Result<WireEvent, FrameError> {
    let items: Vec<Value> = serde_json::from_str(body).map_err(FrameError::NotAnArray)?;
    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        Some(_) => return Err(FrameError::NameNotString),
        None => return Err(FrameError::MissingName),
    };
    Ok(WireEvent {
        r#type: name,
        data: items.next().unwrap_or(Value::Null),
    })
}

pub fn encode_event(name: &str, payload: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_owned()), payload.clone()]);
    format!("{MARKER_EVENT}{body}")
}
