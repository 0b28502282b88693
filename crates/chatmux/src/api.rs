use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use chatmux_core::config::ServerCredentials;
use chatmux_protocol::{null_as_default, Chat, Message};
use futures_util::stream::{self, StreamExt as _};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const ACTIVITY_FETCH_CONCURRENCY: usize = 5;
const SEND_METHOD: &str = "apple-script";

/// Request/response client for conversation lists, history, sending, and
/// contact names. Cheap to clone; clones share the contact cache.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    password: String,
    contacts: Arc<Mutex<HashMap<String, String>>>,
}

impl ApiClient {
    pub fn new(creds: &ServerCredentials, accept_invalid_certs: bool) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .user_agent(format!("chatmux/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            client,
            base_url: creds.base_url.trim_end_matches('/').to_owned(),
            password: creds.password.clone(),
            contacts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Conversations ordered by latest message, newest first. Each chat's
    /// `last_message` carries that latest message when one exists.
    pub async fn list_chats(&self, limit: usize) -> anyhow::Result<Vec<Chat>> {
        let body = self
            .post_json("/api/v1/chat/query", &json!({}))
            .await
            .context("query chats")?;
        let raw = extract(&body, &["/data/data", "/data/chats", "/data"])
            .ok_or_else(|| anyhow!("chat query response has no data"))?;
        let mut chats: Vec<Chat> = serde_json::from_value(raw.clone()).context("parse chats")?;

        let contacts = self.contacts().await;
        for chat in &mut chats {
            for p in &mut chat.participants {
                fill_name(&mut p.display_name, &p.address, &contacts);
            }
        }

        let mut with_activity: Vec<(Chat, Option<Message>)> = stream::iter(chats)
            .map(|chat| async move {
                let latest = match self.list_messages(&chat.guid, 1).await {
                    Ok(msgs) => msgs.into_iter().last(),
                    Err(err) => {
                        debug!(chat = %chat.guid, error = %format!("{err:#}"), "latest message fetch failed");
                        None
                    }
                };
                (chat, latest)
            })
            .buffered(ACTIVITY_FETCH_CONCURRENCY)
            .collect()
            .await;

        with_activity.sort_by(|(_, a), (_, b)| {
            let a_ms = a.as_ref().map(|m| m.date_created).unwrap_or(0);
            let b_ms = b.as_ref().map(|m| m.date_created).unwrap_or(0);
            b_ms.cmp(&a_ms).then(b.is_some().cmp(&a.is_some()))
        });

        let mut out: Vec<Chat> = with_activity
            .into_iter()
            .map(|(mut chat, latest)| {
                if latest.is_some() {
                    chat.last_message = latest.map(Box::new);
                }
                chat
            })
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    /// History for one conversation, oldest first, each message tagged with
    /// `chat_guid`.
    pub async fn list_messages(&self, chat_guid: &str, limit: usize) -> anyhow::Result<Vec<Message>> {
        let mut url = self.url("/api/v1/chat")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("server url cannot be a base"))?
            .push(chat_guid)
            .push("message");

        let resp = self
            .client
            .get(url)
            .query(&[
                ("guid", self.password.as_str()),
                ("limit", limit.to_string().as_str()),
            ])
            .send()
            .await
            .context("request messages")?;
        let body = read_ok_json(resp).await.context("fetch messages")?;

        let raw = extract(&body, &["/data/data", "/data", "/messages"])
            .ok_or_else(|| anyhow!("message response has no data"))?;
        let mut messages: Vec<Message> =
            serde_json::from_value(raw.clone()).context("parse messages")?;

        let contacts = self.contacts().await;
        for msg in &mut messages {
            msg.chat_guid = Some(chat_guid.to_owned());
            if let Some(handle) = msg.handle.as_mut() {
                fill_name(&mut handle.display_name, &handle.address, &contacts);
            }
        }
        messages.reverse();
        Ok(messages)
    }

    pub async fn send_message(&self, chat_guid: &str, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "chatGuid": chat_guid,
            "message": text,
            "method": SEND_METHOD,
            "tempGuid": temp_guid()?,
        });

        let url = self.url("/api/v1/message/text")?;
        let resp = self
            .client
            .post(url)
            .query(&[("guid", self.password.as_str())])
            .json(&payload)
            .send()
            .await
            .context("send message")?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("send message failed (status {status}): {body}"));
        }
        Ok(())
    }

    /// Address to display-name map. Fetched once; an empty result is not
    /// cached so a later call retries.
    pub async fn contacts(&self) -> HashMap<String, String> {
        {
            let cached = self.contacts.lock().unwrap_or_else(|e| e.into_inner());
            if !cached.is_empty() {
                return cached.clone();
            }
        }

        let fetched = match self.fetch_contacts().await {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "contact lookup failed");
                HashMap::new()
            }
        };

        let mut cached = self.contacts.lock().unwrap_or_else(|e| e.into_inner());
        if cached.is_empty() {
            *cached = fetched.clone();
        }
        fetched
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.post_json("/api/v1/chat/query", &json!({ "limit": 1 }))
            .await
            .context("ping server")?;
        Ok(())
    }

    async fn fetch_contacts(&self) -> anyhow::Result<HashMap<String, String>> {
        #[derive(Debug, Deserialize)]
        struct PhoneNumber {
            #[serde(default, deserialize_with = "null_as_default")]
            address: String,
        }

        #[derive(Debug, Deserialize)]
        struct Contact {
            #[serde(rename = "displayName", default, deserialize_with = "null_as_default")]
            display_name: String,
            #[serde(rename = "phoneNumbers", default, deserialize_with = "null_as_default")]
            phone_numbers: Vec<PhoneNumber>,
        }

        let body = self.post_json("/api/v1/contact/query", &json!({})).await?;
        let Some(raw) = extract(&body, &["/data/data", "/data"]) else {
            return Ok(HashMap::new());
        };
        let contacts: Vec<Contact> = match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "unexpected contact payload");
                return Ok(HashMap::new());
            }
        };

        let mut map = HashMap::new();
        for contact in contacts {
            if contact.display_name.is_empty() {
                continue;
            }
            for phone in contact.phone_numbers {
                if !phone.address.is_empty() {
                    map.insert(phone.address, contact.display_name.clone());
                }
            }
        }
        Ok(map)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> anyhow::Result<Value> {
        let url = self.url(path)?;
        let resp = self
            .client
            .post(url)
            .query(&[("guid", self.password.as_str())])
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        read_ok_json(resp).await
    }

    fn url(&self, path: &str) -> anyhow::Result<url::Url> {
        url::Url::parse(&format!("{}{}", self.base_url, path))
            .with_context(|| format!("invalid server url {:?}", self.base_url))
    }
}

async fn read_ok_json(resp: reqwest::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let text = resp.text().await.context("read response body")?;
    if !status.is_success() {
        return Err(anyhow!("server error (status {status}): {text}"));
    }
    serde_json::from_str(&text).context("parse response json")
}

/// First non-null value among the JSON pointers, in order.
fn extract<'a>(body: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| body.pointer(p))
        .find(|v| !v.is_null())
}

fn fill_name(name: &mut Option<String>, address: &str, contacts: &HashMap<String, String>) {
    let missing = name.as_deref().map(str::trim).unwrap_or("").is_empty();
    if missing {
        if let Some(found) = contacts.get(address) {
            *name = Some(found.clone());
        }
    }
}

fn temp_guid() -> anyhow::Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow!("generate temp guid: {e}"))?;
    Ok(format!("temp-{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_skips_missing_and_null_paths() {
        let body = json!({"data": {"data": null, "chats": [1]}});
        assert_eq!(
            extract(&body, &["/data/data", "/data/chats", "/data"]),
            Some(&json!([1]))
        );

        let flat = json!({"data": [2]});
        assert_eq!(
            extract(&flat, &["/data/data", "/data/chats", "/data"]),
            Some(&json!([2]))
        );

        assert_eq!(extract(&json!({}), &["/data"]), None);
    }

    #[test]
    fn fill_name_only_replaces_blank_names() {
        let contacts = HashMap::from([("+1".to_owned(), "Ada".to_owned())]);

        let mut blank = Some(" ".to_owned());
        fill_name(&mut blank, "+1", &contacts);
        assert_eq!(blank.as_deref(), Some("Ada"));

        let mut set = Some("Grace".to_owned());
        fill_name(&mut set, "+1", &contacts);
        assert_eq!(set.as_deref(), Some("Grace"));

        let mut unknown = None;
        fill_name(&mut unknown, "+2", &contacts);
        assert_eq!(unknown, None);
    }

    #[test]
    fn temp_guids_are_unique() {
        let a = temp_guid().unwrap();
        let b = temp_guid().unwrap();
        assert!(a.starts_with("temp-"));
        assert_ne!(a, b);
    }
}
