use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod frame;

pub use frame::{parse_frame, Frame, FrameError};

pub const EVT_NEW_MESSAGE: &str = "new-message";
pub const EVT_UPDATED_MESSAGE: &str = "updated-message";
pub const EVT_CHAT_READ_STATUS_CHANGED: &str = "chat-read-status-changed";

/// A conversation thread (1:1 or group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub guid: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "chatIdentifier", default)]
    pub chat_identifier: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub participants: Vec<Handle>,
    #[serde(rename = "lastMessage", default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Box<Message>>,
}

impl Chat {
    /// Best human-readable label: contact name for 1:1 chats, then the
    /// chat's own name, the chat identifier, and finally a participant address.
    pub fn label(&self) -> String {
        if let [only] = self.participants.as_slice() {
            if let Some(name) = non_empty(only.display_name.as_deref()) {
                return name.to_owned();
            }
        }
        if let Some(name) = non_empty(self.display_name.as_deref()) {
            return name.to_owned();
        }
        if let Some(ident) = non_empty(self.chat_identifier.as_deref()) {
            return ident.to_owned();
        }
        self.participants
            .iter()
            .find_map(|p| non_empty(Some(p.address.as_str())))
            .map(str::to_owned)
            .unwrap_or_else(|| "Unknown".to_owned())
    }
}

/// A contact address (phone number or email).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(rename = "firstName", default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub guid: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "transferName", default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub guid: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "isFromMe", default, deserialize_with = "null_as_default")]
    pub is_from_me: bool,
    /// Milliseconds since the unix epoch.
    #[serde(rename = "dateCreated", default, deserialize_with = "null_as_default")]
    pub date_created: i64,
    #[serde(default)]
    pub handle: Option<Handle>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attachments: Vec<Attachment>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub chats: Vec<ChatRef>,
    /// Set by the history client, which knows which conversation it asked for.
    #[serde(rename = "chatGuid", default, skip_serializing_if = "Option::is_none")]
    pub chat_guid: Option<String>,
}

impl Message {
    /// The conversation this message belongs to. Realtime payloads carry it in
    /// `chats[0]`; history fetches inject `chat_guid`.
    pub fn conversation_id(&self) -> Option<&str> {
        non_empty(self.chat_guid.as_deref())
            .or_else(|| self.chats.first().and_then(|c| non_empty(Some(c.guid.as_str()))))
    }

    pub fn body(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn sender_label(&self) -> String {
        if self.is_from_me {
            return "You".to_owned();
        }
        match self.handle.as_ref() {
            Some(h) => non_empty(h.display_name.as_deref())
                .or_else(|| non_empty(Some(h.address.as_str())))
                .unwrap_or("Unknown")
                .to_owned(),
            None => "Unknown".to_owned(),
        }
    }
}

/// A decoded `[name, payload]` event frame before interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub data: Value,
}

/// Application events, decoded once at the protocol boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    NewMessage(Message),
    UpdatedMessage(Message),
    ChatReadStatusChanged { chat_guid: Option<String>, read: Option<bool> },
    Unknown { name: String, payload: Value },
}

impl ServerEvent {
    pub fn name(&self) -> &str {
        match self {
            ServerEvent::NewMessage(_) => EVT_NEW_MESSAGE,
            ServerEvent::UpdatedMessage(_) => EVT_UPDATED_MESSAGE,
            ServerEvent::ChatReadStatusChanged { .. } => EVT_CHAT_READ_STATUS_CHANGED,
            ServerEvent::Unknown { name, .. } => name.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadStatusPayload {
    #[serde(rename = "chatGuid", default)]
    chat_guid: Option<String>,
    #[serde(default)]
    read: Option<bool>,
}

impl From<WireEvent> for ServerEvent {
    /// Known event names whose payload does not match the expected shape
    /// degrade to `Unknown` rather than failing.
    fn from(evt: WireEvent) -> Self {
        match evt.r#type.as_str() {
            EVT_NEW_MESSAGE => match serde_json::from_value::<Message>(evt.data.clone()) {
                Ok(msg) => ServerEvent::NewMessage(msg),
                Err(_) => ServerEvent::Unknown {
                    name: evt.r#type,
                    payload: evt.data,
                },
            },
            EVT_UPDATED_MESSAGE => match serde_json::from_value::<Message>(evt.data.clone()) {
                Ok(msg) => ServerEvent::UpdatedMessage(msg),
                Err(_) => ServerEvent::Unknown {
                    name: evt.r#type,
                    payload: evt.data,
                },
            },
            EVT_CHAT_READ_STATUS_CHANGED => {
                match serde_json::from_value::<ReadStatusPayload>(evt.data.clone()) {
                    Ok(p) => ServerEvent::ChatReadStatusChanged {
                        chat_guid: p.chat_guid,
                        read: p.read,
                    },
                    Err(_) => ServerEvent::Unknown {
                        name: evt.r#type,
                        payload: evt.data,
                    },
                }
            }
            _ => ServerEvent::Unknown {
                name: evt.r#type,
                payload: evt.data,
            },
        }
    }
}

/// Reads an explicit `null` as the type's default, like a missing key.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_message_payload_decodes_conversation_from_chats() {
        let evt = WireEvent {
            r#type: EVT_NEW_MESSAGE.to_owned(),
            data: json!({
                "guid": "m-1",
                "text": "hi",
                "isFromMe": false,
                "dateCreated": 1_700_000_000_000i64,
                "handle": {"address": "+15551234", "firstName": "Ada"},
                "chats": [{"guid": "iMessage;-;+15551234"}]
            }),
        };

        let ServerEvent::NewMessage(msg) = ServerEvent::from(evt) else {
            panic!("expected new message");
        };
        assert_eq!(msg.conversation_id(), Some("iMessage;-;+15551234"));
        assert_eq!(msg.sender_label(), "Ada");
        assert_eq!(msg.body(), "hi");
    }

    #[test]
    fn injected_chat_guid_wins_over_chats_array() {
        let msg = Message {
            guid: "m".to_owned(),
            text: None,
            is_from_me: true,
            date_created: 0,
            handle: None,
            attachments: vec![],
            chats: vec![ChatRef {
                guid: "other".to_owned(),
            }],
            chat_guid: Some("mine".to_owned()),
        };
        assert_eq!(msg.conversation_id(), Some("mine"));
        assert_eq!(msg.sender_label(), "You");
    }

    #[test]
    fn malformed_known_event_degrades_to_unknown() {
        let evt = WireEvent {
            r#type: EVT_NEW_MESSAGE.to_owned(),
            data: json!("not an object"),
        };
        assert!(matches!(
            ServerEvent::from(evt),
            ServerEvent::Unknown { ref name, .. } if name == EVT_NEW_MESSAGE
        ));
    }

    #[test]
    fn null_collections_in_a_live_message_decode_as_empty() {
        let evt = WireEvent {
            r#type: EVT_NEW_MESSAGE.to_owned(),
            data: json!({
                "guid": "m-2",
                "text": "hey",
                "isFromMe": null,
                "dateCreated": 5,
                "handle": {"address": null, "firstName": "Ada"},
                "attachments": null,
                "chats": [{"guid": "c1"}]
            }),
        };

        let ServerEvent::NewMessage(msg) = ServerEvent::from(evt) else {
            panic!("expected new message");
        };
        assert!(msg.attachments.is_empty());
        assert!(!msg.is_from_me);
        assert_eq!(msg.conversation_id(), Some("c1"));
        assert_eq!(msg.sender_label(), "Ada");

        let no_chats: Message =
            serde_json::from_value(json!({"guid": "m-3", "chats": null})).unwrap();
        assert!(no_chats.chats.is_empty());
        assert_eq!(no_chats.conversation_id(), None);
    }

    #[test]
    fn chat_with_null_participants_decodes() {
        let chats: Vec<Chat> = serde_json::from_value(json!([
            {"guid": "a", "displayName": "Team", "participants": null},
            {"guid": "b", "participants": [{"address": "+1"}]}
        ]))
        .unwrap();
        assert!(chats[0].participants.is_empty());
        assert_eq!(chats[0].label(), "Team");
        assert_eq!(chats[1].label(), "+1");
    }

    #[test]
    fn chat_label_prefers_single_participant_name() {
        let chat: Chat = serde_json::from_value(json!({
            "guid": "c",
            "displayName": "",
            "chatIdentifier": "+1555",
            "participants": [{"address": "+1555", "firstName": "Grace"}]
        }))
        .unwrap();
        assert_eq!(chat.label(), "Grace");

        let group: Chat = serde_json::from_value(json!({
            "guid": "g",
            "displayName": "Climbing",
            "participants": [{"address": "a"}, {"address": "b"}]
        }))
        .unwrap();
        assert_eq!(group.label(), "Climbing");

        let bare: Chat = serde_json::from_value(json!({"guid": "x"})).unwrap();
        assert_eq!(bare.label(), "Unknown");
    }
}
