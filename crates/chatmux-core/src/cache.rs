//! Per-conversation message store shared by every pane.

use std::collections::{HashMap, HashSet};

use chatmux_protocol::Message;

#[derive(Debug, Clone, Default)]
pub struct ConversationEntry {
    messages: Vec<Message>,
    ids: HashSet<String>,
    last_activity_ms: i64,
}

impl ConversationEntry {
    /// Messages sorted by send time, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_activity_ms(&self) -> i64 {
        self.last_activity_ms
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn insert(&mut self, msg: Message) -> bool {
        if !self.ids.insert(msg.guid.clone()) {
            return false;
        }
        self.last_activity_ms = self.last_activity_ms.max(msg.date_created);
        // Equal timestamps keep arrival order.
        let at = self
            .messages
            .partition_point(|m| m.date_created <= msg.date_created);
        self.messages.insert(at, msg);
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationCache {
    entries: HashMap<String, ConversationEntry>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `msg` to `conversation`. Returns `false` when the message id is
    /// already known, in which case nothing changes.
    pub fn insert(&mut self, conversation: &str, msg: Message) -> bool {
        self.entries
            .entry(conversation.to_owned())
            .or_default()
            .insert(msg)
    }

    /// Merges a freshly fetched history page into the entry. Messages that
    /// arrived live while the fetch was in flight are kept.
    pub fn set_history(&mut self, conversation: &str, history: Vec<Message>) -> usize {
        let entry = self.entries.entry(conversation.to_owned()).or_default();
        history
            .into_iter()
            .filter(|msg| entry.insert(msg.clone()))
            .count()
    }

    pub fn get(&self, conversation: &str) -> Option<&ConversationEntry> {
        self.entries.get(conversation)
    }

    pub fn messages(&self, conversation: &str) -> &[Message] {
        self.entries
            .get(conversation)
            .map(ConversationEntry::messages)
            .unwrap_or(&[])
    }

    pub fn contains(&self, conversation: &str) -> bool {
        self.entries.contains_key(conversation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
