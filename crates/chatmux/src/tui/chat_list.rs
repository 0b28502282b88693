use std::collections::HashSet;

use chatmux_protocol::{Chat, Message};

/// Sidebar conversation list. Unread flags are keyed by conversation id so
/// they survive list reloads and may name chats not yet listed.
#[derive(Debug, Clone, Default)]
pub struct ChatList {
    chats: Vec<Chat>,
    unread: HashSet<String>,
    selected: usize,
    loaded: bool,
}

impl ChatList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_chat(&self) -> Option<&Chat> {
        self.chats.get(self.selected)
    }

    pub fn get(&self, guid: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.guid == guid)
    }

    pub fn label(&self, guid: &str) -> String {
        self.get(guid)
            .map(Chat::label)
            .unwrap_or_else(|| guid.to_owned())
    }

    /// Replaces the list, keeping the selection on the same conversation
    /// when it is still present.
    pub fn replace(&mut self, chats: Vec<Chat>) {
        let keep = self.selected_chat().map(|c| c.guid.clone());
        self.chats = chats;
        self.loaded = true;
        self.selected = keep
            .and_then(|guid| self.chats.iter().position(|c| c.guid == guid))
            .unwrap_or(0);
        self.clamp();
    }

    pub fn is_unread(&self, guid: &str) -> bool {
        self.unread.contains(guid)
    }

    pub fn mark_unread(&mut self, guid: &str) {
        self.unread.insert(guid.to_owned());
    }

    pub fn clear_unread(&mut self, guid: &str) {
        self.unread.remove(guid);
    }

    /// Records a newer message as the conversation's preview and moves the
    /// conversation to the top. Returns `false` if the chat is not listed.
    pub fn note_message(&mut self, guid: &str, msg: &Message) -> bool {
        let Some(pos) = self.chats.iter().position(|c| c.guid == guid) else {
            return false;
        };
        let newer = self.chats[pos]
            .last_message
            .as_ref()
            .map_or(true, |m| m.date_created <= msg.date_created);
        if !newer {
            return true;
        }

        let keep = self.selected_chat().map(|c| c.guid.clone());
        let mut chat = self.chats.remove(pos);
        chat.last_message = Some(Box::new(msg.clone()));
        self.chats.insert(0, chat);
        if let Some(guid) = keep {
            if let Some(idx) = self.chats.iter().position(|c| c.guid == guid) {
                self.selected = idx;
            }
        }
        true
    }

    pub fn move_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn move_down(&mut self, n: usize) {
        self.selected = self.selected.saturating_add(n);
        self.clamp();
    }

    pub fn go_top(&mut self) {
        self.selected = 0;
    }

    pub fn go_bottom(&mut self) {
        self.selected = self.chats.len().saturating_sub(1);
    }

    fn clamp(&mut self) {
        self.selected = self.selected.min(self.chats.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(guid: &str) -> Chat {
        Chat {
            guid: guid.to_owned(),
            display_name: Some(guid.to_uppercase()),
            chat_identifier: None,
            participants: vec![],
            last_message: None,
        }
    }

    fn message(at: i64) -> Message {
        Message {
            guid: format!("m{at}"),
            text: Some("hey".to_owned()),
            is_from_me: false,
            date_created: at,
            handle: None,
            attachments: vec![],
            chats: vec![],
            chat_guid: None,
        }
    }

    #[test]
    fn replace_keeps_selection_and_unread_flags() {
        let mut list = ChatList::new();
        list.replace(vec![chat("a"), chat("b"), chat("c")]);
        list.move_down(2);
        list.mark_unread("b");

        list.replace(vec![chat("c"), chat("b")]);
        assert_eq!(list.selected_chat().map(|c| c.guid.as_str()), Some("c"));
        assert!(list.is_unread("b"));

        list.replace(vec![chat("x")]);
        assert_eq!(list.selected_index(), 0);
    }

    #[test]
    fn note_message_bumps_chat_to_top() {
        let mut list = ChatList::new();
        list.replace(vec![chat("a"), chat("b")]);
        assert!(list.note_message("b", &message(5)));
        assert_eq!(list.chats()[0].guid, "b");
        assert_eq!(list.selected_chat().map(|c| c.guid.as_str()), Some("a"));

        // An older message does not reorder or replace the preview.
        assert!(list.note_message("a", &message(1)));
        assert!(list.note_message("b", &message(3)));
        assert_eq!(list.chats()[0].guid, "a");
        assert_eq!(
            list.get("b").and_then(|c| c.last_message.as_ref()).map(|m| m.date_created),
            Some(5)
        );
        assert!(!list.note_message("zzz", &message(9)));
    }

    #[test]
    fn movement_is_clamped() {
        let mut list = ChatList::new();
        list.move_down(3);
        assert_eq!(list.selected_index(), 0);
        list.replace(vec![chat("a"), chat("b")]);
        list.move_down(10);
        assert_eq!(list.selected_index(), 1);
        list.move_up(10);
        assert_eq!(list.selected_index(), 0);
        list.go_bottom();
        assert_eq!(list.selected_index(), 1);
        list.go_top();
        assert_eq!(list.selected_index(), 0);
        assert_eq!(list.label("b"), "B");
        assert_eq!(list.label("nope"), "nope");
    }
}
