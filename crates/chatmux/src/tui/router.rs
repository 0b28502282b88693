//! Applies realtime server events to the UI model.

use chatmux_protocol::{Message, ServerEvent};
use tracing::{debug, trace};

use super::core::{refresh_pane, Effect, Model};

pub fn route_event(model: &mut Model, event: ServerEvent, effects: &mut Vec<Effect>) {
    match event {
        ServerEvent::NewMessage(msg) => route_new_message(model, msg, effects),
        other => debug!(event = other.name(), "ignoring event"),
    }
}

/// Caches the message once; every pane showing its conversation is
/// re-rendered, otherwise the conversation is flagged unread.
fn route_new_message(model: &mut Model, msg: Message, effects: &mut Vec<Effect>) {
    let Some(conversation) = msg.conversation_id().map(str::to_owned) else {
        debug!(guid = %msg.guid, "message without a conversation");
        return;
    };

    if !model.cache.insert(&conversation, msg.clone()) {
        trace!(guid = %msg.guid, "duplicate message");
        return;
    }

    if !model.chat_list.note_message(&conversation, &msg) {
        effects.push(Effect::FetchChats {
            limit: model.settings.chat_limit,
        });
    }

    let showing = model.windows.panes_showing(&conversation);
    if showing.is_empty() {
        if !msg.is_from_me {
            model.chat_list.mark_unread(&conversation);
        }
        return;
    }
    for id in showing {
        refresh_pane(model, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::core::tests::{loaded, message};
    use crate::tui::core::{reduce, Action, Msg};

    #[test]
    fn message_for_open_conversation_reaches_every_pane_showing_it() {
        let mut model = loaded();
        (model, _) = reduce(model, Msg::Action(Action::Char('v')));
        model.windows.set_conversation(1, "a", "Chat a");

        let mut effects = Vec::new();
        route_event(
            &mut model,
            ServerEvent::NewMessage(message("m1", "a", "hello", 10)),
            &mut effects,
        );
        assert!(effects.is_empty());
        assert_eq!(model.cache.messages("a").len(), 1);
        for id in [0, 1] {
            let pane = model.windows.pane(id).unwrap();
            assert_eq!(pane.view.lines.len(), 1);
        }
        assert!(!model.chat_list.is_unread("a"));
    }

    #[test]
    fn message_for_hidden_conversation_marks_unread() {
        let mut model = loaded();
        let mut effects = Vec::new();
        route_event(
            &mut model,
            ServerEvent::NewMessage(message("m1", "b", "psst", 10)),
            &mut effects,
        );
        assert!(model.chat_list.is_unread("b"));
        assert_eq!(model.chat_list.chats()[0].guid, "b");
        assert_eq!(model.cache.messages("b").len(), 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let mut model = loaded();
        let mut effects = Vec::new();
        for _ in 0..2 {
            route_event(
                &mut model,
                ServerEvent::NewMessage(message("m1", "a", "once", 10)),
                &mut effects,
            );
        }
        assert_eq!(model.cache.messages("a").len(), 1);
        assert_eq!(model.windows.focused_pane().unwrap().view.lines.len(), 1);
    }

    #[test]
    fn unknown_conversation_triggers_list_reload() {
        let mut model = loaded();
        let mut effects = Vec::new();
        route_event(
            &mut model,
            ServerEvent::NewMessage(message("m1", "new-chat", "hi", 10)),
            &mut effects,
        );
        assert!(model.chat_list.is_unread("new-chat"));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::FetchChats { .. }));
    }

    #[test]
    fn other_events_leave_the_model_alone() {
        let mut model = loaded();
        let mut effects = Vec::new();
        route_event(
            &mut model,
            ServerEvent::UpdatedMessage(message("m1", "b", "edit", 10)),
            &mut effects,
        );
        route_event(
            &mut model,
            ServerEvent::ChatReadStatusChanged {
                chat_guid: Some("b".to_owned()),
                read: Some(true),
            },
            &mut effects,
        );
        assert!(effects.is_empty());
        assert!(model.cache.messages("b").is_empty());
        assert!(!model.chat_list.is_unread("b"));
    }
}
