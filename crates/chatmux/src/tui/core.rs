use std::time::Duration;

use chatmux_core::cache::ConversationCache;
use chatmux_core::config::{
    DEFAULT_CHAT_LIMIT, DEFAULT_MAX_PANES, DEFAULT_MESSAGE_LIMIT, DEFAULT_POLL_INTERVAL_SECS,
};
use chatmux_core::layout::{Bounds, PaneId, SplitDirection};
use chatmux_protocol::{Chat, Message, ServerEvent};
use time::UtcOffset;

use super::chat::{self, RenderOptions};
use super::chat_list::ChatList;
use super::router;
use super::theme::SIDEBAR_WIDTH;
use super::windows::{FocusDirection, WindowManager, RESIZE_STEP};
use crate::realtime::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    ChatList,
    Panes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Input,
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub message_limit: usize,
    pub chat_limit: usize,
    pub poll_interval: Duration,
    pub max_panes: usize,
    pub show_timestamps: bool,
    pub utc_offset: UtcOffset,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            message_limit: DEFAULT_MESSAGE_LIMIT,
            chat_limit: DEFAULT_CHAT_LIMIT,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_panes: DEFAULT_MAX_PANES,
            show_timestamps: true,
            utc_offset: UtcOffset::UTC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    pub width: u16,
    pub height: u16,
    pub now_ms: u64,
    pub next_poll_ms: u64,

    pub focus: Focus,
    pub mode: Mode,
    pub connection: ConnectionState,

    pub chat_list: ChatList,
    pub windows: WindowManager,
    pub cache: ConversationCache,

    pub settings: Settings,
    pub status: Option<String>,
}

impl Model {
    pub fn new(settings: Settings) -> Self {
        Self {
            width: 0,
            height: 0,
            now_ms: 0,
            next_poll_ms: 0,
            focus: Focus::ChatList,
            mode: Mode::Normal,
            connection: ConnectionState::Disconnected,
            chat_list: ChatList::new(),
            windows: WindowManager::new(settings.max_panes),
            cache: ConversationCache::new(),
            settings,
            status: None,
        }
    }

    pub fn focused_conversation(&self) -> Option<&str> {
        self.windows.focused_pane()?.conversation.as_deref()
    }

    #[cfg(test)]
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.mode, Mode::Input) {
            if !matches!(self.focus, Focus::Panes) {
                return Err("input mode requires pane focus".to_owned());
            }
            if self.focused_conversation().is_none() {
                return Err("input mode requires a conversation".to_owned());
            }
        }
        self.windows.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Tab,
    MoveUp,
    MoveDown,
    GoTop,
    GoBottom,
    PageUp,
    PageDown,
    Enter,
    ShiftEnter,
    Backspace,
    Char(char),
    Cancel,
    Focus(FocusDirection),
}

#[derive(Debug, Clone)]
pub enum Msg {
    Init,
    Resize {
        width: u16,
        height: u16,
    },
    Tick {
        now_ms: u64,
    },
    Action(Action),
    Paste(String),

    ChatsLoaded(Result<Vec<Chat>, String>),
    HistoryLoaded {
        conversation: String,
        result: Result<Vec<Message>, String>,
    },
    SendFinished {
        conversation: String,
        result: Result<(), String>,
    },

    Server(ServerEvent),
    Connection(ConnectionState),
    ConnectFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchChats { limit: usize },
    FetchHistory { conversation: String, limit: usize },
    SendMessage { conversation: String, text: String },
    Connect,
    Quit,
}

pub fn reduce(mut model: Model, msg: Msg) -> (Model, Vec<Effect>) {
    let mut effects = Vec::new();

    match msg {
        Msg::Init => {
            effects.push(Effect::FetchChats {
                limit: model.settings.chat_limit,
            });
            effects.push(Effect::Connect);
        }
        Msg::Resize { width, height } => {
            model.width = width;
            model.height = height;
            model.windows.set_area(pane_area(width, height));
            refresh_all(&mut model);
        }
        Msg::Tick { now_ms } => {
            model.now_ms = now_ms;
            if matches!(model.connection, ConnectionState::Open) {
                model.next_poll_ms = 0;
            } else if model.next_poll_ms == 0 {
                model.next_poll_ms = now_ms.saturating_add(poll_interval_ms(&model));
            } else if now_ms >= model.next_poll_ms {
                model.next_poll_ms = now_ms.saturating_add(poll_interval_ms(&model));
                resync(&model, &mut effects);
            }
        }
        Msg::Action(action) => match model.mode {
            Mode::Input => handle_input(&mut model, action, &mut effects),
            Mode::Normal => handle_normal(&mut model, action, &mut effects),
        },
        Msg::Paste(text) => {
            if matches!(model.mode, Mode::Input) {
                if let Some(pane) = model.windows.focused_pane_mut() {
                    pane.editor.insert_str(&text);
                }
            }
        }
        Msg::ChatsLoaded(Ok(chats)) => {
            let first_load = !model.chat_list.is_loaded();
            for chat in &chats {
                if let Some(last) = chat.last_message.as_deref() {
                    model.cache.insert(&chat.guid, last.clone());
                }
            }
            model.chat_list.replace(chats);
            model.status = None;
            refresh_all(&mut model);

            let nothing_open = model.windows.panes().all(|p| p.conversation.is_none());
            if first_load && nothing_open {
                if let Some(guid) = model.chat_list.selected_chat().map(|c| c.guid.clone()) {
                    let pane = model.windows.focused_id();
                    open_in_pane(&mut model, pane, &guid, &mut effects);
                }
            }
        }
        Msg::ChatsLoaded(Err(err)) => {
            model.status = Some(format!("load chats: {err}"));
        }
        Msg::HistoryLoaded {
            conversation,
            result,
        } => {
            match result {
                Ok(messages) => {
                    model.cache.set_history(&conversation, messages);
                }
                Err(err) => {
                    model.status = Some(format!("load messages: {err}"));
                }
            }
            for id in model.windows.panes_showing(&conversation) {
                if let Some(pane) = model.windows.pane_mut(id) {
                    pane.view.loading = false;
                }
                refresh_pane(&mut model, id);
            }
        }
        Msg::SendFinished {
            conversation,
            result,
        } => match result {
            Ok(()) => {
                effects.push(Effect::FetchHistory {
                    conversation,
                    limit: model.settings.message_limit,
                });
            }
            Err(err) => {
                model.status = Some(format!("send failed: {err}"));
            }
        },
        Msg::Server(event) => {
            router::route_event(&mut model, event, &mut effects);
        }
        Msg::Connection(state) => {
            let was_open = matches!(model.connection, ConnectionState::Open);
            model.connection = state;
            if matches!(state, ConnectionState::Open) && !was_open && model.chat_list.is_loaded() {
                resync(&model, &mut effects);
            }
        }
        Msg::ConnectFailed { reason } => {
            model.status = Some(format!("realtime: {reason}"));
        }
    }

    (model, effects)
}

fn handle_input(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    match action {
        Action::Quit => effects.push(Effect::Quit),
        Action::Cancel | Action::Tab => model.mode = Mode::Normal,
        Action::Focus(direction) => {
            model.mode = Mode::Normal;
            focus_toward(model, direction);
        }
        Action::Enter => {
            let Some(pane) = model.windows.focused_pane_mut() else {
                model.mode = Mode::Normal;
                return;
            };
            let Some(conversation) = pane.conversation.clone() else {
                model.mode = Mode::Normal;
                return;
            };
            if let Some(text) = pane.editor.take_submit() {
                effects.push(Effect::SendMessage { conversation, text });
            }
        }
        Action::ShiftEnter => edit_focused(model, |e| e.insert_newline()),
        Action::Backspace => edit_focused(model, |e| e.backspace()),
        Action::Char(ch) => edit_focused(model, |e| e.insert_char(ch)),
        Action::MoveUp => edit_focused(model, |e| e.recall_prev()),
        Action::MoveDown => edit_focused(model, |e| e.recall_next()),
        Action::PageUp | Action::PageDown | Action::GoTop | Action::GoBottom => {
            scroll_focused(model, action);
        }
    }
}

fn handle_normal(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    match action {
        Action::Quit => effects.push(Effect::Quit),
        Action::Tab => match model.focus {
            Focus::ChatList => {
                model.focus = Focus::Panes;
                model.windows.focus_first();
            }
            Focus::Panes => {
                if !model.windows.cycle_focus() {
                    model.focus = Focus::ChatList;
                }
            }
        },
        Action::Cancel => model.status = None,
        Action::Focus(direction) => focus_toward(model, direction),
        Action::Enter => enter(model, effects),
        Action::MoveUp
        | Action::MoveDown
        | Action::GoTop
        | Action::GoBottom
        | Action::PageUp
        | Action::PageDown => match model.focus {
            Focus::ChatList => move_selection(model, action),
            Focus::Panes => scroll_focused(model, action),
        },
        Action::ShiftEnter | Action::Backspace => {}
        Action::Char(ch) => match ch {
            'q' => effects.push(Effect::Quit),
            'j' => handle_normal(model, Action::MoveDown, effects),
            'k' => handle_normal(model, Action::MoveUp, effects),
            'g' => handle_normal(model, Action::GoTop, effects),
            'G' => handle_normal(model, Action::GoBottom, effects),
            'H' => focus_toward(model, FocusDirection::Left),
            'J' => focus_toward(model, FocusDirection::Down),
            'K' => focus_toward(model, FocusDirection::Up),
            'L' => focus_toward(model, FocusDirection::Right),
            'v' => split(model, SplitDirection::Horizontal),
            's' => split(model, SplitDirection::Vertical),
            'c' => {
                if model.windows.close_focused() {
                    refresh_all(model);
                } else {
                    model.status = Some("cannot close the last pane".to_owned());
                }
            }
            '<' => resize(model, -RESIZE_STEP),
            '>' => resize(model, RESIZE_STEP),
            't' => {
                model.settings.show_timestamps = !model.settings.show_timestamps;
                refresh_all(model);
            }
            'R' => resync(model, effects),
            'r' => {
                if matches!(model.connection, ConnectionState::Disconnected) {
                    effects.push(Effect::Connect);
                }
            }
            _ => {}
        },
    }
}

fn enter(model: &mut Model, effects: &mut Vec<Effect>) {
    match model.focus {
        Focus::ChatList => {
            let Some(guid) = model.chat_list.selected_chat().map(|c| c.guid.clone()) else {
                return;
            };
            let pane = model.windows.focused_id();
            open_in_pane(model, pane, &guid, effects);
            model.focus = Focus::Panes;
        }
        Focus::Panes => {
            if model.focused_conversation().is_some() {
                model.mode = Mode::Input;
            } else {
                model.focus = Focus::ChatList;
            }
        }
    }
}

fn open_in_pane(model: &mut Model, pane: PaneId, guid: &str, effects: &mut Vec<Effect>) {
    let title = model.chat_list.label(guid);
    if !model.windows.set_conversation(pane, guid, &title) {
        return;
    }
    model.chat_list.clear_unread(guid);
    if let Some(p) = model.windows.pane_mut(pane) {
        p.view.loading = true;
    }
    refresh_pane(model, pane);
    effects.push(Effect::FetchHistory {
        conversation: guid.to_owned(),
        limit: model.settings.message_limit,
    });
}

fn focus_toward(model: &mut Model, direction: FocusDirection) {
    match model.focus {
        Focus::ChatList => {
            if direction == FocusDirection::Right {
                model.focus = Focus::Panes;
            }
        }
        Focus::Panes => {
            if !model.windows.focus_direction(direction) && direction == FocusDirection::Left {
                model.focus = Focus::ChatList;
            }
        }
    }
}

fn split(model: &mut Model, direction: SplitDirection) {
    if model.windows.split_focused(direction) {
        model.focus = Focus::Panes;
        refresh_all(model);
    } else {
        model.status = Some(format!(
            "pane limit reached ({})",
            model.windows.max_panes()
        ));
    }
}

fn resize(model: &mut Model, delta: f32) {
    if matches!(model.focus, Focus::Panes) && model.windows.resize_focused(delta) {
        refresh_all(model);
    }
}

fn move_selection(model: &mut Model, action: Action) {
    let page = usize::from(model.height.saturating_sub(4)).max(1);
    let list = &mut model.chat_list;
    match action {
        Action::MoveUp => list.move_up(1),
        Action::MoveDown => list.move_down(1),
        Action::GoTop => list.go_top(),
        Action::GoBottom => list.go_bottom(),
        Action::PageUp => list.move_up(page),
        Action::PageDown => list.move_down(page),
        _ => {}
    }
}

fn scroll_focused(model: &mut Model, action: Action) {
    let Some(pane) = model.windows.focused_pane_mut() else {
        return;
    };
    let (_, height) = pane.viewport();
    let view = &mut pane.view;
    match action {
        Action::MoveUp => view.scroll_up(1),
        Action::MoveDown => view.scroll_down(height, 1),
        Action::GoTop => view.jump_top(),
        Action::GoBottom => view.jump_bottom(height),
        Action::PageUp => view.scroll_up(height.max(1)),
        Action::PageDown => view.scroll_down(height, height.max(1)),
        _ => {}
    }
}

fn edit_focused(model: &mut Model, f: impl FnOnce(&mut super::editor::Editor)) {
    if let Some(pane) = model.windows.focused_pane_mut() {
        f(&mut pane.editor);
    }
}

/// Reloads the chat list and the history of every conversation on screen.
fn resync(model: &Model, effects: &mut Vec<Effect>) {
    effects.push(Effect::FetchChats {
        limit: model.settings.chat_limit,
    });
    let mut seen: Vec<&str> = Vec::new();
    for pane in model.windows.panes() {
        if let Some(conv) = pane.conversation.as_deref() {
            if !seen.contains(&conv) {
                seen.push(conv);
                effects.push(Effect::FetchHistory {
                    conversation: conv.to_owned(),
                    limit: model.settings.message_limit,
                });
            }
        }
    }
}

fn poll_interval_ms(model: &Model) -> u64 {
    let ms = model.settings.poll_interval.as_millis().min(u128::from(u64::MAX)) as u64;
    ms.max(1_000)
}

/// Everything right of the sidebar, between the header and footer rows.
pub fn pane_area(width: u16, height: u16) -> Bounds {
    let x = SIDEBAR_WIDTH.min(width);
    Bounds::new(x, 1, width - x, height.saturating_sub(2))
}

/// Re-renders a pane's lines from the cache at its current size.
pub(super) fn refresh_pane(model: &mut Model, id: PaneId) {
    let Model {
        windows,
        cache,
        settings,
        ..
    } = model;
    let Some(pane) = windows.pane_mut(id) else {
        return;
    };
    let Some(conversation) = pane.conversation.clone() else {
        pane.view.clear();
        return;
    };
    let (width, height) = pane.viewport();
    let lines = chat::rebuild_lines(
        cache.messages(&conversation),
        RenderOptions {
            width,
            show_timestamps: settings.show_timestamps,
            utc_offset: settings.utc_offset,
        },
    );
    pane.view.set_lines(lines, height);
}

fn refresh_all(model: &mut Model) {
    for id in model.windows.pane_ids() {
        refresh_pane(model, id);
    }
}

pub struct HelpItem {
    pub key: &'static str,
    pub desc: &'static str,
}

pub fn help_items(model: &Model) -> Vec<HelpItem> {
    let item = |key: &'static str, desc: &'static str| HelpItem { key, desc };

    if matches!(model.mode, Mode::Input) {
        return vec![
            item("Enter", "send"),
            item("Shift+Enter", "newline"),
            item("↑/↓", "history"),
            item("Esc", "done"),
            item("Ctrl+C", "quit"),
        ];
    }

    let mut items = vec![item("Tab", "focus")];
    match model.focus {
        Focus::ChatList => {
            items.push(item("j/k", "select"));
            items.push(item("Enter", "open"));
        }
        Focus::Panes => {
            items.push(item("j/k", "scroll"));
            items.push(item("Enter", "type"));
            items.push(item("v/s", "split"));
            items.push(item("c", "close"));
            items.push(item("H/J/K/L", "move"));
            items.push(item("</>", "resize"));
        }
    }
    items.push(item("t", "timestamps"));
    items.push(item("R", "reload"));
    if matches!(model.connection, ConnectionState::Disconnected) {
        items.push(item("r", "reconnect"));
    }
    items.push(item("q", "quit"));
    items
}
