use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use chatmux_protocol::ServerEvent;
use crossterm::event::{Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, terminal};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::client::ChatBackend;
use super::core::{reduce, Action, Effect, Model, Msg, Settings};
use super::theme::Theme;
use super::view;
use super::windows::FocusDirection;
use crate::realtime::{ConnectionState, RealtimeClient};

struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<(Self, Terminal<CrosstermBackend<Stdout>>)> {
        enable_raw_mode().context("enable raw mode")?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableBracketedPaste,
            terminal::Clear(terminal::ClearType::All)
        )
        .context("enter alt screen")?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("create terminal")?;

        Ok((
            Self {
                stdout: io::stdout(),
            },
            terminal,
        ))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, DisableBracketedPaste, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub async fn run(
    backend: Arc<dyn ChatBackend>,
    realtime: Arc<RealtimeClient>,
    events: mpsc::Receiver<ServerEvent>,
    settings: Settings,
) -> Result<()> {
    let theme = Theme::default();
    let shutdown = Arc::new(AtomicBool::new(false));

    let (_guard, mut terminal) = TerminalGuard::enter()?;

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
    spawn_input_pump(msg_tx.clone(), shutdown.clone());
    spawn_tick_pump(msg_tx.clone(), shutdown.clone());
    spawn_event_pump(events, msg_tx.clone(), shutdown.clone());
    spawn_state_pump(realtime.subscribe_state(), msg_tx.clone(), shutdown.clone());

    let mut model = Model::new(settings);
    let size = terminal.size().context("terminal size")?;
    (model, _) = reduce(
        model,
        Msg::Resize {
            width: size.width,
            height: size.height,
        },
    );

    let (next, effects) = reduce(model, Msg::Init);
    model = next;
    let mut quit = apply_effects(effects, &backend, &realtime, &msg_tx);
    terminal
        .draw(|f| view::draw(f, &model, &theme))
        .context("draw")?;

    while !quit {
        let Some(msg) = msg_rx.recv().await else {
            break;
        };
        let (next, effects) = reduce(model, msg);
        model = next;
        quit = apply_effects(effects, &backend, &realtime, &msg_tx);
        terminal
            .draw(|f| view::draw(f, &model, &theme))
            .context("draw")?;
    }

    info!("shutting down");
    shutdown.store(true, Ordering::Relaxed);
    realtime.close().await;
    Ok(())
}

fn spawn_input_pump(tx: mpsc::UnboundedSender<Msg>, shutdown: Arc<AtomicBool>) {
    tokio::task::spawn_blocking(move || {
        while !shutdown.load(Ordering::Relaxed) {
            let ready = match crossterm::event::poll(Duration::from_millis(50)) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if !ready {
                continue;
            }

            let evt = match crossterm::event::read() {
                Ok(evt) => evt,
                Err(_) => continue,
            };

            let msg = match evt {
                CEvent::Key(key) => map_key(key).map(Msg::Action),
                CEvent::Paste(text) => Some(Msg::Paste(text)),
                CEvent::Resize(w, h) => Some(Msg::Resize {
                    width: w,
                    height: h,
                }),
                _ => None,
            };

            if let Some(msg) = msg {
                if tx.send(msg).is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_tick_pump(tx: mpsc::UnboundedSender<Msg>, shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(200));
        loop {
            interval.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let _ = tx.send(Msg::Tick {
                now_ms: unix_epoch_ms(),
            });
        }
    });
}

/// Single consumer of the realtime event queue; forwards events to the
/// reducer in arrival order.
fn spawn_event_pump(
    mut events: mpsc::Receiver<ServerEvent>,
    tx: mpsc::UnboundedSender<Msg>,
    shutdown: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            if tx.send(Msg::Server(event)).is_err() {
                break;
            }
        }
        debug!("event pump stopped");
    });
}

fn spawn_state_pump(
    mut state: watch::Receiver<ConnectionState>,
    tx: mpsc::UnboundedSender<Msg>,
    shutdown: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        loop {
            let current = *state.borrow_and_update();
            if tx.send(Msg::Connection(current)).is_err() {
                return;
            }
            if state.changed().await.is_err() || shutdown.load(Ordering::Relaxed) {
                return;
            }
        }
    });
}

fn unix_epoch_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis().min(u64::MAX as u128) as u64
}

fn map_key(key: KeyEvent) -> Option<Action> {
    if !matches!(key.kind, KeyEventKind::Press) {
        return None;
    }

    if matches!(key.code, KeyCode::Char('c')) && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    if key.modifiers.contains(KeyModifiers::ALT) {
        return match key.code {
            KeyCode::Left => Some(Action::Focus(FocusDirection::Left)),
            KeyCode::Right => Some(Action::Focus(FocusDirection::Right)),
            KeyCode::Up => Some(Action::Focus(FocusDirection::Up)),
            KeyCode::Down => Some(Action::Focus(FocusDirection::Down)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Tab => Some(Action::Tab),
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Home => Some(Action::GoTop),
        KeyCode::End => Some(Action::GoBottom),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Enter => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                Some(Action::ShiftEnter)
            } else {
                Some(Action::Enter)
            }
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                None
            } else {
                Some(Action::Char(c))
            }
        }
        _ => None,
    }
}

/// Starts each effect as its own task; results come back as messages.
/// Returns `true` when the app should quit.
fn apply_effects(
    effects: Vec<Effect>,
    backend: &Arc<dyn ChatBackend>,
    realtime: &Arc<RealtimeClient>,
    tx: &mpsc::UnboundedSender<Msg>,
) -> bool {
    let mut quit = false;

    for effect in effects {
        let tx = tx.clone();
        match effect {
            Effect::Quit => quit = true,
            Effect::FetchChats { limit } => {
                let backend = backend.clone();
                tokio::spawn(async move {
                    let result = backend
                        .list_chats(limit)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = tx.send(Msg::ChatsLoaded(result));
                });
            }
            Effect::FetchHistory {
                conversation,
                limit,
            } => {
                let backend = backend.clone();
                tokio::spawn(async move {
                    let result = backend
                        .list_messages(conversation.clone(), limit)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = tx.send(Msg::HistoryLoaded {
                        conversation,
                        result,
                    });
                });
            }
            Effect::SendMessage { conversation, text } => {
                let backend = backend.clone();
                tokio::spawn(async move {
                    let result = backend
                        .send_message(conversation.clone(), text)
                        .await
                        .map_err(|err| format!("{err:#}"));
                    let _ = tx.send(Msg::SendFinished {
                        conversation,
                        result,
                    });
                });
            }
            Effect::Connect => {
                let realtime = realtime.clone();
                tokio::spawn(async move {
                    if let Err(err) = realtime.connect().await {
                        let _ = tx.send(Msg::ConnectFailed {
                            reason: format!("{err:#}"),
                        });
                    }
                });
            }
        }
    }

    quit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keymap_maps_expected_actions() {
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Action::Char('q'))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('H'), KeyModifiers::SHIFT)),
            Some(Action::Char('H'))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Left, KeyModifiers::ALT)),
            Some(Action::Focus(FocusDirection::Left))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Down, KeyModifiers::ALT)),
            Some(Action::Focus(FocusDirection::Down))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT)),
            None
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)),
            Some(Action::Tab)
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Enter)
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT)),
            Some(Action::ShiftEnter)
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            Some(Action::Cancel)
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('<'), KeyModifiers::NONE)),
            Some(Action::Char('<'))
        );
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE)),
            Some(Action::PageDown)
        );
    }
}
