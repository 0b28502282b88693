use chatmux_core::layout::{Bounds, Region, SplitDirection};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::chat::clock_time;
use super::core::{help_items, Focus, Mode, Model};
use super::theme::{Theme, INPUT_HEIGHT, SIDEBAR_WIDTH, TITLE_HEIGHT};
use super::windows::Pane;
use crate::realtime::ConnectionState;

pub fn draw(frame: &mut Frame<'_>, model: &Model, theme: &Theme) {
    let area = frame.size();
    frame.render_widget(Clear, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, model, theme, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(rows[1]);
    draw_sidebar(frame, model, theme, columns[0]);
    draw_panes(frame, model, theme, area);

    draw_footer(frame, model, theme, rows[2]);
}

fn draw_header(frame: &mut Frame<'_>, model: &Model, theme: &Theme, area: Rect) {
    let conn = match model.connection {
        ConnectionState::Open => Span::styled("● live", Style::default().fg(theme.live)),
        ConnectionState::Connecting => {
            Span::styled("◌ connecting", Style::default().fg(theme.degraded))
        }
        ConnectionState::Reconnecting(attempt) => Span::styled(
            format!("◌ reconnecting ({attempt})"),
            Style::default().fg(theme.degraded),
        ),
        ConnectionState::Disconnected => {
            Span::styled("● offline, polling", Style::default().fg(theme.error))
        }
    };

    let line = Line::from(vec![
        Span::styled("chatmux", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        conn,
        Span::raw("  "),
        Span::styled(
            format!(
                "panes: {}/{}",
                model.windows.count(),
                model.windows.max_panes()
            ),
            Style::default().fg(theme.muted),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_sidebar(frame: &mut Frame<'_>, model: &Model, theme: &Theme, area: Rect) {
    let focused = matches!(model.focus, Focus::ChatList);
    let block = Block::default()
        .title(Span::styled("Chats", theme.title_style(focused)))
        .borders(Borders::RIGHT)
        .border_style(theme.border_style(focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let list = &model.chat_list;
    if list.chats().is_empty() {
        let text = if list.is_loaded() {
            "No chats"
        } else {
            "Loading…"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(text, Style::default().fg(theme.muted))),
            inner,
        );
        return;
    }

    // Two rows per chat: name, then preview.
    let per_page = usize::from(inner.height / 2).max(1);
    let start = list.selected_index().saturating_sub(per_page - 1);
    let width = usize::from(inner.width);

    let mut lines = Vec::new();
    for (idx, chat) in list.chats().iter().enumerate().skip(start).take(per_page) {
        let unread = list.is_unread(&chat.guid);
        let marker = if unread { theme.unread_marker } else { "  " };
        let selected = match (idx == list.selected_index(), focused) {
            (true, true) => theme.selected_style(),
            (true, false) => Style::default().add_modifier(Modifier::REVERSED),
            (false, _) => Style::default(),
        };
        let mut name_style = selected;
        if unread {
            name_style = name_style.add_modifier(Modifier::BOLD);
        }

        let preview = chat
            .last_message
            .as_deref()
            .map(|m| {
                format!(
                    "  {} {}",
                    clock_time(m.date_created, model.settings.utc_offset),
                    m.body().replace('\n', " ")
                )
            })
            .unwrap_or_default();

        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(theme.unread).patch(selected)),
            Span::styled(
                truncate_chars(&chat.label(), width.saturating_sub(2)),
                name_style,
            ),
        ]));
        lines.push(Line::from(Span::styled(
            truncate_chars(&preview, width),
            Style::default().fg(theme.muted).patch(selected),
        )));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_panes(frame: &mut Frame<'_>, model: &Model, theme: &Theme, screen: Rect) {
    for region in model.windows.regions() {
        match region {
            Region::Pane { id, bounds } => {
                if let Some(pane) = model.windows.pane(id) {
                    draw_pane(frame, model, theme, pane, clip(bounds, screen));
                }
            }
            Region::Divider { direction, bounds } => {
                draw_divider(frame, theme, direction, clip(bounds, screen));
            }
        }
    }
}

fn draw_divider(frame: &mut Frame<'_>, theme: &Theme, direction: SplitDirection, area: Rect) {
    if area.area() == 0 {
        return;
    }
    let style = Style::default().fg(theme.border);
    let lines: Vec<Line> = match direction {
        SplitDirection::Horizontal => (0..area.height)
            .map(|_| Line::from(Span::styled(theme.vertical_divider, style)))
            .collect(),
        SplitDirection::Vertical => vec![Line::from(Span::styled(
            theme.horizontal_divider.repeat(usize::from(area.width)),
            style,
        ))],
    };
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_pane(frame: &mut Frame<'_>, model: &Model, theme: &Theme, pane: &Pane, area: Rect) {
    if area.area() == 0 {
        return;
    }
    let focused = pane.focused && matches!(model.focus, Focus::Panes);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(INPUT_HEIGHT),
        ])
        .split(area);

    let title = if pane.conversation.is_some() {
        pane.title.as_str()
    } else {
        "(empty)"
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(" "),
            Span::styled(title, theme.title_style(focused)),
        ])),
        rows[0],
    );

    let body = Rect {
        x: rows[1].x.saturating_add(1),
        width: rows[1].width.saturating_sub(2),
        ..rows[1]
    };
    draw_messages(frame, theme, pane, body);
    draw_input(frame, model, theme, pane, focused, rows[2]);
}

fn draw_messages(frame: &mut Frame<'_>, theme: &Theme, pane: &Pane, area: Rect) {
    let muted = Style::default().fg(theme.muted);
    let placeholder = if pane.conversation.is_none() {
        Some("Select a chat")
    } else if pane.view.lines.is_empty() && pane.view.loading {
        Some("Loading…")
    } else if pane.view.lines.is_empty() {
        Some("(No messages yet)")
    } else {
        None
    };
    if let Some(text) = placeholder {
        frame.render_widget(Paragraph::new(Span::styled(text, muted)), area);
        return;
    }

    let lines: Vec<Line> = pane
        .view
        .visible(usize::from(area.height))
        .iter()
        .map(|l| {
            let line = Line::from(Span::styled(l.text.as_str(), theme.message_style(l.from_me)));
            if l.from_me {
                line.alignment(Alignment::Right)
            } else {
                line
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_input(
    frame: &mut Frame<'_>,
    model: &Model,
    theme: &Theme,
    pane: &Pane,
    focused: bool,
    area: Rect,
) {
    let typing = focused && matches!(model.mode, Mode::Input);
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(theme.border_style(typing));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.area() == 0 {
        return;
    }
    let inner = Rect {
        x: inner.x.saturating_add(1),
        width: inner.width.saturating_sub(2),
        ..inner
    };

    if pane.editor.is_empty() && !typing {
        let hint = if pane.conversation.is_some() {
            "Enter to type…"
        } else {
            ""
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(theme.muted))),
            inner,
        );
        return;
    }

    let width = usize::from(inner.width.saturating_sub(1)).max(1);
    let rows = pane.editor.tail_lines(width, usize::from(inner.height));
    let cursor_row = rows.len().saturating_sub(1) as u16;
    let lines: Vec<Line> = rows.into_iter().map(Line::from).collect();
    frame.render_widget(Paragraph::new(lines), inner);

    if typing {
        let col = pane.editor.cursor_column(width) as u16;
        frame.set_cursor(
            inner.x.saturating_add(col.min(inner.width.saturating_sub(1))),
            inner.y.saturating_add(cursor_row),
        );
    }
}

fn draw_footer(frame: &mut Frame<'_>, model: &Model, theme: &Theme, area: Rect) {
    if let Some(status) = model.status.as_ref() {
        let line = Line::from(vec![
            Span::styled("Error: ", Style::default().fg(theme.error)),
            Span::raw(status.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mut spans = Vec::new();
    for (idx, item) in help_items(model).iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            item.key,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(": "));
        spans.push(Span::styled(item.desc, Style::default().fg(theme.muted)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn clip(bounds: Bounds, screen: Rect) -> Rect {
    Rect::new(bounds.x, bounds.y, bounds.width, bounds.height).intersection(screen)
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
