use chatmux_protocol::Message;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub from_me: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: usize,
    pub show_timestamps: bool,
    pub utc_offset: UtcOffset,
}

/// Scrollback state for one pane.
#[derive(Debug, Clone)]
pub struct ChatView {
    pub lines: Vec<RenderedLine>,
    pub scroll_top: usize,
    pub follow_tail: bool,
    pub loading: bool,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            scroll_top: 0,
            follow_tail: true,
            loading: false,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn set_lines(&mut self, lines: Vec<RenderedLine>, viewport_height: usize) {
        self.lines = lines;
        let max = max_scroll_top(self.lines.len(), viewport_height);
        if self.follow_tail {
            self.scroll_top = max;
        } else {
            self.scroll_top = self.scroll_top.min(max);
        }
    }

    pub fn visible(&self, viewport_height: usize) -> &[RenderedLine] {
        let start = self.scroll_top.min(self.lines.len());
        let end = start.saturating_add(viewport_height).min(self.lines.len());
        &self.lines[start..end]
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.follow_tail = false;
        self.scroll_top = self.scroll_top.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, viewport_height: usize, lines: usize) {
        let max = max_scroll_top(self.lines.len(), viewport_height);
        let next = (self.scroll_top + lines).min(max);
        self.scroll_top = next;
        self.follow_tail = next >= max;
    }

    pub fn jump_top(&mut self) {
        self.follow_tail = false;
        self.scroll_top = 0;
    }

    pub fn jump_bottom(&mut self, viewport_height: usize) {
        self.scroll_top = max_scroll_top(self.lines.len(), viewport_height);
        self.follow_tail = true;
    }
}

fn max_scroll_top(total_lines: usize, viewport_height: usize) -> usize {
    total_lines.saturating_sub(viewport_height)
}

pub fn rebuild_lines(messages: &[Message], opts: RenderOptions) -> Vec<RenderedLine> {
    let mut out = Vec::new();
    for msg in messages {
        let text = format_message(msg, opts.show_timestamps, opts.utc_offset);
        for line in wrap(&text, opts.width) {
            out.push(RenderedLine {
                from_me: msg.is_from_me,
                text: line,
            });
        }
    }
    out
}

/// `HH:MM Sender: text`, or without the time when timestamps are hidden.
pub fn format_message(msg: &Message, show_timestamps: bool, utc_offset: UtcOffset) -> String {
    let body = if msg.body().trim().is_empty() && !msg.attachments.is_empty() {
        let names: Vec<&str> = msg
            .attachments
            .iter()
            .map(|a| a.file_name.as_deref().unwrap_or("file"))
            .collect();
        format!("[attachment: {}]", names.join(", "))
    } else {
        msg.body().to_owned()
    };

    if show_timestamps {
        format!(
            "{} {}: {}",
            clock_time(msg.date_created, utc_offset),
            msg.sender_label(),
            body
        )
    } else {
        format!("{}: {}", msg.sender_label(), body)
    }
}

pub fn clock_time(ms: i64, utc_offset: UtcOffset) -> String {
    let format = format_description!("[hour]:[minute]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.to_offset(utc_offset).format(&format).ok())
        .unwrap_or_else(|| "--:--".to_owned())
}

/// Hard-wraps on display width; embedded newlines start new lines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for raw in text.split('\n') {
        let mut line = String::new();
        let mut used = 0;
        for ch in raw.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
                used = 0;
            }
            line.push(ch);
            used += w;
        }
        out.push(line);
    }
    out
}
