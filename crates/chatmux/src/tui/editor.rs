use unicode_width::UnicodeWidthStr;

use super::chat::wrap;

/// Message composer owned by a pane. Sent lines are kept for recall with
/// Up/Down while composing.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    pub buffer: String,
    pub sent: Vec<String>,
    pub recall: Option<usize>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.recall = None;
    }

    pub fn insert_char(&mut self, ch: char) {
        self.buffer.push(ch);
        self.recall = None;
    }

    /// Pasted text keeps its newlines; carriage returns are dropped.
    pub fn insert_str(&mut self, text: &str) {
        self.buffer.extend(text.chars().filter(|c| *c != '\r'));
        self.recall = None;
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
        self.recall = None;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn recall_prev(&mut self) {
        if self.sent.is_empty() {
            return;
        }
        let idx = match self.recall {
            None => self.sent.len() - 1,
            Some(idx) => idx.saturating_sub(1),
        };
        self.recall = Some(idx);
        self.buffer = self.sent[idx].clone();
    }

    pub fn recall_next(&mut self) {
        let Some(idx) = self.recall else {
            return;
        };
        if idx + 1 >= self.sent.len() {
            self.clear();
            return;
        }
        self.recall = Some(idx + 1);
        self.buffer = self.sent[idx + 1].clone();
    }

    /// Takes the buffer for sending. Blank input stays put and yields `None`.
    pub fn take_submit(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.buffer);
        self.recall = None;
        if self.sent.last() != Some(&text) {
            self.sent.push(text.clone());
        }
        Some(text)
    }

    /// The last `rows` wrapped lines of the buffer, so the cursor end is
    /// always visible in a short input box.
    pub fn tail_lines(&self, width: usize, rows: usize) -> Vec<String> {
        let mut lines = wrap(&self.buffer, width);
        if lines.is_empty() {
            lines.push(String::new());
        }
        let skip = lines.len().saturating_sub(rows);
        lines.split_off(skip)
    }

    /// Display column of the cursor on the last visible line.
    pub fn cursor_column(&self, width: usize) -> usize {
        self.tail_lines(width, 1)
            .last()
            .map(|l| UnicodeWidthStr::width(l.as_str()))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_inserts_and_deletes() {
        let mut e = Editor::new();
        e.insert_char('h');
        e.insert_char('i');
        assert_eq!(e.buffer, "hi");
        e.backspace();
        assert_eq!(e.buffer, "h");
    }

    #[test]
    fn paste_drops_carriage_returns() {
        let mut e = Editor::new();
        e.insert_str("a\r\nb");
        assert_eq!(e.buffer, "a\nb");
    }

    #[test]
    fn blank_submit_is_ignored() {
        let mut e = Editor::new();
        e.insert_str("   ");
        assert_eq!(e.take_submit(), None);
        assert_eq!(e.buffer, "   ");
    }

    #[test]
    fn tail_lines_keep_the_end_of_long_input() {
        let mut e = Editor::new();
        e.insert_str("one\ntwo\nthree");
        assert_eq!(e.tail_lines(10, 2), vec!["two", "three"]);
        assert_eq!(e.cursor_column(10), 5);
        assert_eq!(Editor::new().tail_lines(10, 2), vec![""]);
    }

    #[test]
    fn recall_walks_sent_messages() {
        let mut e = Editor::new();
        e.insert_str("one");
        assert_eq!(e.take_submit(), Some("one".to_owned()));
        e.insert_str("two");
        assert_eq!(e.take_submit(), Some("two".to_owned()));

        e.recall_prev();
        assert_eq!(e.buffer, "two");
        e.recall_prev();
        assert_eq!(e.buffer, "one");

        e.recall_next();
        assert_eq!(e.buffer, "two");
        e.recall_next();
        assert_eq!(e.buffer, "");
        assert_eq!(e.recall, None);
    }
}
