//! Incremental server-sent-event parser
//!
//! Text is fed in arbitrary pieces; complete lines are interpreted as they
//! arrive and an event is dispatched on each blank line. Anything after the
//! last line terminator stays buffered until the next feed.

use tracing::{debug, warn};

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Last event id seen on the stream, if any
    pub id: Option<String>,

    /// Event type from the `event:` field; `None` means the default type
    pub event: Option<String>,

    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Output of the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    Event(SseEvent),

    /// Reconnection delay requested by a `retry:` field, in milliseconds
    ReconnectInterval(u64),
}

#[derive(Debug, Default)]
pub struct EventParser {
    line: String,
    started: bool,
    after_cr: bool,
    last_id: Option<String>,
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next piece of decoded text, returning everything it completes
    pub fn feed(&mut self, text: &str) -> Vec<ParsedEvent> {
        let mut out = Vec::new();
        let mut text = text;
        if !self.started && !text.is_empty() {
            self.started = true;
            text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        }

        for ch in text.chars() {
            match ch {
                '\n' if self.after_cr => {
                    // second half of a CRLF already handled at the CR
                    self.after_cr = false;
                }
                '\r' | '\n' => {
                    self.after_cr = ch == '\r';
                    let line = std::mem::take(&mut self.line);
                    self.process_line(&line, &mut out);
                }
                _ => {
                    self.after_cr = false;
                    self.line.push(ch);
                }
            }
        }
        out
    }

    /// True while an event or line is partially received
    pub fn has_pending(&self) -> bool {
        !self.line.is_empty() || self.has_data || self.event.is_some()
    }

    /// Drop any unterminated trailing frame, reporting whether one existed
    pub fn finish(&mut self) -> bool {
        let pending = self.has_pending();
        if pending {
            warn!(
                line_len = self.line.len(),
                data_len = self.data.len(),
                "EventParser::finish: discarding unterminated frame"
            );
        }
        self.line.clear();
        self.reset_event();
        self.after_cr = false;
        pending
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<ParsedEvent>) {
        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => match value.parse::<u64>() {
                Ok(ms) if value.bytes().all(|b| b.is_ascii_digit()) => out.push(ParsedEvent::ReconnectInterval(ms)),
                _ => debug!(value, "EventParser: ignoring invalid retry field"),
            },
            other => debug!(field = other, "EventParser: ignoring unknown field"),
        }
    }

    fn dispatch(&mut self, out: &mut Vec<ParsedEvent>) {
        if self.has_data {
            out.push(ParsedEvent::Event(SseEvent {
                id: self.last_id.clone(),
                event: self.event.take(),
                data: std::mem::take(&mut self.data),
            }));
        }
        self.reset_event();
    }

    fn reset_event(&mut self) {
        self.event = None;
        self.data.clear();
        self.has_data = false;
    }
}
