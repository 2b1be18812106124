//! Server-Sent Events line parser.
//!
//! Turns complete protocol lines into `{event, data}` records. The parser
//! only tracks a pending `event:` name; each `data:` line completes one
//! event. Use a fresh parser per HTTP stream.

/// A single parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if one preceded the data line
    pub event: Option<String>,
    /// The trimmed `data:` payload
    pub data: String,
}

impl SseEvent {
    /// Returns true if this event carries the given event name.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.event.as_deref() == Some(name)
    }
}

/// Stateful line parser for one SSE stream.
#[derive(Debug, Clone, Default)]
pub struct SseParser {
    pending_event: Option<String>,
}

impl SseParser {
    /// Creates a parser with no pending event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without its terminator) to the parser.
    ///
    /// Returns an event for `data:` lines. `event:` lines set the pending
    /// event name; everything else (blank separators, `id:`, comments) is ignored.
    pub fn parse_line(&mut self, line: &str) -> Option<SseEvent> {
        if let Some(name) = line.strip_prefix("event:") {
            self.pending_event = Some(name.trim().to_string());
            return None;
        }

        let data = line.strip_prefix("data:")?;
        Some(SseEvent {
            event: self.pending_event.take(),
            data: data.trim().to_string(),
        })
    }
}
