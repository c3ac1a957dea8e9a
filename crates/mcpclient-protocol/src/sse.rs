//! Server-Sent Events (`text/event-stream`) parsing per the WHATWG
//! event-source parsing algorithm.
//!
//! Pure, no-I/O, stream-oriented: feed it bytes as they arrive, get back
//! complete events. Restartable — `last_event_id` survives across `feed()`
//! calls unless `reset()` is called explicitly, so a transport can persist
//! it across a reconnect.

/// A parsed Server-Sent Event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
            retry: None,
        }
    }
}

/// Stream-oriented SSE parser.
///
/// Byte input is split into lines on LF, CR, or CRLF (WHATWG does not treat
/// these differently). `data:` lines accumulate and are joined with `\n`;
/// a single trailing `\n` is stripped from the accumulated data at dispatch.
/// `retry:` values that aren't non-negative integers are ignored. An `id:`
/// value containing U+0000 does not update `last_event_id`, but the event
/// still dispatches with that id on it per spec. Invalid UTF-8 lines are
/// discarded rather than aborting the whole feed.
pub struct SseParser {
    carry: Vec<u8>,
    current_event: Option<String>,
    current_data: String,
    current_id: Option<String>,
    current_retry: Option<u64>,
    last_event_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            carry: Vec::new(),
            current_event: None,
            current_data: String::new(),
            current_id: None,
            current_retry: None,
            last_event_id: None,
        }
    }

    /// The last event ID seen so far (survives resets-by-restart unless
    /// `reset()` is called), for use as a `Last-Event-ID` header on
    /// reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Clears all parser state, including `last_event_id`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Sets the last event ID explicitly (e.g. restoring persisted state).
    pub fn set_last_event_id(&mut self, id: Option<String>) {
        self.last_event_id = id;
    }

    /// Feeds new bytes, returning any complete events extracted from them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<SseEvent> {
        self.carry.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            let Some((line_end, consumed)) = find_line_end(&self.carry) else {
                break;
            };
            let line_bytes = self.carry[..line_end].to_vec();
            self.carry.drain(..consumed);

            let Ok(line) = std::str::from_utf8(&line_bytes) else {
                continue;
            };

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix(':') {
                let _ = rest; // comment line, ignored
                continue;
            }

            let (field, value) = match line.find(':') {
                Some(pos) => {
                    let field = &line[..pos];
                    let mut value = &line[pos + 1..];
                    if let Some(stripped) = value.strip_prefix(' ') {
                        value = stripped;
                    }
                    (field, value)
                }
                None => (line, ""),
            };

            match field {
                "event" => self.current_event = Some(value.to_string()),
                "data" => {
                    self.current_data.push_str(value);
                    self.current_data.push('\n');
                }
                "id" => {
                    if value.contains('\0') {
                        // ignored for last-event-id purposes, but still
                        // recorded on the event about to be dispatched
                        self.current_id = Some(value.to_string());
                    } else {
                        self.current_id = Some(value.to_string());
                    }
                }
                "retry" => {
                    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                        if let Ok(ms) = value.parse::<u64>() {
                            self.current_retry = Some(ms);
                        }
                    }
                }
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            self.current_retry = None;
            // current_id deliberately persists across events per spec: the
            // last event ID buffer is only cleared by an explicit id field.
            return None;
        }

        let mut data = std::mem::take(&mut self.current_data);
        if data.ends_with('\n') {
            data.pop();
        }

        if let Some(id) = &self.current_id {
            if !id.contains('\0') {
                self.last_event_id = Some(id.clone());
            }
        }

        let event = SseEvent {
            id: self.current_id.clone(),
            event: self.current_event.take(),
            data,
            retry: self.current_retry.take(),
        };

        Some(event)
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the end of the first line in `buf`, returning `(line_end,
/// bytes_consumed)` where `line_end` excludes the terminator and
/// `bytes_consumed` includes it. Handles LF, CR, and CRLF. A lone trailing
/// CR with no more data yet is treated as "no complete line" so a following
/// LF can still be recognized as part of the same terminator.
fn find_line_end(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, &b) in buf.iter().enumerate() {
        if b == b'\n' {
            return Some((i, i + 1));
        }
        if b == b'\r' {
            if i + 1 < buf.len() {
                if buf[i + 1] == b'\n' {
                    return Some((i, i + 2));
                }
                return Some((i, i + 1));
            }
            return None; // wait for more data to disambiguate CRLF vs CR
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dispatches_on_blank_line() {
        let mut p = SseParser::new();
        let events = p.feed(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn data_lines_join_with_newline() {
        let mut p = SseParser::new();
        let events = p.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn comments_are_ignored() {
        let mut p = SseParser::new();
        let events = p.feed(b": keepalive\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn invalid_retry_is_ignored() {
        let mut p = SseParser::new();
        let events = p.feed(b"retry: abc\ndata: x\n\n");
        assert_eq!(events[0].retry, None);
    }

    #[test]
    fn valid_retry_is_parsed() {
        let mut p = SseParser::new();
        let events = p.feed(b"retry: 3000\ndata: x\n\n");
        assert_eq!(events[0].retry, Some(3000));
    }

    #[test]
    fn null_byte_in_id_does_not_update_last_event_id() {
        let mut p = SseParser::new();
        let events = p.feed(b"id: abc\0\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(p.last_event_id(), None);
    }

    #[test]
    fn ordinary_id_updates_last_event_id() {
        let mut p = SseParser::new();
        p.feed(b"id: e1\ndata: x\n\n");
        assert_eq!(p.last_event_id(), Some("e1"));
    }

    #[test]
    fn last_event_id_persists_across_feed_calls() {
        let mut p = SseParser::new();
        p.feed(b"id: e1\ndata: x\n\n");
        p.feed(b"data: y\n\n");
        assert_eq!(p.last_event_id(), Some("e1"));
    }

    #[test]
    fn reset_clears_last_event_id() {
        let mut p = SseParser::new();
        p.feed(b"id: e1\ndata: x\n\n");
        p.reset();
        assert_eq!(p.last_event_id(), None);
    }

    #[test]
    fn handles_cr_and_crlf_line_endings() {
        let mut p = SseParser::new();
        let events = p.feed(b"data: a\r\ndata: b\r\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn incremental_feed_across_partial_lines() {
        let mut p = SseParser::new();
        assert!(p.feed(b"id: 1\n").is_empty());
        assert!(p.feed(b"data: partial\n").is_empty());
        let events = p.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn invalid_utf8_line_is_discarded_not_fatal() {
        let mut p = SseParser::new();
        let mut bytes = b"data: good\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        bytes.extend_from_slice(b"\n");
        let events = p.feed(&bytes);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "good");
    }

    #[test]
    fn event_field_defaults_to_none_meaning_message() {
        let mut p = SseParser::new();
        let events = p.feed(b"data: x\n\n");
        assert_eq!(events[0].event, None);
    }
}
