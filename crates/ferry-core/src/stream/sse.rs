//! Server-Sent Events decoding.
//!
//! Incremental decoder for the `text/event-stream` format. Bytes are fed in
//! whatever chunks the transport delivers; complete events come out.
//!
//! ## Format
//!
//! ```text
//! : keep-alive comment
//! event: progress
//! id: 7
//! data: {"fileName":"a.png","progress":42}
//!
//! ```
//!
//! Lines end in LF, CRLF, or a lone CR. A blank line dispatches the event.
//! Multiple `data:` lines are joined with `\n`. An event with no data is
//! dropped, and a partial event left when the stream ends is discarded.

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
    /// Last event id seen on the stream
    pub id: Option<String>,
    /// Reconnection delay requested by the server, in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event name, defaulting to `message` as browsers do.
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    skip_lf: bool,
    seen_first_line: bool,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of bytes and collect every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut chunk = chunk;
        // a CR ended the previous chunk; its LF may open this one
        if self.skip_lf {
            if chunk.first() == Some(&b'\n') {
                chunk = &chunk[1..];
            }
            if !chunk.is_empty() {
                self.skip_lf = false;
            }
        }

        let mut buf = std::mem::take(&mut self.buffer);
        buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < buf.len() {
            let byte = buf[i];
            if byte == b'\n' || byte == b'\r' {
                if let Some(event) = self.process_line(&buf[start..i]) {
                    events.push(event);
                }
                if byte == b'\r' {
                    if i + 1 < buf.len() {
                        if buf[i + 1] == b'\n' {
                            i += 1;
                        }
                    } else {
                        self.skip_lf = true;
                    }
                }
                start = i + 1;
            }
            i += 1;
        }

        self.buffer = buf.split_off(start);
        events
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let text = String::from_utf8_lossy(raw);
        let mut line: &str = &text;
        if !self.seen_first_line {
            self.seen_first_line = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");

        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}
