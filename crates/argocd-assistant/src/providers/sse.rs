//! Incremental decoding of `text/event-stream` bodies
//!
//! Only the `data` field matters for chat completion streams. Bytes are buffered until a
//! full line is available, so a chunk boundary may fall anywhere, including inside a
//! multi-byte character.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and collect the data of every event they complete
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.push_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.push_line(line.trim_end_matches('\r'), &mut events);
        }
        self.push_line("", &mut events);
        events.pop()
    }

    fn push_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if let Some(data) = self.data.take() {
                events.push(data);
            }
            return;
        }

        // Comments and fields other than data (event, id, retry) are ignored
        let Some(value) = line.strip_prefix("data:") else {
            return;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match self.data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }
    }
}
