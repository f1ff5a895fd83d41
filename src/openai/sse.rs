//! Incremental parsing of Server-Sent Events from a chunked HTTP body.
//!
//! Chunks from the network don't line up with events (or even with
//! UTF-8 character boundaries) so bytes are buffered until a complete
//! event, terminated by a blank line, is available.

#[derive(Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the response body.
    pub fn push(&mut self, chunk: &[u8]) {
        // Normalize CRLF line endings so event boundaries are always "\n\n"
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Remove the next complete event from the buffer and return the
    /// payload of its `data:` lines joined by newlines. Events without
    /// data (comments, keep-alives) are skipped.
    pub fn next_data(&mut self) -> Option<String> {
        loop {
            let event_end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let event: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            let event = String::from_utf8_lossy(&event[..event_end]);

            let data = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|data| data.strip_prefix(' ').unwrap_or(data))
                .collect::<Vec<_>>()
                .join("\n");

            if !data.trim().is_empty() {
                return Some(data.trim().to_string());
            }
        }
    }

    /// Whatever is left once the body ends without a trailing blank
    /// line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.buffer.extend_from_slice(b"\n\n");
        self.next_data()
    }
}
