use anyhow::Result;
use std::collections::VecDeque;

/// Line buffer for SSE bodies that arrive in arbitrary byte chunks
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract the next complete line, trimmed of `\r\n`.
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(decode_line(&line_bytes))
    }

    /// Take whatever is left once the body has ended (last line without `\n`)
    pub fn take_remainder(&mut self) -> Option<Result<String>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();
        Some(decode_line(&line_bytes))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
        .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in event stream: {}", e))
}
