//! Pattern buffer with tail-search for prompt detection.
//!
//! Only the last `search_depth` bytes are searched for a prompt, so long
//! outputs (a full `show tech-support` scrolling past) stay cheap to scan.

use regex::bytes::Regex;

/// Accumulates PTY output and finds prompts near its end.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output buffer.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

impl PatternBuffer {
    /// `search_depth` bytes from the end are searched.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append PTY output with terminal escapes removed.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    fn tail_start(&self) -> usize {
        self.buffer.len().saturating_sub(self.search_depth)
    }

    /// Remove and return everything up to the end of the first match in the
    /// tail. Bytes after the match stay buffered for the next read.
    pub fn take_through(&mut self, pattern: &Regex) -> Option<Vec<u8>> {
        let start = self.tail_start();
        let end = pattern.find(&self.buffer[start..])?.end() + start;
        let rest = self.buffer.split_off(end);
        Some(std::mem::replace(&mut self.buffer, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mCopy completed successfully.\x1b[0m");
        let pattern = Regex::new(r"successfully\.").unwrap();
        assert_eq!(
            buffer.take_through(&pattern).unwrap(),
            b"Copy completed successfully."
        );
    }

    #[test]
    fn test_prompt_outside_tail_is_ignored() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"leaf1#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"leaf1#").unwrap();
        assert!(buffer.take_through(&pattern).is_none());

        // nothing was consumed by the miss
        buffer.extend(b"leaf1#");
        assert_eq!(buffer.take_through(&pattern).unwrap().len(), 112);
    }

    #[test]
    fn test_take_through_keeps_remainder() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"copy file:/mnt/flash/x scp://u@h/\r\nPassword: ");
        buffer.extend(b"late");

        let pattern = Regex::new(r"(?i)password:\s*").unwrap();
        let taken = buffer.take_through(&pattern).unwrap();
        assert!(taken.ends_with(b"Password: "));

        let rest = Regex::new(r"late").unwrap();
        assert_eq!(buffer.take_through(&rest).unwrap(), b"late");
    }
}
