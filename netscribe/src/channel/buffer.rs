//! Receive buffer with control-sequence filtering and candidate search.
//!
//! Raw device output is run through a `vte` parser so ANSI colour codes,
//! cursor movement and OSC titles never reach the matcher. Line feeds,
//! carriage returns, tabs and backspaces survive: they are what line
//! splitting and pager residue detection work on.

use bytes::{Buf, BytesMut};
use memchr::memmem;
use vte::{Parser, Perform};

/// Keeps printable text and the line-structure control bytes.
#[derive(Debug, Default)]
struct TextFilter {
    out: Vec<u8>,
}

impl Perform for TextFilter {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t' | 0x08) {
            self.out.push(byte);
        }
    }
}

/// A match located in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    /// 0-based position of the candidate in the caller's list.
    pub candidate: usize,
    pub start: usize,
    pub end: usize,
}

/// Accumulates filtered output until a caller consumes it.
pub struct PatternBuffer {
    buffer: BytesMut,
    parser: Parser,
    filter: TextFilter,
}

impl std::fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("buffer", &self.as_str_lossy())
            .finish_non_exhaustive()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: Parser::new(),
            filter: TextFilter::default(),
        }
    }

    /// Extend the buffer with new data, dropping escape sequences.
    ///
    /// Parser state carries over, so a sequence split across two reads is
    /// still removed.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.filter, data);
        self.buffer.extend_from_slice(&self.filter.out);
        self.filter.out.clear();
    }

    /// Find the first candidate, in list order, present anywhere in the buffer.
    ///
    /// List order wins over buffer position. Empty candidates never match.
    pub fn find_first(&self, candidates: &[&str]) -> Option<Located> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .find_map(|(i, c)| {
                memmem::find(&self.buffer, c.as_bytes()).map(|start| Located {
                    candidate: i,
                    start,
                    end: start + c.len(),
                })
            })
    }

    /// Remove everything up to `located.end`, returning the text before the match.
    pub fn consume(&mut self, located: Located) -> String {
        let before = String::from_utf8_lossy(&self.buffer[..located.start]).into_owned();
        self.buffer.advance(located.end);
        before
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
