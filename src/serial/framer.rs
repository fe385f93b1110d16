//! Delimiter-based line framer for the board controller's serial stream.
//!
//! The firmware prints one JSON object per line. Reads from the port arrive in
//! arbitrary chunks, so this framer buffers partial input and yields whole lines
//! once their delimiter has been seen. Lines are decoded as UTF-8 (lossy) and trimmed
//! of trailing whitespace; blank lines are skipped. A line longer than
//! [`MAX_LINE_LEN`] is dropped whole, including any part of it still to arrive.
use bytes::{Buf, BytesMut};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Longest line accepted; anything longer is discarded up to its delimiter.
pub const MAX_LINE_LEN: usize = 4 * 1024;

/// Line terminator used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
}

impl Delimiter {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Delimiter::Lf => b"\n",
            Delimiter::Crlf => b"\r\n",
        }
    }
}

/// Append the delimiter to an outbound command.
pub fn encode_line(text: &str, delimiter: Delimiter) -> Vec<u8> {
    let tail = delimiter.as_bytes();
    let mut out = Vec::with_capacity(text.len() + tail.len());
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(tail);
    out
}

/// Incremental line splitter. One instance per connection.
pub struct LineFramer {
    buf: BytesMut,
    delimiter: Delimiter,
    /// Inside an oversized line whose head was already thrown away.
    discarding: bool,
}

impl LineFramer {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            buf: BytesMut::with_capacity(512),
            delimiter,
            discarding: false,
        }
    }

    /// Bytes buffered towards the next (incomplete) line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feed a chunk; returns every line completed by it, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let delim = self.delimiter.as_bytes();
        let mut lines = Vec::new();

        while let Some(pos) = find(&self.buf, delim) {
            let raw = self.buf.split_to(pos);
            self.buf.advance(delim.len());
            if self.discarding {
                self.discarding = false;
                debug!("Skipped {} trailing bytes of an oversized line", raw.len());
                continue;
            }
            if raw.len() > MAX_LINE_LEN {
                warn!(
                    "Discarding {}-byte line: longer than {} bytes",
                    raw.len(),
                    MAX_LINE_LEN
                );
                continue;
            }
            let text = String::from_utf8_lossy(&raw);
            let trimmed = text.trim_end();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }

        if self.buf.len() > MAX_LINE_LEN {
            if !self.discarding {
                warn!(
                    "Discarding {} buffered bytes: no line delimiter within {} bytes",
                    self.buf.len(),
                    MAX_LINE_LEN
                );
                self.discarding = true;
            }
            // Keep a possible partial delimiter (the CR of a CRLF).
            let keep = partial_delimiter(&self.buf, delim);
            self.buf.advance(self.buf.len() - keep);
        }
        lines
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest proper prefix of `delim` that `buf` ends with.
fn partial_delimiter(buf: &[u8], delim: &[u8]) -> usize {
    (1..delim.len())
        .rev()
        .find(|&n| buf.ends_with(&delim[..n]))
        .unwrap_or(0)
}
