//! Incremental block splitting across chunk deliveries

use crate::sse_types::Event;
use crate::sse_streaming::parse_block_bytes;
use bytes::{Bytes, BytesMut};

/// Accumulates raw bytes and splits them into complete SSE blocks.
///
/// A block ends at a blank line written with any line ending (`\n\n`,
/// `\r\n\r\n`, `\r\r` or a mix). At most one partial block is retained.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buffer: BytesMut,
    /// Offset before which no separator can start; avoids rescanning a long
    /// partial block on every chunk.
    scan_from: usize,
    /// The last separator ended in `\r`; a `\n` opening the next chunk
    /// belongs to it.
    skip_lf: bool,
}

enum Scan {
    Found {
        block_end: usize,
        sep_end: usize,
        /// Separator ended on a `\r` at the very end of the buffer.
        open_cr: bool,
    },
    Pending { resume_at: usize },
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every block it completes, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let chunk = if self.skip_lf && !chunk.is_empty() {
            self.skip_lf = false;
            match chunk {
                [b'\n', rest @ ..] => rest,
                _ => chunk,
            }
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);
        let mut blocks = Vec::new();
        loop {
            match find_separator(&self.buffer, self.scan_from) {
                Scan::Found {
                    block_end,
                    sep_end,
                    open_cr,
                } => {
                    let mut frame = self.buffer.split_to(sep_end);
                    frame.truncate(block_end);
                    blocks.push(frame.freeze());
                    self.scan_from = 0;
                    self.skip_lf = open_cr;
                }
                Scan::Pending { resume_at } => {
                    self.scan_from = resume_at;
                    break;
                }
            }
        }
        blocks
    }

    /// Append a chunk and parse the blocks it completes.
    pub fn push_events(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.push(chunk)
            .iter()
            .map(|block| parse_block_bytes(block))
            .collect()
    }

    /// Bytes of the partial block waiting for its separator.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial block, e.g. when the connection is replaced.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan_from = 0;
        self.skip_lf = false;
    }
}

/// Pure form of [`StreamBuffer::push`]: `(complete_blocks, remainder)`.
pub fn split_blocks(existing: &[u8], chunk: &[u8]) -> (Vec<Bytes>, Bytes) {
    let mut buffer = StreamBuffer::new();
    buffer.buffer.extend_from_slice(existing);
    let blocks = buffer.push(chunk);
    (blocks, buffer.buffer.freeze())
}

/// Length of the line break starting at `idx`: `Some(None)` when a trailing
/// `\r` may still turn out to be `\r\n`.
fn line_break_len(buf: &[u8], idx: usize) -> Option<Option<usize>> {
    match buf[idx] {
        b'\n' => Some(Some(1)),
        b'\r' => match buf.get(idx + 1) {
            None => Some(None),
            Some(b'\n') => Some(Some(2)),
            Some(_) => Some(Some(1)),
        },
        _ => None,
    }
}

fn find_separator(buf: &[u8], from: usize) -> Scan {
    let mut idx = from;
    while idx < buf.len() {
        let first = match line_break_len(buf, idx) {
            None => {
                idx += 1;
                continue;
            }
            Some(None) => return Scan::Pending { resume_at: idx },
            Some(Some(len)) => len,
        };
        let next = idx + first;
        if next >= buf.len() {
            return Scan::Pending { resume_at: idx };
        }
        // A second break completes the block even when it is a trailing
        // `\r`; a later `\n` only extends the separator.
        match line_break_len(buf, next) {
            None => idx = next,
            Some(None) => {
                return Scan::Found {
                    block_end: idx,
                    sep_end: next + 1,
                    open_cr: true,
                }
            }
            Some(Some(second)) => {
                return Scan::Found {
                    block_end: idx,
                    sep_end: next + second,
                    open_cr: false,
                }
            }
        }
    }
    Scan::Pending { resume_at: idx }
}
