//! # Server-Sent Events (SSE) Parsing
//!
//! Transport-agnostic SSE parsing for the client.
//!
//! This module provides:
//! - `parse_block`: pure mapping from one complete SSE block to an [`Event`]
//! - `StreamBuffer`: incremental block splitter that handles chunk boundaries
//! - `SseStream`: adapter from a byte stream to an event stream

use crate::sse_types::{Event, DEFAULT_EVENT_NAME};

pub mod buffer;
pub use buffer::{split_blocks, StreamBuffer};

#[cfg(feature = "stream")]
pub mod stream;
#[cfg(feature = "stream")]
pub use stream::{SseStream, SseStreamExt};

const COMMENT_PREFIX: char = ':';
const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// Parse the text of one SSE block (separator excluded) into an [`Event`].
///
/// Lines may end in `\n`, `\r\n` or `\r`. Comments and unknown fields are
/// dropped; a block with no fields yields the default `message` event. When
/// several `event:` lines appear the last one wins.
pub fn parse_block(block: &str) -> Event {
    let mut event_name: Option<&str> = None;
    let mut data = String::new();

    for line in block
        .split(|c| c == '\n' || c == '\r')
        .filter(|line| !line.is_empty())
    {
        if line.starts_with(COMMENT_PREFIX) {
            continue;
        } else if let Some(rest) = line.strip_prefix(EVENT_PREFIX) {
            event_name = Some(strip_one_space(rest));
        } else if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data.push_str(strip_one_space(rest));
            data.push('\n');
        }
        // Unknown field, ignore
    }

    Event::new(event_name.unwrap_or(DEFAULT_EVENT_NAME), data)
}

/// Byte-level entry point; invalid UTF-8 is replaced, never rejected.
pub fn parse_block_bytes(block: &[u8]) -> Event {
    parse_block(&String::from_utf8_lossy(block))
}

/// Render an event back into block text that [`parse_block`] maps to the
/// same event.
pub fn render_block(event: &Event) -> String {
    let mut out = String::new();
    if event.event_name() != DEFAULT_EVENT_NAME {
        out.push_str(EVENT_PREFIX);
        out.push(' ');
        out.push_str(event.event_name());
        out.push('\n');
    }
    if !event.data().is_empty() {
        for line in event.data_trimmed().split('\n') {
            out.push_str(DATA_PREFIX);
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn strip_one_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

#[cfg(test)]
#[path = "../tests/parser_tests.rs"]
mod parser_tests;

#[cfg(test)]
#[path = "../tests/buffer_tests.rs"]
mod buffer_tests;

#[cfg(all(test, feature = "stream"))]
#[path = "../tests/stream_tests.rs"]
mod stream_tests;
