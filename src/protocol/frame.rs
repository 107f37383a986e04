// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental decoder for the `text/event-stream` format.

use std::time::Duration;

use crate::error::ConnectionError;
use crate::event::Event;

/// Decodes `id:` / `event:` / `data:` / `retry:` lines into events.
///
/// Bytes can be fed in arbitrary chunks; a line split across chunks (or a
/// UTF-8 character split across chunks) is completed by the next call.
/// Lines may end with `\n`, `\r\n` or `\r`. A blank line dispatches the
/// event built so far.
///
/// A single line longer than the configured limit fails the stream instead
/// of growing the buffer without bound.
///
/// # Examples
///
/// ```
/// use evstream_lib::protocol::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// let events = decoder
///     .feed(b"event: sensors\nid: 1\ndata: {\"temperature\": 21.5}\n\n")
///     .unwrap();
///
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event_type(), "sensors");
/// assert_eq!(events[0].id(), Some("1"));
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes of the line currently being received, without terminator.
    buffer: Vec<u8>,
    max_line_length: usize,
    /// The previous chunk ended with CR; a leading LF completes that CRLF.
    pending_cr: bool,
    /// Whether the first line was seen, for BOM stripping.
    started: bool,
    event_type: String,
    data: String,
    /// Whether at least one `data:` field was seen for the current event.
    has_data: bool,
    /// Persists across events, as the last event id does.
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl FrameDecoder {
    /// Default limit for a single line, in bytes.
    pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

    /// Creates a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(Self::DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a decoder rejecting lines longer than `max` bytes.
    #[must_use]
    pub fn with_max_line_length(max: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_length: max,
            pending_cr: false,
            started: false,
            event_type: String::new(),
            data: String::new(),
            has_data: false,
            last_id: None,
            retry: None,
        }
    }

    /// Feeds a chunk of bytes and returns the events it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::LineTooLong`] when a line exceeds the
    /// limit. The partial line is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Event>, ConnectionError> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            if std::mem::take(&mut self.pending_cr)
                && let Some(tail) = rest.strip_prefix(b"\n")
            {
                rest = tail;
                continue;
            }

            let Some(end) = rest.iter().position(|&b| b == b'\n' || b == b'\r') else {
                self.append(rest)?;
                break;
            };
            self.append(&rest[..end])?;

            let mut line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut events);
            line.clear();
            self.buffer = line;

            self.pending_cr = rest[end] == b'\r';
            rest = &rest[end + 1..];
        }

        Ok(events)
    }

    /// Returns the most recent `retry:` value, clearing it.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Returns the last event id seen on the stream.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if self.buffer.len() + bytes.len() > self.max_line_length {
            self.buffer.clear();
            return Err(ConnectionError::LineTooLong {
                limit: self.max_line_length,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<Event>) {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.started {
            self.started = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse::<u64>()
                {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            other => tracing::trace!(field = other, "Ignoring unknown event stream field"),
        }
    }

    fn dispatch(&mut self, events: &mut Vec<Event>) {
        let event_type = std::mem::take(&mut self.event_type);
        let data = std::mem::take(&mut self.data);
        if !std::mem::take(&mut self.has_data) {
            return;
        }

        let mut event = Event::new(event_type, data);
        if let Some(id) = self.last_id.as_deref().filter(|id| !id.is_empty()) {
            event = event.with_id(id);
        }
        events.push(event);
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_event() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"event: sensors\nid: 3\ndata: {\"temperature\": 21.5}\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "sensors");
        assert_eq!(events[0].data(), "{\"temperature\": 21.5}");
        assert_eq!(events[0].id(), Some("3"));
    }

    #[test]
    fn unnamed_event_is_message() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: hello\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "message");
        assert!(events[0].id().is_none());
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: first\ndata: second\ndata\n\n").unwrap();

        assert_eq!(events[0].data(), "first\nsecond\n");
    }

    #[test]
    fn value_keeps_everything_after_first_space() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data:no space\n\ndata:  two spaces\n\n").unwrap();

        assert_eq!(events[0].data(), "no space");
        assert_eq!(events[1].data(), " two spaces");
    }

    #[test]
    fn comments_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b": keep-alive\n\n: another\ndata: x\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), "x");
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"event: sensors\n\ndata: y\n\n").unwrap();

        assert_eq!(events.len(), 1);
        // Type does not leak into the next event.
        assert_eq!(events[0].event_type(), "message");
    }

    #[test]
    fn crlf_and_cr_line_endings() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"event: a\r\ndata: 1\r\n\r\nevent: b\rdata: 2\r\r\n").unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "a");
        assert_eq!(events[1].event_type(), "b");
        assert_eq!(events[1].data(), "2");
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: x\r").unwrap().is_empty());
        // Completes the CRLF above, not a blank line.
        assert!(decoder.feed(b"\n").unwrap().is_empty());
        assert!(decoder.feed(b"").unwrap().is_empty());
        let events = decoder.feed(b"\r\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), "x");
        assert!(decoder.feed(b"\n").unwrap().is_empty());
    }

    #[test]
    fn cr_only_stream_dispatches_without_next_chunk() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: x\r\r").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), "x");
    }

    #[test]
    fn cr_only_events_in_separate_chunks() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"event: a\rdata: 1\r\r").unwrap().len(), 1);
        let events = decoder.feed(b"event: b\rdata: 2\r\r").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "b");
    }

    #[test]
    fn event_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: sen").unwrap().is_empty());
        assert!(decoder.feed(b"sors\ndata: {\"tempera").unwrap().is_empty());
        let events = decoder.feed(b"ture\": 1}\n\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "sensors");
        assert_eq!(events[0].data(), "{\"temperature\": 1}");
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let bytes = "data: 21 °C\n\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC2).unwrap() + 1;

        assert!(decoder.feed(&bytes[..split]).unwrap().is_empty());
        let events = decoder.feed(&bytes[split..]).unwrap();

        assert_eq!(events[0].data(), "21 °C");
    }

    #[test]
    fn id_persists_across_events() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"id: 5\ndata: a\n\ndata: b\n\n").unwrap();

        assert_eq!(events[0].id(), Some("5"));
        assert_eq!(events[1].id(), Some("5"));
        assert_eq!(decoder.last_event_id(), Some("5"));
    }

    #[test]
    fn id_with_null_is_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"id: a\0b\ndata: x\n\n").unwrap();

        assert!(events[0].id().is_none());
    }

    #[test]
    fn retry_is_parsed() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"retry: 5000\n\n").unwrap();

        assert_eq!(decoder.take_retry(), Some(Duration::from_millis(5000)));
        assert_eq!(decoder.take_retry(), None);
    }

    #[test]
    fn invalid_retry_is_ignored() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"retry: 5s\nretry: -1\n\n").unwrap();

        assert_eq!(decoder.take_retry(), None);
    }

    #[test]
    fn leading_bom_is_stripped() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed("\u{feff}data: x\n\n".as_bytes()).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), "x");
    }

    #[test]
    fn incomplete_event_is_held_back() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: a\n\ndata: partial\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), "a");
    }

    #[test]
    fn long_line_fed_byte_by_byte() {
        let mut decoder = FrameDecoder::new();
        let payload = "x".repeat(10_000);
        let stream = format!("data: {payload}\n\n");

        let mut events = Vec::new();
        for byte in stream.as_bytes() {
            events.extend(decoder.feed(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data(), payload);
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let mut decoder = FrameDecoder::with_max_line_length(8);
        let events = decoder.feed(b"data: 12\n\n").unwrap();

        assert_eq!(events[0].data(), "12");
    }

    #[test]
    fn line_over_limit_fails() {
        let mut decoder = FrameDecoder::with_max_line_length(8);
        let err = decoder.feed(b"data: 123\n\n").unwrap_err();

        assert!(matches!(err, ConnectionError::LineTooLong { limit: 8 }));
    }

    #[test]
    fn line_over_limit_across_chunks_fails() {
        let mut decoder = FrameDecoder::with_max_line_length(8);
        assert!(decoder.feed(b"data:").unwrap().is_empty());

        let err = decoder.feed(b" 0123").unwrap_err();
        assert!(matches!(err, ConnectionError::LineTooLong { limit: 8 }));
    }
}
