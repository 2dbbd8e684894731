// SPDX-License-Identifier: MIT OR Apache-2.0
//! Server-Sent-Events framing and incremental decoding.
//!
//! The writer side frames each event as `data: <json>\n\n`. The
//! decoder is a pure incremental parser: feed it byte chunks as they
//! arrive and collect the items it emits. Transport integration (the
//! response body, cancellation, channel plumbing) lives in
//! `mesh-client`.

use mesh_core::{StreamEvent, StreamItem};

/// Frame a stream event as one SSE chunk (`data: <json>\n\n`).
///
/// # Errors
///
/// Returns a serialization error if the event cannot be encoded.
///
/// # Examples
///
/// ```
/// use mesh_core::{StreamEvent, Task};
/// use mesh_protocol::encode_frame;
///
/// let frame = encode_frame(&StreamEvent::Task(Task::submitted("t", "c"))).unwrap();
/// assert!(frame.starts_with("data: "));
/// assert!(frame.ends_with("\n\n"));
/// ```
pub fn encode_frame(event: &StreamEvent) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

/// Incremental SSE decoder.
///
/// Per the SSE grammar: `:`-prefixed lines are comments, `data:` lines
/// accumulate (multiple data lines join with a single newline), an
/// empty line terminates the pending event, and unknown field prefixes
/// are ignored. A payload that is not valid JSON yields one item with
/// the error slot set; decoding then continues.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buf: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// A fresh decoder with empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the byte stream; returns the items completed
    /// by this chunk, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamItem> {
        let mut items = Vec::new();
        for byte in chunk {
            if *byte == b'\n' {
                let raw = std::mem::take(&mut self.line_buf);
                let line = String::from_utf8_lossy(&raw);
                if let Some(item) = self.take_line(line.strip_suffix('\r').unwrap_or(&line)) {
                    items.push(item);
                }
            } else {
                self.line_buf.push(*byte);
            }
        }
        items
    }

    /// Signal end-of-stream; emits the pending event, if any.
    pub fn finish(&mut self) -> Option<StreamItem> {
        // A final line without a trailing newline still counts.
        if !self.line_buf.is_empty() {
            let raw = std::mem::take(&mut self.line_buf);
            let line = String::from_utf8_lossy(&raw).into_owned();
            if let Some(item) = self.take_line(&line) {
                return Some(item);
            }
        }
        if self.data_lines.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    fn take_line(&mut self, line: &str) -> Option<StreamItem> {
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return None;
            }
            return Some(self.emit());
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            // "data: x" and "data:x" are both accepted.
            self.data_lines
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        // Unknown field prefixes (event:, id:, retry:, ...) are ignored.
        None
    }

    fn emit(&mut self) -> StreamItem {
        let payload = std::mem::take(&mut self.data_lines).join("\n");
        match serde_json::from_str::<StreamEvent>(&payload) {
            Ok(event) => StreamItem::event(event),
            Err(e) => StreamItem::error(format!("malformed stream payload: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::{Artifact, Task, TaskState, TaskStatus};

    fn status_event(state: TaskState) -> StreamEvent {
        StreamEvent::StatusUpdate {
            task_id: "t-1".into(),
            context_id: "ctx".into(),
            status: TaskStatus::now(state),
            is_final: state.is_terminal(),
        }
    }

    fn decode_all(bytes: &[u8]) -> Vec<StreamItem> {
        let mut decoder = SseDecoder::new();
        let mut items = decoder.feed(bytes);
        items.extend(decoder.finish());
        items
    }

    #[test]
    fn writer_reader_roundtrip() {
        let events = vec![
            status_event(TaskState::Working),
            StreamEvent::ArtifactUpdate {
                task_id: "t-1".into(),
                context_id: "ctx".into(),
                artifact: Artifact::text("out", "body"),
                append: false,
                last_chunk: true,
            },
            status_event(TaskState::Completed),
        ];
        let mut wire = String::new();
        for event in &events {
            wire.push_str(&encode_frame(event).unwrap());
        }

        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 3);
        for (item, event) in items.iter().zip(&events) {
            assert_eq!(item.event.as_ref(), Some(event));
            assert!(item.error.is_none());
        }
    }

    #[test]
    fn comment_lines_emit_nothing() {
        let items = decode_all(b": keep-alive\n\n");
        assert!(items.is_empty());
    }

    #[test]
    fn data_without_space_is_accepted() {
        let frame = encode_frame(&status_event(TaskState::Working)).unwrap();
        let squeezed = frame.replacen("data: ", "data:", 1);
        let items = decode_all(squeezed.as_bytes());
        assert_eq!(items.len(), 1);
        assert!(items[0].event.is_some());
    }

    #[test]
    fn malformed_payload_yields_one_error_then_recovers() {
        let mut wire = String::from("data: {not json\n\n");
        wire.push_str(&encode_frame(&status_event(TaskState::Completed)).unwrap());

        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 2);
        assert!(items[0].error.is_some());
        assert!(items[0].event.is_none());
        assert!(items[1].event.is_some());
    }

    #[test]
    fn multi_line_data_joins_with_newline() {
        // Two data lines make one event; the join reinserts a newline,
        // which is insignificant whitespace at the end of the JSON.
        let event = status_event(TaskState::Working);
        let json = serde_json::to_string(&event).unwrap();
        let wire = format!("data: {json}\ndata: \n\n");
        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].event.as_ref(), Some(&event));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let frame = encode_frame(&status_event(TaskState::Working)).unwrap();
        let wire = format!("event: update\nid: 7\nretry: 100\n{frame}");
        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 1);
        assert!(items[0].event.is_some());
    }

    #[test]
    fn eof_flushes_unterminated_event() {
        let json = serde_json::to_string(&status_event(TaskState::Completed)).unwrap();
        let wire = format!("data: {json}");
        // No trailing blank line, no trailing newline at all.
        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 1);
        assert!(items[0].event.is_some());
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let frame = encode_frame(&status_event(TaskState::Working)).unwrap();
        let bytes = frame.as_bytes();
        let mut decoder = SseDecoder::new();
        let mut items = Vec::new();
        // Feed one byte at a time.
        for b in bytes {
            items.extend(decoder.feed(std::slice::from_ref(b)));
        }
        items.extend(decoder.finish());
        assert_eq!(items.len(), 1);
        assert!(items[0].event.is_some());
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let json = serde_json::to_string(&status_event(TaskState::Working)).unwrap();
        let wire = format!("data: {json}\r\n\r\n");
        let items = decode_all(wire.as_bytes());
        assert_eq!(items.len(), 1);
        assert!(items[0].event.is_some());
    }
}
