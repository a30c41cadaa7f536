//! Frame decoding for `data:`-prefixed streaming bodies.
//!
//! Wire format:
//! ```text
//! data: {"type":"status","message":"thinking"}
//! data: {"type":"chunk","content":"Hel"}
//! data: {"type":"complete","response":"Hello"}
//! ```
//!
//! Bytes arrive in arbitrarily sized increments. Only text up to the last
//! newline is split into lines; the remainder waits for the next increment.
//! Lines that are not `data:` lines are ignored and payloads that fail to
//! parse are logged and skipped.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::client::StreamError;

const DATA_PREFIX: &str = "data: ";

/// Accumulates raw bytes and hands out complete lines.
///
/// Splitting happens on bytes, so a multi-byte character cut between two
/// increments is decoded only once its line is complete.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an increment and return every line it completed, without the
    /// trailing `\n` / `\r\n`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let scanned = self.pending.len();
        self.pending.extend_from_slice(bytes);

        // Earlier bytes were already searched and hold no newline.
        let Some(last_newline) = self.pending[scanned..]
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| scanned + pos)
        else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(|line| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    /// Take whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
        Some(String::from_utf8_lossy(rest).into_owned())
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Extract the payload of a `data: ` line.
///
/// # Example
/// ```
/// use dashstream::sse::parse_data_line;
///
/// assert_eq!(parse_data_line("data: {\"type\":\"chunk\"}"), Some("{\"type\":\"chunk\"}"));
/// assert_eq!(parse_data_line("event: ping"), None);
/// assert_eq!(parse_data_line(""), None);
/// ```
pub fn parse_data_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
}

/// Parse one `data:` payload into a frame.
///
/// Error objects are normalized first: `{"error": "..."}`,
/// `{"type": "error", "error": "..."}` and a bare `{"type": "error"}` all
/// become `{"type": "error", "message": "..."}`.
pub fn decode_frame<F: DeserializeOwned>(payload: &str) -> Result<F, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    serde_json::from_value(normalize_error_shape(value))
}

const UNKNOWN_ERROR: &str = "Unknown error";

fn normalize_error_shape(mut value: Value) -> Value {
    let Value::Object(map) = &mut value else {
        return value;
    };

    let typed_error = match map.get("type") {
        None => map.contains_key("error"),
        Some(kind) => kind.as_str() == Some("error"),
    };
    if !typed_error {
        return value;
    }

    let message = match map.remove("message").or_else(|| map.remove("error")) {
        Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
        Some(error) => error_text(error),
    };
    map.insert("type".to_string(), Value::String("error".to_string()));
    map.insert("message".to_string(), Value::String(message));
    value
}

fn error_text(error: Value) -> String {
    match error {
        Value::String(message) => message,
        Value::Object(mut inner) => match inner.remove("message") {
            Some(Value::String(message)) => message,
            _ => Value::Object(inner).to_string(),
        },
        other => other.to_string(),
    }
}

/// Decode a byte stream into a lazy stream of frames.
///
/// The stream ends when the byte stream ends. A transport read failure is
/// yielded as an `Err` item; the caller decides whether to keep reading.
pub fn frames<F, S>(byte_stream: S) -> impl Stream<Item = Result<F, StreamError>> + Send
where
    F: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
{
    stream::unfold(
        (Box::pin(byte_stream), LineBuffer::new(), VecDeque::<String>::new(), false),
        |(mut byte_stream, mut buffer, mut lines, mut stream_ended)| async move {
            loop {
                while let Some(line) = lines.pop_front() {
                    if let Some(frame) = decode_line::<F>(&line) {
                        return Some((Ok(frame), (byte_stream, buffer, lines, stream_ended)));
                    }
                }

                if stream_ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => lines.extend(buffer.push(&chunk)),
                    Some(Err(e)) => {
                        stream_ended = true;
                        return Some((Err(e), (byte_stream, buffer, lines, stream_ended)));
                    }
                    None => {
                        stream_ended = true;
                        lines.extend(buffer.finish());
                    }
                }
            }
        },
    )
}

fn decode_line<F: DeserializeOwned>(line: &str) -> Option<F> {
    let payload = parse_data_line(line)?;
    match decode_frame::<F>(payload) {
        Ok(frame) => {
            trace!(payload, "decoded frame");
            Some(frame)
        }
        Err(error) => {
            warn!(payload, %error, "skipping malformed frame");
            None
        }
    }
}
