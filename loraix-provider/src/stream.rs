//! Decoding of streaming response bodies into text deltas.
//!
//! Both decoders are lenient: blank or malformed payloads are skipped. A
//! transport failure, a vendor exception message or binary framing that can
//! no longer be followed ends the stream with an error.

use crate::dialect::ChatDialect;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use loraix_core::error::LoraixError;
use loraix_core::provider::TextStream;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Terminal sentinel of OpenAI-style event streams
pub const DONE_SENTINEL: &str = "[DONE]";

/// Content type of AWS event stream bodies
pub const AWS_EVENT_STREAM: &str = "application/vnd.amazon.eventstream";

const PRELUDE_LEN: usize = 12;
const MIN_FRAME_LEN: usize = 16;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Decode a server-sent-events body
pub(crate) fn sse_deltas<D: ChatDialect>(
    response: reqwest::Response,
    dialect: Arc<D>,
    cancel: CancellationToken,
) -> TextStream {
    let provider = dialect.id().to_string();
    let mut events = Box::pin(response.bytes_stream().eventsource());

    Box::pin(async_stream::stream! {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };

            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    yield Err(LoraixError::stream(format!("{} stream failed: {}", provider, e)));
                    break;
                }
                None => break,
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                break;
            }

            match serde_json::from_str::<Value>(data) {
                Ok(payload) => {
                    if let Some(delta) = dialect.delta(&payload) {
                        yield Ok(delta);
                    }
                }
                Err(e) => {
                    tracing::trace!(provider = %provider, error = %e, "skipping malformed event");
                }
            }
        }
    })
}

/// Decode an AWS event stream body.
///
/// Messages typed `exception` or `error` end the stream with an error;
/// event messages go through [`ChatDialect::event_delta`].
pub(crate) fn event_stream_deltas<D, S, B, E>(
    chunks: S,
    dialect: Arc<D>,
    cancel: CancellationToken,
) -> TextStream
where
    D: ChatDialect,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let provider = dialect.id().to_string();
    let mut chunks = Box::pin(chunks);

    Box::pin(async_stream::stream! {
        let mut decoder = EventStreamDecoder::new();

        'read: loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                chunk = chunks.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
                Some(Err(e)) => {
                    yield Err(LoraixError::stream(format!("{} stream failed: {}", provider, e)));
                    break;
                }
                None => break,
            }

            loop {
                let frame = match decoder.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(LoraixError::stream(format!("{} stream failed: {}", provider, e)));
                        break 'read;
                    }
                };

                if let Some(reason) = frame.failure() {
                    yield Err(LoraixError::stream(format!("{} stream failed: {}", provider, reason)));
                    break 'read;
                }

                let Some(event_type) = frame.header(":event-type") else {
                    continue;
                };
                match serde_json::from_slice::<Value>(&frame.payload) {
                    Ok(payload) => {
                        if let Some(delta) = dialect.event_delta(event_type, &payload) {
                            yield Ok(delta);
                        }
                    }
                    Err(e) => {
                        tracing::trace!(provider = %provider, event_type, error = %e, "skipping malformed event");
                    }
                }
            }
        }
    })
}

/// One message of an AWS event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl EventFrame {
    /// Value of a string-typed header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Description of an `exception` or `error` message
    fn failure(&self) -> Option<String> {
        match self.header(":message-type") {
            Some("exception") => {
                let kind = self.header(":exception-type").unwrap_or("exception");
                let message = serde_json::from_slice::<Value>(&self.payload)
                    .ok()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| String::from_utf8_lossy(&self.payload).into_owned());
                Some(format!("{}: {}", kind, message))
            }
            Some("error") => Some(format!(
                "{}: {}",
                self.header(":error-code").unwrap_or("error"),
                self.header(":error-message").unwrap_or_default()
            )),
            _ => None,
        }
    }
}

/// Incremental decoder for `application/vnd.amazon.eventstream` bodies.
///
/// A message is laid out as total length (u32), headers length (u32),
/// prelude CRC, headers, payload and message CRC, all big-endian. The CRCs
/// are not verified. Only string-typed headers are kept.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw body bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete message, or `Ok(None)` when more bytes are needed.
    ///
    /// A prelude with impossible lengths is an error: message boundaries
    /// are lost and the rest of the body cannot be read.
    pub fn next_frame(&mut self) -> Result<Option<EventFrame>, String> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = be_u32(&self.buffer[0..4]) as usize;
        let headers_len = be_u32(&self.buffer[4..8]) as usize;
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len)
            || headers_len > total_len - MIN_FRAME_LEN
        {
            return Err(format!(
                "invalid event stream prelude (length {}, headers {})",
                total_len, headers_len
            ));
        }
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let message: Vec<u8> = self.buffer.drain(..total_len).collect();
        let headers_end = PRELUDE_LEN + headers_len;
        Ok(Some(EventFrame {
            headers: parse_headers(&message[PRELUDE_LEN..headers_end]),
            payload: message[headers_end..total_len - 4].to_vec(),
        }))
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Stops at the first truncated or unknown header
fn parse_headers(mut bytes: &[u8]) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    while let Some((&name_len, rest)) = bytes.split_first() {
        let name_len = name_len as usize;
        if rest.len() < name_len + 1 {
            break;
        }
        let name = String::from_utf8_lossy(&rest[..name_len]).into_owned();
        let value_type = rest[name_len];
        let rest = &rest[name_len + 1..];

        let (value, consumed) = match value_type {
            // bool true, bool false
            0 | 1 => (None, 0),
            2 => (None, 1),
            3 => (None, 2),
            4 => (None, 4),
            // long, timestamp
            5 | 8 => (None, 8),
            // uuid
            9 => (None, 16),
            // byte array, string
            6 | 7 => {
                if rest.len() < 2 {
                    break;
                }
                let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                if rest.len() < 2 + len {
                    break;
                }
                let value = (value_type == 7)
                    .then(|| String::from_utf8_lossy(&rest[2..2 + len]).into_owned());
                (value, 2 + len)
            }
            _ => break,
        };
        if rest.len() < consumed {
            break;
        }

        if let Some(value) = value {
            headers.push((name, value));
        }
        bytes = &rest[consumed..];
    }

    headers
}

/// Encode one event stream message with string headers and zeroed CRCs
#[cfg(test)]
pub(crate) fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(7);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total_len = PRELUDE_LEN + header_bytes.len() + payload.len() + 4;
    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&(total_len as u32).to_be_bytes());
    frame.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0; 4]);
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0; 4]);
    frame
}

/// Encode a JSON `event` message of type `event_type`
#[cfg(test)]
pub(crate) fn encode_event(event_type: &str, payload: &Value) -> Vec<u8> {
    encode_frame(
        &[
            (":event-type", event_type),
            (":content-type", "application/json"),
            (":message-type", "event"),
        ],
        payload.to_string().as_bytes(),
    )
}
