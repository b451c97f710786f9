//! Relay backend replies to the caller.
//!
//! Non-streaming replies are parsed once and returned with the backend's status.
//! Streaming replies are split into lines and forwarded one line at a time; nothing
//! is buffered beyond the current partial line.

use std::convert::Infallible;
use std::fmt::Display;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{ErrorEnvelope, ProxyError, Result};
use crate::journal::{Outcome, RequestRecord, SharedJournal};

/// Read a whole backend reply and relay it as JSON under the backend's status.
pub async fn relay_json(response: reqwest::Response) -> Result<Response> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ProxyError::backend(format!("Failed to read response body: {}", e)))?;
    relay_json_body(status, &body)
}

/// Backend error statuses are passed through unchanged; only an unparsable body is a fault.
pub fn relay_json_body(status: StatusCode, body: &[u8]) -> Result<Response> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ProxyError::backend(format!(
            "Backend returned a non-JSON body (status {}): {}",
            status.as_u16(),
            e
        ))
    })?;
    Ok((status, Json(value)).into_response())
}

/// Find the next line break at or after `*from`, returning `(line_end, next_line_start)`.
///
/// `\n`, `\r\n` and a bare `\r` all end a line. `*from` is left at the first unscanned
/// byte so each byte is looked at once; a `\r` in the last position is left unscanned
/// until the next byte shows whether a `\n` follows.
fn next_line_break(buf: &[u8], from: &mut usize) -> Option<(usize, usize)> {
    while *from < buf.len() {
        let i = *from;
        match buf[i] {
            b'\n' => return Some((i, i + 1)),
            b'\r' => {
                return match buf.get(i + 1) {
                    Some(b'\n') => Some((i, i + 2)),
                    Some(_) => Some((i, i + 1)),
                    None => None,
                }
            }
            _ => *from += 1,
        }
    }
    None
}

/// Split a byte stream into lines. Terminators (`\n`, `\r\n` or a bare `\r`) are removed
/// and a trailing unterminated line is flushed at the end. An upstream error is passed on
/// and ends the stream.
pub fn split_lines<S, E>(chunks: S) -> impl Stream<Item = std::result::Result<Bytes, E>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let mut buffer = BytesMut::new();
        let mut scanned = 0usize;
        let mut failed = false;

        tokio::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some((end, next)) = next_line_break(&buffer, &mut scanned) {
                let mut line = buffer.split_to(next);
                line.truncate(end);
                scanned = 0;
                yield Ok(line.freeze());
            }
        }

        if !failed && !buffer.is_empty() {
            if buffer.last() == Some(&b'\r') {
                buffer.truncate(buffer.len() - 1);
            }
            yield Ok(buffer.freeze());
        }
    }
}

/// Drop empty lines and terminate every other line with a single `\n`.
pub fn frame_lines<S, E>(lines: S) -> impl Stream<Item = std::result::Result<Bytes, E>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: Send,
{
    lines.filter_map(|line| {
        futures::future::ready(match line {
            Ok(l) if l.is_empty() => None,
            Ok(l) => {
                let mut framed = BytesMut::with_capacity(l.len() + 1);
                framed.extend_from_slice(&l);
                framed.put_u8(b'\n');
                Some(Ok(framed.freeze()))
            }
            Err(e) => Some(Err(e)),
        })
    })
}

/// The last chunk sent when the backend stream breaks after the response has started.
pub fn terminal_error_chunk(message: &str) -> Bytes {
    let envelope = ErrorEnvelope::stream_failure(message);
    let json = serde_json::to_string(&envelope).unwrap_or_default();
    Bytes::from(format!("data: {}\n", json))
}

/// Appends the journal record when the stream is dropped. A record still pending at
/// that point means the caller went away before the backend finished.
struct StreamGuard {
    journal: SharedJournal,
    record: Option<RequestRecord>,
}

impl StreamGuard {
    fn finish(&mut self, outcome: Outcome, detail: String) {
        if let Some(record) = self.record.take() {
            self.journal.append(record.outcome(outcome).detail(detail));
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            tracing::info!(request_id = %record.request_id, "caller disconnected mid-stream");
            self.journal
                .append(record.outcome(Outcome::StreamFailed).detail("caller disconnected"));
        }
    }
}

/// Relay a backend byte stream as a `text/event-stream` body under the backend's status.
pub fn relay_stream<S, E>(
    status: StatusCode,
    chunks: S,
    journal: SharedJournal,
    record: RequestRecord,
) -> Response
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let lines = frame_lines(split_lines(chunks));
    let request_id = record.request_id;

    let body = async_stream::stream! {
        let mut guard = StreamGuard { journal, record: Some(record) };
        let mut relayed = 0usize;
        let mut failure = None;

        tokio::pin!(lines);

        while let Some(line) = lines.next().await {
            match line {
                Ok(chunk) => {
                    relayed += 1;
                    yield Ok::<Bytes, Infallible>(chunk);
                }
                Err(e) => {
                    failure = Some(format!("Backend stream failed after {} chunks: {}", relayed, e));
                    break;
                }
            }
        }

        match failure {
            Some(message) => {
                tracing::warn!(%request_id, "{}", message);
                yield Ok(terminal_error_chunk(&message));
                guard.finish(Outcome::StreamFailed, message);
            }
            None => {
                tracing::info!(%request_id, chunks = relayed, "stream completed");
                guard.finish(Outcome::Streamed, format!("{} chunks", relayed));
            }
        }
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
