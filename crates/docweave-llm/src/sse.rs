//! Server-sent event framing shared by the streaming providers

use crate::provider::{LlmError, LlmResult};
use futures::StreamExt;

/// One `event:`/`data:` frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Split a byte stream into SSE frames. Frames without data are skipped;
/// multi-line `data:` fields are joined with newlines.
pub fn sse_events<S, E>(bytes_stream: S) -> impl futures::Stream<Item = LlmResult<SseEvent>> + Send
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        // Raw bytes: a multi-byte character may straddle two chunks, so only
        // complete frames are decoded.
        let mut buffer: Vec<u8> = Vec::new();

        tokio::pin!(bytes_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);
            if buffer.contains(&b'\r') {
                buffer = strip_crlf(&buffer);
            }

            while let Some(event_end) = find_frame_end(&buffer) {
                let frame: Vec<u8> = buffer.drain(..event_end + 2).take(event_end).collect();
                match decode_frame(frame) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decode_frame(buffer) {
            Ok(Some(event)) => yield Ok(event),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// `\r\n` to `\n`. A lone trailing `\r` is kept until its `\n` arrives.
fn strip_crlf(buffer: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len());
    let mut iter = buffer.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

fn decode_frame(frame: Vec<u8>) -> LlmResult<Option<SseEvent>> {
    let text = String::from_utf8(frame)
        .map_err(|e| LlmError::InvalidResponse(format!("SSE frame is not UTF-8: {}", e)))?;
    Ok(parse_frame(text.trim_end()))
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event.event = rest.trim_start().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}
