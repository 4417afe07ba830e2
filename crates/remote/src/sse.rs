//! Server-Sent Events framing for run streams.
//!
//! The service names every event (`event: thread.message.delta`) and puts
//! the JSON payload in one or more `data:` lines. Blocks are separated by a
//! blank line. [`drain_frames`] pulls complete blocks out of a buffer and
//! [`run_event_stream`] turns a streaming response into [`RunEvent`]s.

use crate::util::from_reqwest;
use crate::wire::parse_frame;
use ar_domain::error::Result;
use ar_domain::event::{BoxStream, RunEvent};
use bytes::BytesMut;

/// One complete SSE block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Extract complete frames from a raw SSE byte buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial block remains for the next call. Only complete blocks
/// are decoded, so a multi-byte character split across network chunks
/// survives intact. Multiple `data:` lines in one block are joined with
/// `\n`. Blocks carrying neither an event name nor data (comments,
/// keep-alives) are dropped.
pub(crate) fn drain_frames(buffer: &mut BytesMut) -> Vec<SseFrame> {
    if buffer.windows(2).any(|w| w == b"\r\n") {
        let normalized = strip_crlf(buffer);
        buffer.clear();
        buffer.extend_from_slice(&normalized);
    }

    let mut frames = Vec::new();
    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let raw = buffer.split_to(pos + 2);
        let block = String::from_utf8_lossy(&raw[..pos]);

        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event = Some(name.trim().to_string());
            } else if let Some(d) = line.strip_prefix("data:") {
                data.push(d.strip_prefix(' ').unwrap_or(d));
            }
        }

        if event.is_none() && data.is_empty() {
            continue;
        }
        frames.push(SseFrame {
            event,
            data: data.join("\n").trim().to_string(),
        });
    }

    frames
}

/// Drop every `\r` that directly precedes a `\n`. A trailing lone `\r` is
/// kept until its `\n` arrives.
fn strip_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Build a [`BoxStream`] of run events from a streaming response.
///
/// The stream ends right after the first [`RunEvent::Done`]. If the body
/// closes without one, the stream simply ends; deciding whether that is a
/// transport failure is up to the consumer.
pub(crate) fn run_event_stream(response: reqwest::Response) -> BoxStream<'static, Result<RunEvent>> {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = BytesMut::new();

        'read: loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    for frame in drain_frames(&mut buffer) {
                        let event = parse_frame(frame.event.as_deref(), &frame.data);
                        let done = matches!(event, RunEvent::Done);
                        yield Ok(event);
                        if done {
                            break 'read;
                        }
                    }
                }
                Ok(None) => {
                    // Flush a trailing block the server did not terminate.
                    if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                        buffer.extend_from_slice(b"\n\n");
                        for frame in drain_frames(&mut buffer) {
                            let event = parse_frame(frame.event.as_deref(), &frame.data);
                            let done = matches!(event, RunEvent::Done);
                            yield Ok(event);
                            if done {
                                break 'read;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    #[test]
    fn drain_named_event() {
        let mut buf = BytesMut::from("event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames, vec![frame("thread.run.created", "{\"id\":\"run_1\"}")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_events() {
        let mut buf = BytesMut::from("event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames, vec![frame("a", "1"), frame("b", "2")]);
    }

    #[test]
    fn partial_block_stays_in_buffer() {
        let mut buf = BytesMut::from("event: a\ndata: 1\n\nevent: b\ndata: {\"par");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(&buf[..], b"event: b\ndata: {\"par");

        buf.extend_from_slice(b"tial\":true}\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames, vec![frame("b", "{\"partial\":true}")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut buf = BytesMut::from("event: x\ndata: {\"a\":\ndata: 1}\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames[0].data, "{\"a\":\n1}");
    }

    #[test]
    fn crlf_delimiters_are_accepted() {
        let mut buf = BytesMut::from("event: done\r\ndata: [DONE]\r\n\r\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames, vec![frame("done", "[DONE]")]);
    }

    #[test]
    fn comment_only_blocks_are_dropped() {
        let mut buf = BytesMut::from(": keep-alive\n\ndata: [DONE]\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "[DONE]".into()
            }]
        );
    }

    #[test]
    fn character_split_across_chunks_is_preserved() {
        let payload = "event: thread.message.delta\ndata: {\"t\":\"【4:0†source】\"}\n\n";
        let bytes = payload.as_bytes();
        let split = payload.find('【').unwrap() + 1;

        let mut buf = BytesMut::from(&bytes[..split]);
        assert!(drain_frames(&mut buf).is_empty());
        buf.extend_from_slice(&bytes[split..]);
        let frames = drain_frames(&mut buf);
        assert_eq!(
            frames,
            vec![frame("thread.message.delta", "{\"t\":\"【4:0†source】\"}")]
        );
    }

    #[test]
    fn crlf_split_between_chunks_is_accepted() {
        let mut buf = BytesMut::from("event: done\r\ndata: [DONE]\r");
        assert!(drain_frames(&mut buf).is_empty());
        buf.extend_from_slice(b"\n\r\n");
        assert_eq!(drain_frames(&mut buf), vec![frame("done", "[DONE]")]);
    }
}
