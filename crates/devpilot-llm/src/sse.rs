//! Server-Sent-Events decoding for streamed completions.
//!
//! Events are separated by a blank line and carry a `data: ` prefix. The
//! payload is either a JSON object or the literal `[DONE]`.

use futures_util::{pin_mut, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::handle::Interrupter;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Progress(Value),
    Done,
}

/// Push decoder for an SSE byte stream.
///
/// Bytes are buffered until a full event is available, so chunk boundaries
/// may fall anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `Done` has been emitted. Further input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(end) = find_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let raw = String::from_utf8_lossy(&event[..end]);
            if let Some(frame) = self.decode_event(raw.trim()) {
                frames.push(frame);
                if self.done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Signal end of input.
    ///
    /// Unterminated buffered data is decoded as a final event, then `Done` is
    /// emitted unless it already was.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        let rest = std::mem::take(&mut self.buffer);
        let raw = String::from_utf8_lossy(&rest);
        let raw = raw.trim();
        if !raw.is_empty() {
            if let Some(frame) = self.decode_event(raw) {
                frames.push(frame);
            }
        }
        if !self.done {
            self.done = true;
            frames.push(SseFrame::Done);
        }
        frames
    }

    fn decode_event(&mut self, raw: &str) -> Option<SseFrame> {
        if raw == DONE_SENTINEL {
            self.done = true;
            return Some(SseFrame::Done);
        }
        // Comments (`:`) and other fields do not carry the data prefix.
        let payload = raw.strip_prefix(DATA_PREFIX)?;
        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return Some(SseFrame::Done);
        }
        match serde_json::from_str(payload) {
            Ok(value) => Some(SseFrame::Progress(value)),
            Err(e) => {
                let err = StreamError::Decode(e.to_string());
                warn!(error = %err, chunk = %raw, "Dropping malformed stream event");
                None
            }
        }
    }
}

fn find_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Receives decoded stream events.
pub trait StreamHandler: Send {
    fn on_progress(&mut self, event: Value);

    fn on_done(&mut self) {}

    fn on_interrupted(&mut self) {}

    fn on_error(&mut self, _err: StreamError) {}
}

/// How reading a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Done,
    Interrupted,
    Failed,
}

/// Read an SSE byte stream to completion, dispatching events to `handler`.
///
/// `on_done` fires at most once, after the last `on_progress`. When
/// `interrupter` fires, the stream is dropped, no further progress or done
/// callbacks happen, and `on_interrupted` fires once. A stream error calls
/// `on_error` and ends reading without `on_done`.
pub async fn read_event_stream<S, B, E, H>(
    stream: S,
    handler: &mut H,
    interrupter: &Interrupter,
) -> StreamOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    H: StreamHandler + ?Sized,
{
    let mut decoder = SseDecoder::new();
    pin_mut!(stream);

    loop {
        let next = tokio::select! {
            biased;
            _ = interrupter.interrupted() => None,
            chunk = stream.next() => Some(chunk),
        };

        let frames = match next {
            None => {
                debug!("Event stream interrupted");
                handler.on_interrupted();
                return StreamOutcome::Interrupted;
            }
            Some(Some(Ok(chunk))) => decoder.feed(chunk.as_ref()),
            Some(Some(Err(e))) => {
                handler.on_error(StreamError::Io(e.to_string()));
                return StreamOutcome::Failed;
            }
            Some(None) => decoder.finish(),
        };

        for frame in frames {
            if interrupter.is_interrupted() {
                handler.on_interrupted();
                return StreamOutcome::Interrupted;
            }
            match frame {
                SseFrame::Progress(event) => handler.on_progress(event),
                SseFrame::Done => {
                    handler.on_done();
                    return StreamOutcome::Done;
                }
            }
        }
    }
}
