//! Streaming event contracts, line reassembly, and in-memory stream utilities.
//!
//! ```rust
//! use pprovider::{BoxedEventStream, StreamEvent, VecEventStream};
//!
//! let stream = VecEventStream::new(vec![Ok(StreamEvent::TextDelta("hello".into()))]);
//! let _boxed: BoxedEventStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    /// A frame that could not be decoded. Consumers keep reading.
    FrameSkipped { reason: String },
}

/// Provider stream contract.
///
/// Invariants for consumers:
/// - Events are emitted in source order.
/// - Concatenating every `TextDelta` yields the full reply text.
/// - The end-of-stream sentinel is not an event; the stream yields `None` instead.
/// - Once the stream yields `None`, it must not yield additional items.
pub trait ModelEventStream: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

impl<T> ModelEventStream for T where T: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

pub type BoxedEventStream<'a> = Pin<Box<dyn ModelEventStream + 'a>>;

#[derive(Debug)]
pub struct VecEventStream {
    events: VecDeque<Result<StreamEvent, ProviderError>>,
}

impl VecEventStream {
    pub fn new(events: Vec<Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl Stream for VecEventStream {
    type Item = Result<StreamEvent, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<StreamEvent, ProviderError>>> {
        Poll::Ready(self.events.pop_front())
    }
}

/// Longest line [`LineBuffer`] holds before discarding it.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// Bytes are buffered until a `\n` arrives, so a multi-byte UTF-8 character
/// or a JSON payload split across network reads is decoded only once whole.
/// A line longer than the cap is dropped up to its terminator and reported
/// once through [`LineBuffer::take_overflow`].
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
    overflowed: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
            discarding: false,
            overflowed: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let mut chunk = chunk;
        if self.discarding {
            let Some(newline) = chunk.iter().position(|byte| *byte == b'\n') else {
                return;
            };
            self.discarding = false;
            chunk = &chunk[newline + 1..];
        }

        self.pending.extend_from_slice(chunk);
    }

    /// Pops the next complete line without its terminator (`\n` or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') else {
                if self.pending.len() > self.max_line_bytes {
                    self.pending.clear();
                    self.discarding = true;
                    self.overflowed = true;
                }
                return None;
            };

            let line = self.pending.drain(..=newline).collect::<Vec<_>>();
            if newline > self.max_line_bytes {
                self.overflowed = true;
                continue;
            }
            return Some(decode_line(&line[..newline]));
        }
    }

    /// Returns whatever remains after the final chunk, if anything.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let rest = std::mem::take(&mut self.pending);
        if rest.len() > self.max_line_bytes {
            self.overflowed = true;
            return None;
        }
        Some(decode_line(&rest))
    }

    /// Whether a line was dropped for length since the last call.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
