//! Event frame decoding for the upstream byte stream
//!
//! The upstream completion API delivers its response as a line-oriented
//! event stream: each meaningful line is `data: ` followed by a payload,
//! and the reserved payload `[DONE]` marks the end of the stream. Chunk
//! boundaries are arbitrary and may fall anywhere, including inside a
//! multi-byte UTF-8 sequence, so the decoder is a small state machine whose
//! only state is the undecoded byte remainder.

/// A single decoded textual unit from the upstream stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A data line payload, prefix stripped and whitespace trimmed
    Data(String),
    /// The end-of-stream sentinel
    Terminator,
}

const DATA_PREFIX: &str = "data: ";
const TERMINATOR_SENTINEL: &str = "[DONE]";

/// Incremental decoder from raw byte chunks to [`RawFrame`] values
///
/// Feed chunks with [`push`](Self::push) as they arrive; each call returns
/// the frames completed by that chunk. When the stream signals completion,
/// call [`finish`](Self::finish) to recover a final well-formed data line
/// that arrived without a trailing newline.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create a decoder with an empty remainder
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return every frame it completes
    ///
    /// The bytes after the last line terminator are retained as the new
    /// remainder; they may be the start of a line still in flight.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let line = &self.buffer[consumed..consumed + offset];
            if let Some(frame) = parse_line(&String::from_utf8_lossy(line)) {
                frames.push(frame);
            }
            consumed += offset + 1;
        }
        self.buffer.drain(..consumed);

        frames
    }

    /// Parse whatever remains once the stream has ended
    ///
    /// A complete data line that simply never got its trailing newline is
    /// still emitted; anything else is dropped since it cannot be completed.
    pub fn finish(self) -> Option<RawFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        parse_line(&String::from_utf8_lossy(&self.buffer))
    }
}

/// Parse one complete line into a frame
///
/// Lines without the data prefix are framing noise, not errors; they yield
/// nothing.
fn parse_line(line: &str) -> Option<RawFrame> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == TERMINATOR_SENTINEL {
        Some(RawFrame::Terminator)
    } else {
        Some(RawFrame::Data(payload.to_string()))
    }
}
