//! Incremental stream relay engine
//!
//! Consumes the upstream completion response as a chunked event stream,
//! reassembles it into discrete frames, extracts content fragments and
//! forwards each one to the caller as a newline-delimited JSON event.

mod coordinator;
mod decoder;
mod delta;

pub use coordinator::StreamRelay;
pub use decoder::{FrameDecoder, RawFrame};
pub use delta::extract_delta;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::search::SearchResult;

/// One logical event on the outbound transport
///
/// Serializes to exactly one JSON object per variant: `{"fontes":[...]}`
/// (at most once, first), `{"delta":"..."}` (zero or more) and
/// `{"error":"..."}` (at most once, terminal).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Web sources backing this turn, surfaced before any content
    Fontes(Vec<SearchResult>),
    /// One incremental piece of generated text
    Delta(String),
    /// Terminal error for the session
    Error(String),
}

/// Sending half of the outbound transport
///
/// Each event becomes one NDJSON line pushed through a bounded channel; the
/// receiving half is turned into the chunked response body, so every line
/// is flushed to the caller as it is produced.
pub struct EventSink {
    tx: mpsc::Sender<Bytes>,
}

impl EventSink {
    /// Create a sink and the receiver that feeds the response body
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Serialize and enqueue one event
    ///
    /// Returns `false` when the caller has disconnected and the event could
    /// not be delivered.
    pub async fn send(&self, event: &OutboundEvent) -> bool {
        let Ok(mut line) = serde_json::to_vec(event) else {
            return false;
        };
        line.push(b'\n');
        self.tx.send(Bytes::from(line)).await.is_ok()
    }
}
