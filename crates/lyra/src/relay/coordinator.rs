//! Stream relay coordination
//!
//! Owns one upstream request/response exchange end-to-end: issues the
//! completion request with streaming enabled, pumps the byte stream through
//! the frame decoder and delta extractor, forwards every non-empty fragment
//! to the caller and accumulates the full response text for persistence.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::decoder::{FrameDecoder, RawFrame};
use super::delta::extract_delta;
use super::{EventSink, OutboundEvent};
use crate::config::UpstreamConfig;
use crate::context::Instruction;
use crate::error::{LyraError, Result};

/// Coordinates one upstream completion exchange
#[derive(Debug)]
pub struct StreamRelay {
    client: Client,
    config: UpstreamConfig,
    api_key: String,
}

/// Completion request body sent upstream
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Instruction],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

impl StreamRelay {
    /// Create a new relay from the upstream configuration
    ///
    /// Reads the API key from the environment variable named in the config.
    /// A missing credential is a fatal configuration error, reported here
    /// and never mid-stream.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LyraError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        // Only the connection attempt is bounded; an open stream may run
        // for as long as the model keeps generating.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LyraError::Upstream(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    /// Run one relay session against the upstream completion endpoint
    ///
    /// Every non-empty fragment is emitted through `sink` as it is decoded.
    /// Returns the accumulated response text, which equals the exact
    /// concatenation of the emitted fragments.
    pub async fn relay(&self, instructions: &[Instruction], sink: &EventSink) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: instructions,
            stream: true,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        debug!("Opening upstream stream at: {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LyraError::Upstream(format!("falha ao chamar o modelo: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "(sem detalhes do corpo)".to_string());
            return Err(LyraError::Upstream(format!(
                "falha ao gerar resposta: {status}: {detail}"
            )));
        }

        pump_stream(response.bytes_stream(), sink).await
    }
}

/// Decode, extract and forward until the stream ends
///
/// Generic over the chunk stream so the relay loop can be exercised with
/// arbitrary chunk partitions. The terminator frame ends the loop and
/// nothing decoded after it is processed; if the stream ends without a
/// terminator, a final well-formed unterminated data line is still honored.
/// A failed send means the caller disconnected: pulling stops and whatever
/// was delivered so far is returned.
pub(crate) async fn pump_stream<S, E>(mut stream: S, sink: &EventSink) -> Result<String>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut decoder = FrameDecoder::new();
    let mut accumulated = String::new();
    let mut terminated = false;

    'read: while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| LyraError::Upstream(format!("falha ao ler o stream: {e}")))?;

        for frame in decoder.push(&chunk) {
            match frame {
                RawFrame::Terminator => {
                    terminated = true;
                    break 'read;
                }
                RawFrame::Data(payload) => {
                    let Some(delta) = extract_delta(&payload) else {
                        continue;
                    };
                    if delta.is_empty() {
                        continue;
                    }
                    if !sink.send(&OutboundEvent::Delta(delta.clone())).await {
                        debug!("caller disconnected, releasing upstream stream");
                        return Ok(accumulated);
                    }
                    accumulated.push_str(&delta);
                }
            }
        }
    }

    if !terminated {
        if let Some(RawFrame::Data(payload)) = decoder.finish() {
            if let Some(delta) = extract_delta(&payload) {
                if !delta.is_empty() && sink.send(&OutboundEvent::Delta(delta.clone())).await {
                    accumulated.push_str(&delta);
                }
            }
        }
    }

    Ok(accumulated)
}
