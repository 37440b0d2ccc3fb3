//! Typed pod watch stream.
//!
//! The API server pushes watch events as SSE frames whose `data:` payload is
//! a JSON object `{"type": "...", "object": {...}}`. The stream decodes one
//! typed event per call and tracks the last observed resource version so a
//! re-subscribe can resume from it.

use crate::error::{ClientError, Result};
use flexlb_core::{Pod, WatchEvent, WatchEventType};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

type ByteChunks = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

/// A live watch subscription yielding typed pod events
pub struct PodWatchStream {
    chunks: ByteChunks,
    buffer: String,
    resource_version: Option<String>,
}

impl PodWatchStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let chunks = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()));
        Self {
            chunks: Box::pin(chunks),
            buffer: String::new(),
            resource_version: None,
        }
    }

    /// The most recently observed resource version, if any
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Read the next event from the stream.
    ///
    /// Returns `Ok(None)` when the server closes the stream. A stream-expired
    /// signal (ERROR event carrying code 410) surfaces as
    /// [`ClientError::StreamExpired`].
    pub async fn next_event(&mut self) -> Result<Option<WatchEvent<Pod>>> {
        loop {
            while let Some(pos) = self.buffer.find('\n') {
                let line: String = self.buffer.drain(..=pos).collect();
                let line = line.trim_end_matches(['\n', '\r']);

                let Some(payload) = sse_payload(line) else {
                    continue;
                };

                let event = decode_event(payload)?;
                if let Some(version) = &event.object.metadata.resource_version {
                    self.resource_version = Some(version.clone());
                }
                return Ok(Some(event));
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&chunk));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}

/// Extract the payload of an SSE `data:` line.
///
/// Comment lines (keep-alives), other SSE fields, and blank separator lines
/// carry no event and yield `None`.
fn sse_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Decode one event payload.
///
/// ERROR events are turned into the matching error kind: code 410 means the
/// watch expired, anything else is an API failure.
fn decode_event(payload: &str) -> Result<WatchEvent<Pod>> {
    let raw: WatchEvent<serde_json::Value> = serde_json::from_str(payload)
        .map_err(|e| ClientError::decode(format!("malformed watch event: {}", e)))?;

    match raw.event_type {
        WatchEventType::Error => {
            let code = raw.object.get("code").and_then(|c| c.as_u64()).unwrap_or(0);
            if code == 410 {
                return Err(ClientError::StreamExpired);
            }
            let message = raw
                .object
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("watch error")
                .to_string();
            Err(ClientError::api(code as u16, message))
        }
        event_type => {
            let pod: Pod = serde_json::from_value(raw.object)
                .map_err(|e| ClientError::decode(format!("malformed pod in watch event: {}", e)))?;
            Ok(WatchEvent {
                event_type,
                object: pod,
            })
        }
    }
}
