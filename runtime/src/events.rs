// Copyright 2026 Pitchkit Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline event bus: typed stage events from every extraction.
//!
//! The EventBus is a `tokio::sync::broadcast` channel that carries
//! [`PipelineEvent`] values. Analytics sinks, the REST SSE stream and log
//! files can subscribe independently. When no subscribers exist, events are
//! silently dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the pipeline emits. Serialized to JSON for SSE streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// An extraction request was accepted.
    ExtractionStarted { url: String, timestamp: String },
    /// The static fetch finished (successfully or not).
    StaticFetched {
        url: String,
        status: Option<u16>,
        bytes: usize,
        elapsed_ms: u64,
    },
    /// The classifier asked for a browser render.
    RenderRequested { url: String, reason: String },
    /// A browser render produced hydrated HTML.
    RenderComplete {
        url: String,
        bytes: usize,
        elapsed_ms: u64,
    },
    /// A browser render failed; the pipeline continues without it.
    RenderFailed {
        url: String,
        error: String,
        elapsed_ms: u64,
    },
    /// Extraction finished with merged text.
    ExtractionComplete {
        url: String,
        chars: usize,
        source: String,
        truncated: bool,
        total_ms: u64,
    },
    /// Extraction aborted with an error.
    ExtractionFailed {
        url: String,
        error: String,
        total_ms: u64,
    },
}

impl PipelineEvent {
    /// The URL this event is about.
    pub fn url(&self) -> &str {
        match self {
            Self::ExtractionStarted { url, .. }
            | Self::StaticFetched { url, .. }
            | Self::RenderRequested { url, .. }
            | Self::RenderComplete { url, .. }
            | Self::RenderFailed { url, .. }
            | Self::ExtractionComplete { url, .. }
            | Self::ExtractionFailed { url, .. } => url,
        }
    }
}

/// Broadcast bus for pipeline events.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire and forget.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

/// Seconds since the Unix epoch as a string.
pub fn now_timestamp() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", dur.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::RenderFailed {
            url: "https://shop.example.com/".to_string(),
            error: "navigation timed out after 15000ms".to_string(),
            elapsed_ms: 15_002,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"RenderFailed""#));
        assert!(json.contains("15000ms"));

        let parsed: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.url(), "https://shop.example.com/");
    }

    #[test]
    fn test_event_bus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(PipelineEvent::ExtractionStarted {
            url: "https://shop.example.com/".to_string(),
            timestamp: now_timestamp(),
        });
    }

    #[test]
    fn test_event_bus_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(PipelineEvent::RenderRequested {
            url: "https://spa.example.com/".to_string(),
            reason: "hydration marker __NEXT_DATA__".to_string(),
        });

        match rx.try_recv().unwrap() {
            PipelineEvent::RenderRequested { reason, .. } => assert!(reason.contains("NEXT")),
            other => panic!("wrong event: {other:?}"),
        }
    }
}
