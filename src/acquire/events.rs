//! The event surface emitted to sinks.

use crate::error::AcquireError;
use crate::model::data::{now_ms, ConnectionState, MetricKind, MetricSample};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity of an acquirer's broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// An event emitted by an acquirer.
///
/// Events for a given acquirer are delivered in the order they occur; none
/// are reordered or coalesced. Samples and failures are discrete: a failed
/// fetch never suppresses or replaces a later event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AcquirerEvent {
    /// A successfully acquired metric reading.
    Sample(MetricSample),
    /// A fetch or decode failure, classification preserved.
    FetchFailed(FetchFailure),
    /// A connection-state transition on a streaming acquirer.
    State(ConnectionState),
}

/// Classification of a failed fetch, kept coarse enough to be `Copy` but
/// fine enough for sinks to tell a bad payload from a dead network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FailureKind {
    /// Network-level failure
    Transport,
    /// Non-2xx HTTP response, code preserved
    Status { code: u16 },
    /// Malformed payload
    Decode,
    /// An explicit error frame sent by the server
    Server,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Status { code } => write!(f, "status {code}"),
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Server => write!(f, "server"),
        }
    }
}

/// A discrete fetch failure event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Which metric stream the failure belongs to
    pub metric: MetricKind,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
    /// When the failure was observed (Unix ms)
    pub observed_at_ms: u64,
}

impl FetchFailure {
    /// Build a failure event from an [`AcquireError`], preserving its
    /// classification.
    pub fn from_error(metric: MetricKind, error: &AcquireError) -> Self {
        let kind = match error {
            AcquireError::Status { code, .. } => FailureKind::Status { code: *code },
            AcquireError::Decode(_) => FailureKind::Decode,
            _ => FailureKind::Transport,
        };
        Self {
            metric,
            kind,
            message: error.to_string(),
            observed_at_ms: now_ms(),
        }
    }

    /// A decode failure observed on an inbound frame.
    pub fn decode(metric: MetricKind, message: impl Into<String>) -> Self {
        Self {
            metric,
            kind: FailureKind::Decode,
            message: message.into(),
            observed_at_ms: now_ms(),
        }
    }

    /// A failure the server reported about itself.
    pub fn server(metric: MetricKind, message: impl Into<String>) -> Self {
        Self {
            metric,
            kind: FailureKind::Server,
            message: message.into(),
            observed_at_ms: now_ms(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fetch failed ({}): {}", self.metric, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_preserved() {
        let failure =
            FetchFailure::from_error(MetricKind::Cpu, &AcquireError::status_error(503, "busy"));
        assert_eq!(failure.kind, FailureKind::Status { code: 503 });
        assert_eq!(failure.metric, MetricKind::Cpu);

        let failure = FetchFailure::from_error(
            MetricKind::Ping,
            &AcquireError::decode_error("bad payload"),
        );
        assert_eq!(failure.kind, FailureKind::Decode);

        let failure = FetchFailure::from_error(
            MetricKind::Ping,
            &AcquireError::transport_error("refused"),
        );
        assert_eq!(failure.kind, FailureKind::Transport);
    }

    #[test]
    fn test_display() {
        let failure = FetchFailure::server(MetricKind::Memory, "send error");
        let text = failure.to_string();
        assert!(text.contains("memory"));
        assert!(text.contains("send error"));
    }
}
