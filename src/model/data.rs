//! Data structures for metric samples and the wire formats they decode from.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds, used as the client receipt timestamp.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The metric stream a sample or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Ping,
    Cpu,
    Memory,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Ping => write!(f, "ping"),
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
        }
    }
}

/// One immutable metric reading.
///
/// Created by an acquirer on receipt and never mutated afterwards. Each
/// variant carries the server-reported capture timestamp and the client
/// receipt timestamp assigned at arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "lowercase")]
pub enum MetricSample {
    Ping(PingSample),
    Cpu(CpuSample),
    Memory(MemorySample),
}

impl MetricSample {
    /// Which metric stream this sample belongs to.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSample::Ping(_) => MetricKind::Ping,
            MetricSample::Cpu(_) => MetricKind::Cpu,
            MetricSample::Memory(_) => MetricKind::Memory,
        }
    }

    /// The headline numeric reading: latency in ms for ping, usage percent
    /// for cpu and memory. This is the value fed into rolling windows.
    pub fn value(&self) -> f64 {
        match self {
            MetricSample::Ping(s) => s.latency_ms as f64,
            MetricSample::Cpu(s) => s.usage_percent,
            MetricSample::Memory(s) => s.usage_percent,
        }
    }

    /// Client receipt timestamp (Unix ms).
    pub fn received_at_ms(&self) -> u64 {
        match self {
            MetricSample::Ping(s) => s.received_at_ms,
            MetricSample::Cpu(s) => s.received_at_ms,
            MetricSample::Memory(s) => s.received_at_ms,
        }
    }
}

/// Health classification for a ping round trip, derived from the
/// client-measured latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PingStatus {
    Ok,
    Warn,
}

impl PingStatus {
    /// Classify a measured round-trip latency: WARN above the threshold,
    /// OK otherwise.
    pub fn from_latency(latency_ms: u64) -> Self {
        if latency_ms > crate::WARN_LATENCY_MS {
            PingStatus::Warn
        } else {
            PingStatus::Ok
        }
    }
}

impl fmt::Display for PingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingStatus::Ok => write!(f, "OK"),
            PingStatus::Warn => write!(f, "WARN"),
        }
    }
}

/// One ping round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingSample {
    /// Health status derived from the measured latency
    pub status: PingStatus,
    /// Server-reported capture time (ISO 8601)
    pub server_time: String,
    /// Round-trip latency measured on the client, in milliseconds
    pub latency_ms: u64,
    /// Client receipt timestamp (Unix ms)
    pub received_at_ms: u64,
}

/// One CPU usage reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    /// CPU usage percentage (0.0 to 100.0)
    pub usage_percent: f64,
    /// Server-reported capture time (ISO 8601)
    pub captured_at: String,
    /// Client receipt timestamp (Unix ms)
    pub received_at_ms: u64,
}

/// One memory usage reading from the streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Memory usage percentage (0.0 to 100.0)
    pub usage_percent: f64,
    /// Used memory in MB
    pub used_mb: u64,
    /// Total memory in MB
    pub total_mb: u64,
    /// Server-reported capture time (ISO 8601)
    pub captured_at: String,
    /// Client receipt timestamp (Unix ms)
    pub received_at_ms: u64,
}

/// Connection lifecycle of a streaming acquirer.
///
/// Exactly one state is current per acquirer at any time; a transition
/// supersedes the previous state rather than mutating it. `Connecting` and
/// `Error` carry the reconnect attempt counter in effect when the state was
/// entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Error { attempt: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting { attempt } => write!(f, "connecting({attempt})"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error { attempt } => write!(f, "error({attempt})"),
        }
    }
}

/// Wire format of `GET /ping`.
///
/// The server reports its own latency figure, but consumers use the
/// client-measured round trip instead; the field is kept for completeness.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingWire {
    pub status: String,
    pub server_time: String,
    pub latency_ms: u64,
}

/// Wire format of `GET /cpu`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuWire {
    pub usage_percent: f64,
    pub captured_at: String,
}

/// Inbound text frame on the memory streaming channel, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemoryFrame {
    /// Greeting sent once per connection; carries no reading.
    Welcome {
        #[serde(rename = "serverTime", default)]
        server_time: Option<String>,
    },
    /// A memory usage reading.
    Data {
        #[serde(rename = "usagePercent")]
        usage_percent: f64,
        #[serde(rename = "usedMB")]
        used_mb: u64,
        #[serde(rename = "totalMB")]
        total_mb: u64,
        #[serde(rename = "capturedAt", default)]
        captured_at: Option<String>,
    },
    /// Server-side failure report; the server closes shortly after.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Bounded buffer of the most recent samples, oldest evicted first.
///
/// Independent of [`super::window::RollingWindow`]: history keeps whole
/// samples for display, the rolling window keeps bare numbers for smoothing.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    entries: VecDeque<MetricSample>,
    capacity: usize,
}

impl SampleHistory {
    /// Create a history buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest entry when full.
    pub fn push(&mut self, sample: MetricSample) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sample);
    }

    /// The most recently pushed sample.
    pub fn latest(&self) -> Option<&MetricSample> {
        self.entries.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
