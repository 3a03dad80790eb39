//! Metric sample data model and read-side smoothing.
//!
//! This module defines the immutable sample records produced by the
//! acquirers, the wire formats they are decoded from, the connection-state
//! enum for the streaming channel, and the bounded buffers consumers use to
//! keep recent readings (history and rolling averages).

pub mod data;
pub mod window;

// Re-export commonly used items
pub use data::{
    ConnectionState, CpuSample, MemorySample, MetricKind, MetricSample, PingSample, PingStatus,
    SampleHistory,
};
pub use window::{RollingAggregator, RollingWindow};
