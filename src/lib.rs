//! # hostpulse - Resilient Host-Metrics Acquisition
//!
//! The data-acquisition core of a live host-metrics dashboard: ping latency
//! and CPU usage over periodic HTTP polling, memory usage over a persistent
//! streaming channel with automatic reconnection and capped exponential
//! backoff.
//!
//! ## Features
//!
//! - **Polling acquisition**: fixed-cadence fetches with a debounced manual
//!   trigger and atomic interval changes
//! - **Streaming acquisition**: one owned connection per acquirer, a full
//!   reconnection state machine, and pause without severing the connection
//! - **Clean event surface**: samples, classified fetch failures, and
//!   connection-state transitions over a broadcast channel, in order
//! - **Read-side smoothing**: rolling windows and bounded sample history,
//!   decoupled from acquisition
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hostpulse::{AcquirerConfig, PingFetcher, PollingAcquirer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AcquirerConfig::default();
//!     let acquirer = PollingAcquirer::new(Arc::new(PingFetcher::new(&config)), &config);
//!     let mut events = acquirer.subscribe();
//!     acquirer.start(config.poll_interval_secs)?;
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod error;
pub mod model;

// Re-export public API
pub use acquire::{
    AcquirerConfig, AcquirerEvent, CpuFetcher, FailureKind, FetchFailure, MetricFetcher,
    PingFetcher, PollingAcquirer, ReconnectPolicy, StreamAcquirer, StreamConnection,
    StreamTransport, TransportEvent, TriggerOutcome, WsTransport,
};
pub use error::{AcquireError, Result};
pub use model::{
    ConnectionState, CpuSample, MemorySample, MetricKind, MetricSample, PingSample, PingStatus,
    RollingAggregator, RollingWindow, SampleHistory,
};

/// The default polling interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// The default debounce window for manual triggers in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// The default maximum number of automatic reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// The default base backoff delay in milliseconds
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1000;

/// The default backoff cap in milliseconds
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 16000;

/// WebSocket normal-closure code; any other close code is abnormal
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Measured ping latency above this many milliseconds is flagged WARN
pub const WARN_LATENCY_MS: u64 = 200;
