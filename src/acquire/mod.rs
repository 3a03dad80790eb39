//! Resilient metric acquisition.
//!
//! Two acquirers produce the event stream consumed by sinks: a
//! [`PollingAcquirer`] issuing one-shot HTTP fetches on a fixed cadence
//! (ping, CPU) and a [`StreamAcquirer`] owning a persistent streaming
//! connection with automatic, capped-exponential-backoff reconnection
//! (memory). Both deliver [`AcquirerEvent`]s over a broadcast channel in
//! the order they occur.

pub mod backoff;
pub mod config;
pub mod events;
pub mod http;
pub mod poll;
pub mod stream;
pub mod traits;
pub mod ws;

// Re-export commonly used items
pub use backoff::ReconnectPolicy;
pub use config::AcquirerConfig;
pub use events::{AcquirerEvent, FailureKind, FetchFailure};
pub use http::{CpuFetcher, PingFetcher};
pub use poll::{PollingAcquirer, TriggerOutcome};
pub use stream::StreamAcquirer;
pub use traits::{MetricFetcher, StreamConnection, StreamTransport, TransportEvent};
pub use ws::WsTransport;
