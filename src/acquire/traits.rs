//! Seams between the acquirers and their transports.
//!
//! The acquirers are written against these traits so that the polling and
//! reconnection logic can be exercised without a live server; the real
//! implementations live in [`super::http`] and [`super::ws`].

use crate::error::Result;
use crate::model::data::{MetricKind, MetricSample};
use async_trait::async_trait;

/// A one-shot fetch of a single metric reading.
#[async_trait]
pub trait MetricFetcher: Send + Sync + 'static {
    /// Which metric stream this fetcher produces.
    fn metric(&self) -> MetricKind;

    /// Perform one fetch cycle, producing exactly one sample or one error.
    async fn fetch(&self) -> Result<MetricSample>;
}

/// Opens streaming connections.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Open a connection to `url`. An `Err` corresponds to a failed open
    /// and is treated like an abnormal closure for reconnection purposes.
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>>;
}

/// One open streaming connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Wait for the next transport-level event. After `Closed` is returned
    /// the connection is spent and must not be polled again.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection with the normal-closure code.
    async fn close(&mut self);
}

/// Transport-level events surfaced by a [`StreamConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An inbound text frame.
    Message(String),
    /// A transport error. Does not imply closure; a `Closed` event follows
    /// separately and is the authoritative trigger for reconnection.
    Error(String),
    /// The connection closed with the given close code.
    Closed { code: u16 },
}
