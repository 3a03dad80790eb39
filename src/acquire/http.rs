//! HTTP fetchers for the polled metrics.

use crate::acquire::config::AcquirerConfig;
use crate::acquire::traits::MetricFetcher;
use crate::error::{AcquireError, Result};
use crate::model::data::{
    now_ms, CpuSample, CpuWire, MetricKind, MetricSample, PingSample, PingStatus, PingWire,
};
use async_trait::async_trait;
use std::time::Instant;

/// Issue a GET and split the outcome into the taxonomy the sinks care
/// about: transport failure, non-2xx status (code preserved), or a payload
/// that does not decode.
async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AcquireError::transport_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AcquireError::status_error(status.as_u16(), body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AcquireError::decode_error(e.to_string()))
}

/// Fetches `GET {base}/ping` and measures the round trip on the client.
///
/// The latency recorded on the sample is the locally measured request
/// duration, not the figure the server reports about itself, and the
/// OK/WARN status is derived from it.
pub struct PingFetcher {
    client: reqwest::Client,
    url: String,
}

impl PingFetcher {
    pub fn new(config: &AcquirerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/ping", config.base_url),
        }
    }
}

#[async_trait]
impl MetricFetcher for PingFetcher {
    fn metric(&self) -> MetricKind {
        MetricKind::Ping
    }

    async fn fetch(&self) -> Result<MetricSample> {
        let started = Instant::now();
        let wire: PingWire = get_json(&self.client, &self.url).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        Ok(MetricSample::Ping(PingSample {
            status: PingStatus::from_latency(latency_ms),
            server_time: wire.server_time,
            latency_ms,
            received_at_ms: now_ms(),
        }))
    }
}

/// Fetches `GET {base}/cpu`.
pub struct CpuFetcher {
    client: reqwest::Client,
    url: String,
}

impl CpuFetcher {
    pub fn new(config: &AcquirerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/cpu", config.base_url),
        }
    }
}

#[async_trait]
impl MetricFetcher for CpuFetcher {
    fn metric(&self) -> MetricKind {
        MetricKind::Cpu
    }

    async fn fetch(&self) -> Result<MetricSample> {
        let wire: CpuWire = get_json(&self.client, &self.url).await?;

        Ok(MetricSample::Cpu(CpuSample {
            usage_percent: wire.usage_percent,
            captured_at: wire.captured_at,
            received_at_ms: now_ms(),
        }))
    }
}
