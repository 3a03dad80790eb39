//! Fixed-cadence polling with a debounced manual trigger.

use crate::acquire::config::{AcquirerConfig, POLL_INTERVAL_BOUNDS};
use crate::acquire::events::{AcquirerEvent, FetchFailure, DEFAULT_EVENT_CAPACITY};
use crate::acquire::traits::MetricFetcher;
use crate::error::{AcquireError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

/// Outcome of a manual trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A fetch cycle was started.
    Accepted,
    /// Rejected: either inside the debounce window of the previous accepted
    /// trigger, or a manual fetch is still outstanding. Not an error;
    /// try again later.
    TooSoon,
}

/// Issues one-shot fetches on a fixed cadence and emits one event per cycle.
///
/// `start` fetches immediately, then every interval until `stop`. Scheduled
/// ticks spawn independent cycles, so a slow fetch never delays the cadence;
/// only the manual trigger path is serialized (and debounced).
pub struct PollingAcquirer {
    inner: Arc<PollInner>,
}

struct PollInner {
    fetcher: Arc<dyn MetricFetcher>,
    debounce: Duration,
    events: broadcast::Sender<AcquirerEvent>,
    schedule: Mutex<Option<JoinHandle<()>>>,
    last_trigger: Mutex<Option<Instant>>,
    manual_busy: AtomicBool,
}

impl PollingAcquirer {
    /// Create a polling acquirer over the given fetcher.
    pub fn new(fetcher: Arc<dyn MetricFetcher>, config: &AcquirerConfig) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(PollInner {
                fetcher,
                debounce: config.debounce(),
                events,
                schedule: Mutex::new(None),
                last_trigger: Mutex::new(None),
                manual_busy: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to the event stream. Every subscriber sees events in
    /// emission order.
    pub fn subscribe(&self) -> broadcast::Receiver<AcquirerEvent> {
        self.inner.events.subscribe()
    }

    /// Begin polling: one fetch immediately, then every `interval_secs`.
    ///
    /// If a schedule is already running it is cancelled first, so this also
    /// serves as the atomic interval change; at most one scheduling task
    /// exists at a time.
    pub fn start(&self, interval_secs: u64) -> Result<()> {
        let (min, max) = POLL_INTERVAL_BOUNDS;
        if !(min..=max).contains(&interval_secs) {
            return Err(AcquireError::config_error(format!(
                "poll interval must be within [{min}, {max}] seconds, got {interval_secs}"
            )));
        }

        // The old schedule is aborted before the replacement is spawned so
        // no tick from it can land in between; the lock is held across the
        // spawn to keep concurrent restarts from interleaving.
        let mut schedule = self.inner.schedule.lock().unwrap();
        if let Some(previous) = schedule.take() {
            previous.abort();
        }
        let inner = self.inner.clone();
        *schedule = Some(tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                // Each cycle runs detached so the cadence holds even when a
                // fetch is slow; latest-wins at the sink.
                tokio::spawn(run_cycle(inner.clone()));
            }
        }));
        debug!(
            metric = %self.inner.fetcher.metric(),
            interval_secs,
            "polling started"
        );
        Ok(())
    }

    /// Change the polling interval: stop the current schedule, apply, restart.
    pub fn set_interval(&self, interval_secs: u64) -> Result<()> {
        self.start(interval_secs)
    }

    /// Stop polling. Idempotent; cancels exactly one pending schedule and
    /// emits nothing.
    pub fn stop(&self) {
        if let Some(task) = self.inner.schedule.lock().unwrap().take() {
            task.abort();
            debug!(metric = %self.inner.fetcher.metric(), "polling stopped");
        }
    }

    /// Request an immediate fetch.
    ///
    /// Debounced against the previous accepted trigger and against an
    /// outstanding manual fetch; rejections are silent apart from the
    /// returned outcome.
    pub fn trigger_now(&self) -> TriggerOutcome {
        let now = Instant::now();
        {
            let mut last = self.inner.last_trigger.lock().unwrap();
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.inner.debounce {
                    return TriggerOutcome::TooSoon;
                }
            }
            if self.inner.manual_busy.swap(true, Ordering::SeqCst) {
                return TriggerOutcome::TooSoon;
            }
            *last = Some(now);
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            run_cycle(inner.clone()).await;
            inner.manual_busy.store(false, Ordering::SeqCst);
        });
        TriggerOutcome::Accepted
    }
}

impl Drop for PollingAcquirer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One fetch cycle: exactly one Sample or one FetchFailed event.
async fn run_cycle(inner: Arc<PollInner>) {
    match inner.fetcher.fetch().await {
        Ok(sample) => {
            let _ = inner.events.send(AcquirerEvent::Sample(sample));
        }
        Err(error) => {
            let failure = FetchFailure::from_error(inner.fetcher.metric(), &error);
            debug!(metric = %failure.metric, kind = %failure.kind, "fetch failed");
            let _ = inner.events.send(AcquirerEvent::FetchFailed(failure));
        }
    }
}
