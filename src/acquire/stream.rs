//! Streaming acquisition with automatic reconnection.
//!
//! A [`StreamAcquirer`] owns one persistent streaming connection and the
//! state machine around it: `Disconnected → Connecting → Connected →
//! Disconnected`, with `Error` reachable on transport failures and on
//! retry exhaustion. Reconnection is driven solely by connection closure;
//! a transport error is surfaced but the close event that follows it is
//! the authoritative trigger, so a single failure never schedules two
//! retries.

use crate::acquire::backoff::ReconnectPolicy;
use crate::acquire::config::AcquirerConfig;
use crate::acquire::events::{AcquirerEvent, FetchFailure, DEFAULT_EVENT_CAPACITY};
use crate::acquire::traits::{StreamConnection, StreamTransport, TransportEvent};
use crate::error::AcquireError;
use crate::model::data::{
    now_ms, ConnectionState, MemoryFrame, MemorySample, MetricKind, MetricSample,
};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

/// Acquires memory samples over a persistent streaming connection,
/// reconnecting with capped exponential backoff on abnormal closure.
pub struct StreamAcquirer {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    url: String,
    policy: ReconnectPolicy,
    transport: Arc<dyn StreamTransport>,
    events: broadcast::Sender<AcquirerEvent>,
    paused: AtomicBool,
    state: Mutex<SessionState>,
}

/// Mutable session bookkeeping, owned exclusively by the acquirer.
struct SessionState {
    connection: ConnectionState,
    attempts: u32,
    manual_disconnect: bool,
    /// True while a transport open is in flight; at most one open runs at
    /// a time.
    opening: bool,
    session: Option<SessionHandle>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct SessionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StreamAcquirer {
    /// Create a streaming acquirer for `<ws_url>/memory`.
    pub fn new(transport: Arc<dyn StreamTransport>, config: &AcquirerConfig) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(StreamInner {
                url: format!("{}/memory", config.ws_url),
                policy: config.reconnect_policy(),
                transport,
                events,
                paused: AtomicBool::new(false),
                state: Mutex::new(SessionState {
                    connection: ConnectionState::Disconnected,
                    attempts: 0,
                    manual_disconnect: false,
                    opening: false,
                    session: None,
                    reconnect_timer: None,
                }),
            }),
        }
    }

    /// Subscribe to the event stream. Every subscriber sees events in
    /// emission order.
    pub fn subscribe(&self) -> broadcast::Receiver<AcquirerEvent> {
        self.inner.events.subscribe()
    }

    /// The current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().await.connection
    }

    /// Suppress or resume consumer-visible sample emission. Pausing keeps
    /// the connection open and does not touch reconnection bookkeeping.
    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Open the stream. No-op when already connected or while another open
    /// is in flight; cancels any pending reconnect timer and clears the
    /// manual-disconnect mark otherwise.
    pub async fn connect(&self) {
        connect_inner(self.inner.clone()).await;
    }

    /// Close the stream and suppress automatic reconnection.
    ///
    /// Resets the attempt counter, cancels a pending reconnect timer,
    /// closes an active connection with the normal-closure code, and leaves
    /// the acquirer Disconnected having emitted exactly one Disconnected
    /// event. Idempotent: calling it again emits nothing.
    pub async fn disconnect(&self) {
        let (session, was_disconnected) = {
            let mut st = self.inner.state.lock().await;
            st.manual_disconnect = true;
            st.attempts = 0;
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            let session = st.session.take();
            let was_disconnected = st.connection == ConnectionState::Disconnected;
            if session.is_none() {
                st.connection = ConnectionState::Disconnected;
            }
            (session, was_disconnected)
        };

        match session {
            // The session task emits the Disconnected event as it winds down.
            Some(handle) => {
                let _ = handle.shutdown.send(true);
                let _ = handle.task.await;
            }
            None if !was_disconnected => {
                let _ = self
                    .inner
                    .events
                    .send(AcquirerEvent::State(ConnectionState::Disconnected));
            }
            None => {}
        }
    }
}

impl Drop for StreamAcquirer {
    fn drop(&mut self) {
        // Best effort: stop background tasks without awaiting them.
        if let Ok(mut st) = self.inner.state.try_lock() {
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(handle) = st.session.take() {
                handle.task.abort();
            }
        }
    }
}

/// Type-erased entry point for the retry timer; connect and schedule call
/// into each other, so the recursive edge must be boxed.
fn connect_boxed(inner: Arc<StreamInner>) -> BoxFuture<'static, ()> {
    Box::pin(connect_inner(inner))
}

async fn connect_inner(inner: Arc<StreamInner>) {
    {
        let mut st = inner.state.lock().await;
        if st.connection == ConnectionState::Connected || st.opening {
            return;
        }
        st.opening = true;
        st.manual_disconnect = false;
        // An externally requested connect supersedes a pending retry. The
        // retry task clears its own handle before calling in here, so this
        // never aborts the currently running task.
        if let Some(timer) = st.reconnect_timer.take() {
            timer.abort();
        }
        st.connection = ConnectionState::Connecting {
            attempt: st.attempts,
        };
        let _ = inner.events.send(AcquirerEvent::State(st.connection));
    }

    match inner.transport.connect(&inner.url).await {
        Ok(mut connection) => {
            let mut st = inner.state.lock().await;
            st.opening = false;
            // disconnect() won the race while the open was in flight; it
            // already left the state Disconnected and emitted the event,
            // so the fresh connection is closed quietly.
            if st.manual_disconnect {
                drop(st);
                connection.close().await;
                return;
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let task = tokio::spawn(run_session(inner.clone(), connection, shutdown_rx));
            st.attempts = 0;
            st.connection = ConnectionState::Connected;
            st.session = Some(SessionHandle {
                shutdown: shutdown_tx,
                task,
            });
            let _ = inner
                .events
                .send(AcquirerEvent::State(ConnectionState::Connected));
        }
        Err(error) => {
            debug!(url = %inner.url, %error, "stream open failed");
            let manual = {
                let mut st = inner.state.lock().await;
                st.opening = false;
                st.connection = ConnectionState::Disconnected;
                st.manual_disconnect
            };
            let _ = inner
                .events
                .send(AcquirerEvent::State(ConnectionState::Disconnected));
            if !manual {
                schedule_reconnect(inner).await;
            }
        }
    }
}

/// Drive one open connection until it closes or shutdown is requested.
async fn run_session(
    inner: Arc<StreamInner>,
    mut connection: Box<dyn StreamConnection>,
    mut shutdown: watch::Receiver<bool>,
) {
    let close_code = loop {
        tokio::select! {
            _ = shutdown.changed() => {
                connection.close().await;
                break crate::NORMAL_CLOSE_CODE;
            }
            event = connection.next_event() => match event {
                TransportEvent::Message(text) => handle_frame(&inner, &text),
                TransportEvent::Error(message) => {
                    // Surfaced as a state transition only; the close event
                    // that follows drives reconnection.
                    let state = {
                        let mut st = inner.state.lock().await;
                        st.connection = ConnectionState::Error {
                            attempt: st.attempts,
                        };
                        st.connection
                    };
                    warn!(%message, "stream transport error");
                    let _ = inner.events.send(AcquirerEvent::State(state));
                }
                TransportEvent::Closed { code } => break code,
            }
        }
    };

    let manual = {
        let mut st = inner.state.lock().await;
        st.session = None;
        st.connection = ConnectionState::Disconnected;
        st.manual_disconnect
    };
    let _ = inner
        .events
        .send(AcquirerEvent::State(ConnectionState::Disconnected));

    if !manual && close_code != crate::NORMAL_CLOSE_CODE {
        debug!(close_code, "abnormal closure, scheduling reconnect");
        schedule_reconnect(inner).await;
    }
}

/// Decode one inbound frame and emit the matching event. Decode failures
/// and server error frames never alter connection state.
fn handle_frame(inner: &Arc<StreamInner>, text: &str) {
    match serde_json::from_str::<MemoryFrame>(text) {
        Ok(MemoryFrame::Welcome { server_time }) => {
            debug!(?server_time, "stream welcome");
        }
        Ok(MemoryFrame::Data {
            usage_percent,
            used_mb,
            total_mb,
            captured_at,
        }) => {
            if inner.paused.load(Ordering::SeqCst) {
                return;
            }
            let sample = MetricSample::Memory(MemorySample {
                usage_percent,
                used_mb,
                total_mb,
                captured_at: captured_at.unwrap_or_default(),
                received_at_ms: now_ms(),
            });
            let _ = inner.events.send(AcquirerEvent::Sample(sample));
        }
        Ok(MemoryFrame::Error { message }) => {
            let message = message.unwrap_or_else(|| "server error".to_string());
            let _ = inner
                .events
                .send(AcquirerEvent::FetchFailed(FetchFailure::server(
                    MetricKind::Memory,
                    message,
                )));
        }
        Err(error) => {
            let _ = inner
                .events
                .send(AcquirerEvent::FetchFailed(FetchFailure::decode(
                    MetricKind::Memory,
                    error.to_string(),
                )));
        }
    }
}

/// Schedule the next reconnect attempt, or give up when the counter is
/// exhausted. At most one reconnect timer exists at a time.
async fn schedule_reconnect(inner: Arc<StreamInner>) {
    let mut st = inner.state.lock().await;
    if st.manual_disconnect {
        return;
    }

    if inner.policy.exhausted(st.attempts) {
        let exhausted = AcquireError::ReconnectExhausted(st.attempts);
        warn!(url = %inner.url, "{exhausted}");
        st.connection = ConnectionState::Error {
            attempt: st.attempts,
        };
        let _ = inner.events.send(AcquirerEvent::State(st.connection));
        return;
    }

    st.attempts += 1;
    let attempt = st.attempts;
    let delay = inner.policy.delay_for(attempt);
    st.connection = ConnectionState::Connecting { attempt };
    let _ = inner.events.send(AcquirerEvent::State(st.connection));
    debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");

    if let Some(previous) = st.reconnect_timer.take() {
        previous.abort();
    }
    let timer_inner = inner.clone();
    st.reconnect_timer = Some(tokio::spawn(async move {
        time::sleep(delay).await;
        // Clear our own handle first so connect does not abort this task.
        timer_inner.state.lock().await.reconnect_timer = None;
        connect_boxed(timer_inner).await;
    }));
}
