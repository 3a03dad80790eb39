use async_trait::async_trait;
use hostpulse::{
    AcquireError, AcquirerConfig, AcquirerEvent, ConnectionState, CpuSample, FailureKind,
    MetricFetcher, MetricKind, MetricSample, PollingAcquirer, StreamAcquirer, StreamConnection,
    StreamTransport, TransportEvent, TriggerOutcome,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time;

fn cpu_sample(usage: f64) -> MetricSample {
    MetricSample::Cpu(CpuSample {
        usage_percent: usage,
        captured_at: "2024-01-01T00:00:00Z".to_string(),
        received_at_ms: 0,
    })
}

/// Fetcher that replays a script of outcomes, then keeps returning a
/// default sample.
struct ScriptedFetcher {
    outcomes: Mutex<VecDeque<Result<MetricSample, AcquireError>>>,
}

impl ScriptedFetcher {
    fn new(outcomes: Vec<Result<MetricSample, AcquireError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
        })
    }
}

#[async_trait]
impl MetricFetcher for ScriptedFetcher {
    fn metric(&self) -> MetricKind {
        MetricKind::Cpu
    }

    async fn fetch(&self) -> hostpulse::Result<MetricSample> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(cpu_sample(10.0)))
    }
}

/// One scripted connection attempt.
enum ConnectOutcome {
    Fail(String),
    Session(Vec<TransportEvent>),
}

/// Transport that replays a script of connection outcomes; once the script
/// is exhausted every further attempt fails.
struct ScriptedTransport {
    scripts: Mutex<VecDeque<ConnectOutcome>>,
}

impl ScriptedTransport {
    fn new(scripts: Vec<ConnectOutcome>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self, _url: &str) -> hostpulse::Result<Box<dyn StreamConnection>> {
        match self.scripts.lock().unwrap().pop_front() {
            Some(ConnectOutcome::Session(events)) => Ok(Box::new(ScriptedConnection {
                events: events.into(),
            })),
            Some(ConnectOutcome::Fail(message)) => Err(AcquireError::transport_error(message)),
            None => Err(AcquireError::transport_error("connection refused")),
        }
    }
}

/// Transport whose opens park until the gate is released, counting every
/// attempt. Each released open yields an idle session.
struct GatedTransport {
    gate: Arc<Notify>,
    opens: AtomicU32,
}

impl GatedTransport {
    fn new() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(Self {
            gate: gate.clone(),
            opens: AtomicU32::new(0),
        });
        (transport, gate)
    }
}

#[async_trait]
impl StreamTransport for GatedTransport {
    async fn connect(&self, _url: &str) -> hostpulse::Result<Box<dyn StreamConnection>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(Box::new(ScriptedConnection {
            events: VecDeque::new(),
        }))
    }
}

/// Connection that yields its scripted events, then stays open and idle.
struct ScriptedConnection {
    events: VecDeque<TransportEvent>,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn next_event(&mut self) -> TransportEvent {
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

fn data_frame(usage: f64) -> TransportEvent {
    TransportEvent::Message(format!(
        r#"{{"type":"data","usagePercent":{usage},"usedMB":4096,"totalMB":8192,"capturedAt":"2024-01-01T00:00:00Z"}}"#
    ))
}

async fn next_event(rx: &mut broadcast::Receiver<AcquirerEvent>) -> AcquirerEvent {
    time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut broadcast::Receiver<AcquirerEvent>) {
    let outcome = time::timeout(Duration::from_secs(120), rx.recv()).await;
    assert!(outcome.is_err(), "expected silence, got {outcome:?}");
}

// ---------------------------------------------------------------------------
// PollingAcquirer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_debounce() {
    let config = AcquirerConfig::default();
    let acquirer = PollingAcquirer::new(ScriptedFetcher::new(vec![]), &config);
    let mut events = acquirer.subscribe();

    // Two triggers inside the window: exactly one accepted, one rejected.
    assert_eq!(acquirer.trigger_now(), TriggerOutcome::Accepted);
    assert_eq!(acquirer.trigger_now(), TriggerOutcome::TooSoon);

    match next_event(&mut events).await {
        AcquirerEvent::Sample(sample) => assert_eq!(sample.kind(), MetricKind::Cpu),
        other => panic!("expected sample, got {other:?}"),
    }

    // Past the window the trigger is accepted again.
    time::advance(Duration::from_millis(1001)).await;
    assert_eq!(acquirer.trigger_now(), TriggerOutcome::Accepted);
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::Sample(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_polling_emits_on_cadence() {
    let config = AcquirerConfig::default();
    let acquirer = PollingAcquirer::new(ScriptedFetcher::new(vec![]), &config);
    let mut events = acquirer.subscribe();

    acquirer.start(1).expect("valid interval");

    // First fetch is immediate, the rest follow the cadence.
    for _ in 0..3 {
        assert!(matches!(
            next_event(&mut events).await,
            AcquirerEvent::Sample(_)
        ));
    }
    acquirer.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_silent() {
    let config = AcquirerConfig::default();
    let acquirer = PollingAcquirer::new(ScriptedFetcher::new(vec![]), &config);
    let mut events = acquirer.subscribe();

    acquirer.start(1).expect("valid interval");
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::Sample(_)
    ));

    acquirer.stop();
    acquirer.stop();

    assert_no_event(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_is_atomic() {
    let config = AcquirerConfig::default();
    let acquirer = PollingAcquirer::new(ScriptedFetcher::new(vec![]), &config);
    let mut events = acquirer.subscribe();

    acquirer.start(60).expect("valid interval");
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::Sample(_)
    ));

    // Restart twice back to back. Each restart retires the old schedule
    // before its replacement exists, so only the last cadence survives:
    // after draining the immediate fetch, exactly one sample arrives per
    // second.
    acquirer.set_interval(30).expect("valid interval");
    acquirer.set_interval(1).expect("valid interval");
    for _ in 0..5 {
        assert!(matches!(
            next_event(&mut events).await,
            AcquirerEvent::Sample(_)
        ));
    }
    acquirer.stop();
    assert_no_event(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_fetch_error_classification_preserved() {
    let config = AcquirerConfig::default();
    let fetcher = ScriptedFetcher::new(vec![
        Err(AcquireError::status_error(503, "Simulated CPU endpoint failure")),
        Err(AcquireError::decode_error("missing field `usagePercent`")),
        Err(AcquireError::transport_error("connection refused")),
    ]);
    let acquirer = PollingAcquirer::new(fetcher, &config);
    let mut events = acquirer.subscribe();

    acquirer.start(1).expect("valid interval");

    let mut kinds = Vec::new();
    for _ in 0..3 {
        match next_event(&mut events).await {
            AcquirerEvent::FetchFailed(failure) => {
                assert_eq!(failure.metric, MetricKind::Cpu);
                kinds.push(failure.kind);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
    assert_eq!(
        kinds,
        vec![
            FailureKind::Status { code: 503 },
            FailureKind::Decode,
            FailureKind::Transport,
        ]
    );

    // Failures never alter the schedule; the next cycle succeeds.
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::Sample(_)
    ));
    acquirer.stop();
}

#[tokio::test]
async fn test_out_of_bounds_interval_rejected() {
    let config = AcquirerConfig::default();
    let acquirer = PollingAcquirer::new(ScriptedFetcher::new(vec![]), &config);
    assert!(acquirer.start(0).is_err());
    assert!(acquirer.start(61).is_err());
}

// ---------------------------------------------------------------------------
// StreamAcquirer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_stream_happy_path() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![
        TransportEvent::Message(r#"{"type":"welcome","serverTime":"2024-01-01T00:00:00Z"}"#.into()),
        data_frame(55.0),
    ])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;

    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { attempt: 0 })
    );
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );
    // The welcome frame is not consumer-visible; the data frame is.
    match next_event(&mut events).await {
        AcquirerEvent::Sample(MetricSample::Memory(sample)) => {
            assert_eq!(sample.usage_percent, 55.0);
            assert_eq!(sample.used_mb, 4096);
        }
        other => panic!("expected memory sample, got {other:?}"),
    }
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_pause_suppresses_samples_not_connection() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![
        data_frame(55.0),
        TransportEvent::Message(r#"{"type":"error","message":"Simulated send error"}"#.into()),
    ])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.set_paused(true);
    acquirer.connect().await;

    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { .. })
    ));
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );
    // The data frame preceding the error frame was suppressed; the error
    // frame still comes through, so ordering proves the suppression.
    match next_event(&mut events).await {
        AcquirerEvent::FetchFailed(failure) => {
            assert_eq!(failure.kind, FailureKind::Server);
            assert_eq!(failure.metric, MetricKind::Memory);
        }
        other => panic!("expected server failure, got {other:?}"),
    }
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
    assert!(acquirer.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_decode_error_does_not_alter_connection_state() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![
        TransportEvent::Message("not json".into()),
        data_frame(42.0),
    ])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;

    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { .. })
    ));
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );
    match next_event(&mut events).await {
        AcquirerEvent::FetchFailed(failure) => assert_eq!(failure.kind, FailureKind::Decode),
        other => panic!("expected decode failure, got {other:?}"),
    }
    // The connection survived and keeps producing samples.
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::Sample(_)
    ));
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_until_exhausted() {
    // One good session that closes abnormally, then every reconnect fails.
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![
        data_frame(55.0),
        TransportEvent::Closed { code: 1006 },
    ])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;

    let mut samples = Vec::new();
    let mut connecting_attempts = Vec::new();
    let terminal = loop {
        match next_event(&mut events).await {
            AcquirerEvent::Sample(sample) => samples.push(sample),
            AcquirerEvent::State(ConnectionState::Connecting { attempt }) => {
                connecting_attempts.push(attempt)
            }
            AcquirerEvent::State(state @ ConnectionState::Error { .. }) => break state,
            _ => {}
        }
    };

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].value(), 55.0);
    for attempt in 1..=5 {
        assert!(
            connecting_attempts.contains(&attempt),
            "missing reconnect attempt {attempt} in {connecting_attempts:?}"
        );
    }
    assert_eq!(terminal, ConnectionState::Error { attempt: 5 });

    // Terminal: no further timers until connect() is called externally.
    assert_no_event(&mut events).await;
    assert_eq!(
        acquirer.connection_state().await,
        ConnectionState::Error { attempt: 5 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_counter_resets_after_successful_open() {
    // The backend force-closes with code 4000; two such sessions, then one
    // that stays open.
    let transport = ScriptedTransport::new(vec![
        ConnectOutcome::Session(vec![TransportEvent::Closed { code: 4000 }]),
        ConnectOutcome::Session(vec![TransportEvent::Closed { code: 4000 }]),
        ConnectOutcome::Session(vec![]),
    ]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;

    let mut connected = 0;
    let mut attempts = Vec::new();
    while connected < 3 {
        match next_event(&mut events).await {
            AcquirerEvent::State(ConnectionState::Connected) => connected += 1,
            AcquirerEvent::State(ConnectionState::Connecting { attempt }) => {
                attempts.push(attempt)
            }
            _ => {}
        }
    }

    // Each successful open resets the counter, so no retry ever numbers
    // beyond 1.
    assert!(attempts.iter().all(|&a| a <= 1), "attempts: {attempts:?}");
    assert!(attempts.contains(&1));
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect_timer() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Fail("refused".into())]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;

    // Failed open: Connecting(0), Disconnected, Connecting(1) scheduled.
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { attempt: 0 })
    );
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Disconnected)
    );
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { attempt: 1 })
    );

    acquirer.disconnect().await;
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Disconnected)
    );

    // The timer was cancelled: no Connecting or Connected for the old
    // session, ever.
    assert_no_event(&mut events).await;
    assert_eq!(
        acquirer.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connected_emits_exactly_one_disconnected() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { .. })
    ));
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );

    acquirer.disconnect().await;
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Disconnected)
    );

    // Idempotent: a second disconnect emits nothing, and no reconnection
    // follows a manual close.
    acquirer.disconnect().await;
    assert_no_event(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_noop_when_connected() {
    let transport = ScriptedTransport::new(vec![ConnectOutcome::Session(vec![])]);
    let config = AcquirerConfig::default();
    let acquirer = StreamAcquirer::new(transport, &config);
    let mut events = acquirer.subscribe();

    acquirer.connect().await;
    assert!(matches!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { .. })
    ));
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );

    acquirer.connect().await;
    assert_no_event(&mut events).await;
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_wins_over_inflight_open() {
    let (transport, gate) = GatedTransport::new();
    let config = AcquirerConfig::default();
    let acquirer = Arc::new(StreamAcquirer::new(transport, &config));
    let mut events = acquirer.subscribe();

    let opener = tokio::spawn({
        let acquirer = acquirer.clone();
        async move { acquirer.connect().await }
    });
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { attempt: 0 })
    );

    // Terminate while the open is still parked inside the transport.
    acquirer.disconnect().await;
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Disconnected)
    );

    // Releasing the open must not resurrect the session: no Connected, no
    // state change, the fresh connection is discarded.
    gate.notify_one();
    opener.await.expect("connect task panicked");
    assert_no_event(&mut events).await;
    assert_eq!(
        acquirer.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connect_opens_one_session() {
    let (transport, gate) = GatedTransport::new();
    let config = AcquirerConfig::default();
    let acquirer = Arc::new(StreamAcquirer::new(transport.clone(), &config));
    let mut events = acquirer.subscribe();

    let opener = tokio::spawn({
        let acquirer = acquirer.clone();
        async move { acquirer.connect().await }
    });
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connecting { attempt: 0 })
    );

    // A second connect while the first open is in flight is a silent no-op.
    acquirer.connect().await;

    gate.notify_one();
    opener.await.expect("connect task panicked");
    assert_eq!(
        next_event(&mut events).await,
        AcquirerEvent::State(ConnectionState::Connected)
    );
    assert_no_event(&mut events).await;
    assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    assert_eq!(acquirer.connection_state().await, ConnectionState::Connected);
}
