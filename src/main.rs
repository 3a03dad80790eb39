//! hostpulse - Host-Metrics Acquisition Binary
//!
//! A standalone event sink over the acquisition core: watches all three
//! metric streams and logs samples, failures, and connection transitions.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hostpulse::{
    AcquirerConfig, AcquirerEvent, CpuFetcher, MetricFetcher, MetricKind, MetricSample,
    PingFetcher, PollingAcquirer, RollingAggregator, SampleHistory, StreamAcquirer, WsTransport,
    DEFAULT_POLL_INTERVAL_SECS,
};
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(about = "hostpulse - live host metrics over HTTP polling and streaming")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Base URL for the REST endpoints
    #[arg(long, default_value = "http://localhost:8000/api")]
    base_url: String,

    /// Base URL for the streaming endpoints
    #[arg(long, default_value = "ws://localhost:8000/ws")]
    ws_url: String,

    /// Polling interval in seconds (1-60)
    #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch all metric streams until interrupted (default)
    Watch(WatchArgs),

    /// Fetch one ping and one CPU reading and exit
    Snapshot(SnapshotArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Rolling-average window size
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Sample history capacity
    #[arg(long, default_value_t = 20)]
    history: usize,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = AcquirerConfig::new(&cli.base_url, &cli.ws_url)
        .with_poll_interval_secs(cli.interval);
    config.validate().context("invalid configuration")?;

    match &cli.command {
        Some(Commands::Watch(args)) => watch_command(&config, args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(&config, args).await?,
        None => {
            let args = WatchArgs {
                window: 5,
                history: 20,
            };
            watch_command(&config, &args).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn watch_command(config: &AcquirerConfig, args: &WatchArgs) -> anyhow::Result<()> {
    info!("Starting hostpulse watch...");
    info!("  - REST base: {}", config.base_url);
    info!("  - Stream base: {}", config.ws_url);
    info!("  - Polling interval: {}s", config.poll_interval_secs);

    let ping = PollingAcquirer::new(Arc::new(PingFetcher::new(config)), config);
    let cpu = PollingAcquirer::new(Arc::new(CpuFetcher::new(config)), config);
    let memory = StreamAcquirer::new(Arc::new(WsTransport), config);

    let mut events = BroadcastStream::new(ping.subscribe())
        .merge(BroadcastStream::new(cpu.subscribe()))
        .merge(BroadcastStream::new(memory.subscribe()));

    ping.start(config.poll_interval_secs)?;
    cpu.start(config.poll_interval_secs)?;
    memory.connect().await;

    let mut aggregator = RollingAggregator::new(args.window);
    let mut history = SampleHistory::new(args.history);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            Some(event) = events.next() => handle_event(event, &mut aggregator, &mut history),
            else => break,
        }
    }

    ping.stop();
    cpu.stop();
    memory.disconnect().await;
    print_summary(&history, &aggregator);

    Ok(())
}

fn handle_event(
    event: Result<AcquirerEvent, BroadcastStreamRecvError>,
    aggregator: &mut RollingAggregator,
    history: &mut SampleHistory,
) {
    let event = match event {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "event sink lagged behind");
            return;
        }
    };

    match event {
        AcquirerEvent::Sample(sample) => {
            aggregator.observe(&sample);
            let kind = sample.kind();
            println!(
                "[{}] {:<6} {:>8.1}  (avg {:.1})",
                format_received(&sample),
                kind.to_string(),
                sample.value(),
                aggregator.average(kind),
            );
            history.push(sample);
        }
        AcquirerEvent::FetchFailed(failure) => {
            warn!("{failure}");
        }
        AcquirerEvent::State(state) => {
            info!("memory stream: {state}");
        }
    }
}

fn format_received(sample: &MetricSample) -> String {
    chrono::DateTime::from_timestamp_millis(sample.received_at_ms() as i64)
        .unwrap_or_default()
        .format("%H:%M:%S")
        .to_string()
}

fn print_summary(history: &SampleHistory, aggregator: &RollingAggregator) {
    println!();
    println!("Session summary ({} samples kept)", history.len());
    for kind in [MetricKind::Ping, MetricKind::Cpu, MetricKind::Memory] {
        let count = history.iter().filter(|s| s.kind() == kind).count();
        println!(
            "  {:<6} {} samples, rolling avg {:.1}",
            kind.to_string(),
            count,
            aggregator.average(kind)
        );
    }
}

async fn snapshot_command(config: &AcquirerConfig, args: &SnapshotArgs) -> anyhow::Result<()> {
    let ping = PingFetcher::new(config);
    let cpu = CpuFetcher::new(config);

    let ping_sample = ping.fetch().await?;
    let cpu_sample = cpu.fetch().await?;

    match args.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&vec![&ping_sample, &cpu_sample])?;
            println!("{json}");
        }
        "pretty" => {
            print_pretty_sample(&ping_sample);
            print_pretty_sample(&cpu_sample);
        }
        other => {
            anyhow::bail!("Unsupported format: {other}. Use 'json' or 'pretty'");
        }
    }

    Ok(())
}

fn print_pretty_sample(sample: &MetricSample) {
    match sample {
        MetricSample::Ping(s) => {
            println!("Ping:");
            println!("  Status: {}", s.status);
            println!("  Latency: {} ms", s.latency_ms);
            println!("  Server time: {}", s.server_time);
        }
        MetricSample::Cpu(s) => {
            println!("CPU:");
            println!("  Usage: {:.1}%", s.usage_percent);
            println!("  Captured at: {}", s.captured_at);
        }
        MetricSample::Memory(s) => {
            println!("Memory:");
            println!("  Usage: {:.1}%", s.usage_percent);
            println!("  Used: {} MB of {} MB", s.used_mb, s.total_mb);
        }
    }
}
