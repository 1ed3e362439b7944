//! tempocast – run a simulated tempo service or validate a config file.
//
//  $ tempocast run --config tempocast.toml --subscribers 2 --duration-secs 5
//  $ tempocast check-config --config tempocast.toml
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tempocast::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use tempocast::core::clock::{Clock, MonotonicClock};
use tempocast::core::subscriber::Subscription;
use tempocast::core::tempo::TempoUpdate;
use tempocast::logging::init_logging;
use tempocast::{load_config, metrics, Config, OverflowPolicy, TempoService};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "tempocast", version, about = "Paced tempo broadcaster")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the service against a simulated clap detector.
    Run {
        /// Path to config TOML (env TEMPOCAST_CONFIG overrides)
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Number of simulated subscribers to attach.
        #[arg(short, long, default_value_t = 2)]
        subscribers: usize,
        /// Base tempo of the simulated detector.
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,
        /// Milliseconds between simulated tempo readings.
        #[arg(long, default_value_t = 50)]
        producer_interval_ms: u64,
        /// Stop after this many seconds (Ctrl+C stops earlier).
        #[arg(short, long, default_value_t = 5)]
        duration_secs: u64,
        /// Override `queue.overflow_policy` (drop_newest | drop_oldest).
        #[arg(long)]
        overflow_policy: Option<OverflowPolicy>,
    },
    /// Parse and validate a config file, then print the effective values.
    CheckConfig {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to install log subscriber")?;
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run {
            config,
            subscribers,
            bpm,
            producer_interval_ms,
            duration_secs,
            overflow_policy,
        } => {
            let mut cfg = load_config(resolve_config_path(config))?;
            if let Some(policy) = overflow_policy {
                cfg.queue.overflow_policy = policy;
            }
            run(
                cfg,
                subscribers,
                bpm,
                Duration::from_millis(producer_interval_ms.max(1)),
                Duration::from_secs(duration_secs),
            )
            .await?;
        }
        Command::CheckConfig { config } => {
            let path = resolve_config_path(config);
            let cfg = load_config(&path)?;
            println!("{path}: ok");
            println!("{cfg:#?}");
        }
    }
    Ok(())
}

fn resolve_config_path(cli_value: String) -> String {
    std::env::var(CONFIG_ENV).unwrap_or(cli_value)
}

async fn run(
    cfg: Config,
    subscribers: usize,
    bpm: f32,
    producer_interval: Duration,
    duration: Duration,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let service = Arc::new(TempoService::start(&cfg, clock)?);

    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(subscribers);
    for _ in 0..subscribers {
        match service.connect() {
            Ok(subscription) => readers.push(tokio::spawn(read_updates(subscription))),
            Err(e) => warn!(error = %e, "could not attach simulated subscriber"),
        }
    }

    let producer = tokio::spawn(simulate_detector(
        Arc::clone(&service),
        bpm,
        producer_interval,
    ));

    tokio::select! {
        _ = tokio::time::sleep(duration) => info!("simulation finished"),
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
    }

    producer.abort();
    let _ = producer.await;
    let stats = service.stats();
    service.shutdown().await?;
    // dropping the service closes every subscriber channel
    drop(service);
    for reader in readers {
        let _ = reader.await;
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    print!("{}", metrics::snapshot());
    Ok(())
}

/// Produces a reading every `interval`: the tempo wobbles while "detecting"
/// and settles on `bpm` every fifth reading.
async fn simulate_detector(service: Arc<TempoService>, bpm: f32, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let mut n: u32 = 0;
    loop {
        ticker.tick().await;
        let wobble = (n % 5) as f32 - 2.0;
        let update = TempoUpdate::new(bpm + wobble * 0.5, wobble == 0.0);
        if let Err(e) = service.publish_tempo(update) {
            warn!(error = %e, "failed to encode tempo reading");
        }
        n = n.wrapping_add(1);
    }
}

async fn read_updates(subscription: Subscription) {
    while let Ok(message) = subscription.recv().await {
        match TempoUpdate::from_payload(&message.payload) {
            Ok(update) => info!(
                subscriber_id = %subscription.id(),
                bpm = update.bpm,
                stable = update.stable,
                emitted_at_ms = message.timestamp(),
                latency_ms = message.queue_latency_ms().unwrap_or(0),
                "tempo update"
            ),
            Err(e) => warn!(subscriber_id = %subscription.id(), error = %e, "undecodable payload"),
        }
    }
}
