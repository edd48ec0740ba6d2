//! relay demo binary
//!
//! Usage:
//!   relay-cli --messages 10 --flaky-failures 3
//!   RELAY_POLL_INTERVAL_MS=500 relay-cli

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_core::app::{AppBuilder, RawRelayConfig, RelayConfig};
use relay_core::app::config::{ENV_BATCH_LIMIT, ENV_POLL_INTERVAL_MS, ENV_TOPIC, ENV_WORKERS};
use relay_core::impls::{InMemoryBroker, InMemoryKeeper};

#[derive(Parser, Debug)]
#[command(name = "relay-cli")]
#[command(about = "Outbox relay demo over in-memory collaborators")]
#[command(version)]
struct Args {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Poll interval in milliseconds
    #[arg(long, env = ENV_POLL_INTERVAL_MS)]
    poll_interval_ms: Option<String>,

    /// Max unprocessed messages fetched per cycle
    #[arg(long, env = ENV_BATCH_LIMIT)]
    batch_limit: Option<String>,

    /// Number of publish workers
    #[arg(long, env = ENV_WORKERS)]
    workers: Option<String>,

    /// Broker topic
    #[arg(long, env = ENV_TOPIC)]
    topic: Option<String>,

    /// Number of demo messages to submit
    #[arg(short, long, default_value_t = 5)]
    messages: usize,

    /// Fail this many broker publishes before accepting
    #[arg(long, default_value_t = 2)]
    flaky_failures: u32,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig::from_raw(&RawRelayConfig {
            poll_interval_ms: self.poll_interval_ms.clone(),
            batch_limit: self.batch_limit.clone(),
            workers: self.workers.clone(),
            topic: self.topic.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    // (A) in-memory の durable store と broker を用意
    let keeper = Arc::new(InMemoryKeeper::new());
    let broker = Arc::new(InMemoryBroker::flaky(args.flaky_failures));
    let config = args.relay_config();
    info!(?config, "starting relay demo");

    // (B) ワイヤリング（store に ping が通らなければここで失敗）
    let mut app = AppBuilder::new()
        .keeper(keeper)
        .broker(broker.clone())
        .config(config)
        .build()
        .await
        .context("failed to build relay app")?;
    app.start();

    // (C) メッセージ投入
    for i in 1..=args.messages {
        let id = app
            .service
            .add_message(format!("demo message #{i}"))
            .await
            .context("failed to add message")?;
        info!(message_id = %id, "submitted");
    }

    // (D) 全件 processed になるまでポーリング（Ctrl-C / timeout でも抜ける）
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let wait = async {
        while app.counts().unprocessed > 0 && app.is_running() {
            if Instant::now() >= deadline {
                warn!(counts = ?app.counts(), "timed out waiting for relay");
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
    };
    tokio::select! {
        _ = wait => {}
        _ = tokio::signal::ctrl_c() => info!("received shutdown signal"),
    }

    // (E) graceful shutdown（scheduler → worker pool → store の順）
    let counts = app.counts();
    let publishes = broker.published_count();
    app.shutdown().await.context("relay loop failed")?;

    println!("{}", serde_json::to_string_pretty(&counts)?);
    info!(publishes, "relay demo finished");
    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("invalid log level: {log_level}"))?;
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}
