//! GXC Feed
//!
//! Command-line entry point for the explorer realtime feed.
//! - `watch` follows a live explorer and prints what the dashboard would show
//! - `serve` runs the development feed server, publishing frames read from stdin

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feed_client::{
    FeedStatus, HttpSnapshotSource, Payload, RealtimeFeed, RecencyView, WsConnector,
};
use feed_server::{FeedServer, FeedServerConfig};
use feed_types::{keys, PushFrame};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{WatchArgs, WatchConfig};

/// GXC explorer realtime feed
#[derive(Parser, Debug)]
#[command(name = "gxc-feed")]
#[command(about = "Realtime block, transaction and stats feed for the GXC explorer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a live feed and print the recent blocks and transactions
    Watch(WatchArgs),
    /// Run the development feed server
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP stats bind address
    #[arg(long, default_value = "127.0.0.1:3000")]
    http_addr: String,

    /// WebSocket bind address
    #[arg(long, default_value = "127.0.0.1:3001")]
    ws_addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Watch(args) => run_watch(args).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

/// Follow a feed until Ctrl+C
async fn run_watch(args: WatchArgs) -> Result<()> {
    let config = WatchConfig::resolve(&args)?;

    tracing::info!("Starting GXC feed watcher");
    tracing::info!("  Push: {}", config.ws_url.as_deref().unwrap_or("(none)"));
    tracing::info!("  Stats: {}", config.stats_url.as_deref().unwrap_or("(none)"));
    tracing::info!("  Poll interval: {}ms", config.feed.poll_interval_ms);

    let view = Arc::new(Mutex::new(RecencyView::new()));

    let mut builder = RealtimeFeed::builder().config(config.feed.clone());
    if let Some(url) = &config.ws_url {
        builder = builder.push(WsConnector::new(url.clone()));
    }
    if let Some(url) = &config.stats_url {
        builder = builder.pull(HttpSnapshotSource::new(url.clone())?);
    }

    let blocks = view.clone();
    let transactions = view.clone();
    let stats = view.clone();
    let feed = builder
        .on_block(move |block| {
            let mut view = blocks.lock();
            if view.apply_block(block) {
                print_block(block);
                print_block_view(&view);
            }
            Ok(())
        })
        .on_transaction(move |tx| {
            let mut view = transactions.lock();
            if view.apply_transaction(tx) {
                print_transaction(tx);
            }
            Ok(())
        })
        .on_address_update(|update| {
            if let Some(address) = keys::address(update) {
                println!("{} address {} updated", timestamp(), address);
            }
            Ok(())
        })
        .on_stats_update(move |snapshot| {
            if stats.lock().apply_stats(snapshot) {
                println!("{} stats {}", timestamp(), serde_json::Value::Object(snapshot.clone()));
            }
            Ok(())
        })
        .on_connected(|| println!("{} push connected", timestamp()))
        .on_disconnected(|| println!("{} push disconnected", timestamp()))
        .start()?;

    let mut status = feed.subscribe_status();
    let status_logger = tokio::spawn(async move {
        let mut last = *status.borrow();
        while status.changed().await.is_ok() {
            let current = *status.borrow();
            log_transition(&last, &current);
            last = current;
        }
    });

    tracing::info!("Watching. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    feed.disconnect().await;
    status_logger.abort();

    let view = view.lock();
    println!(
        "Final view: {} blocks {:?}, {} transactions",
        view.blocks().len(),
        view.block_numbers(),
        view.transactions().len()
    );

    Ok(())
}

fn log_transition(last: &FeedStatus, current: &FeedStatus) {
    if last.connection != current.connection {
        tracing::info!("Feed {} -> {}", last.connection, current.connection);
    }
    if !last.push_exhausted && current.push_exhausted {
        tracing::warn!("Push abandoned after {} attempts", current.attempt);
    }
    if last.polling != current.polling {
        tracing::info!("Polling {}", if current.polling { "started" } else { "stopped" });
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn print_block(block: &Payload) {
    let number = keys::block_number(block).unwrap_or_default();
    let txs = block
        .get("transaction_count")
        .or_else(|| block.get("tx_count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    println!("{} block #{} ({} txs)", timestamp(), number, txs);
}

fn print_block_view(view: &RecencyView) {
    let numbers: Vec<String> = view.block_numbers().iter().map(u64::to_string).collect();
    println!("         latest blocks: {}", numbers.join(" "));
}

fn print_transaction(tx: &Payload) {
    let hash = keys::tx_hash(tx).unwrap_or_default();
    let short = hash.get(..16).unwrap_or(hash.as_str());
    match tx.get("value") {
        Some(value) => println!("{} tx {} value {}", timestamp(), short, value),
        None => println!("{} tx {}", timestamp(), short),
    }
}

/// Run the dev server, publishing NDJSON frames from stdin
async fn run_serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting GXC feed dev server");

    let server = FeedServer::new(FeedServerConfig {
        http_addr: args.http_addr,
        ws_addr: args.ws_addr,
    });
    let addrs = server.spawn().await.context("binding feed server")?;
    let hub = server.hub();

    tracing::info!("  Stats: {}", addrs.stats_url());
    tracing::info!("  Push: {}", addrs.ws_url());
    tracing::info!("Reading frames from stdin, one JSON frame per line. Press Ctrl+C to stop.");

    let publisher = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("stdin closed, serving without new frames");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let frame = match PushFrame::parse(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Skipping line: {}", e);
                    continue;
                }
            };

            let name = frame.event.clone();
            let published = match frame.clone().into_event() {
                Ok(Some(event)) => hub.publish(&event),
                Ok(None) => hub.publish_frame(&frame),
                Err(e) => {
                    tracing::warn!("Skipping malformed '{}' frame: {}", name, e);
                    continue;
                }
            };
            match published {
                Ok(clients) => tracing::info!("Published {} to {} clients", name, clients),
                Err(e) => tracing::error!("Failed to publish {}: {}", name, e),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    publisher.abort();

    Ok(())
}
