//! Watcher Configuration
//!
//! Read from an optional TOML file, then overridden by command-line flags.
//!
//! ```toml
//! ws_url = "wss://explorer.example/ws"
//! stats_url = "https://explorer.example/api/v1/stats"
//!
//! [feed]
//! poll_interval_ms = 5000
//! max_reconnect_attempts = 10
//! ```

use anyhow::{Context, Result};
use clap::Args;
use feed_client::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Watcher configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Push endpoint
    pub ws_url: Option<String>,
    /// Stats snapshot endpoint
    pub stats_url: Option<String>,
    /// Transport and retry settings
    pub feed: FeedConfig,
}

/// Flags of the `watch` command
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebSocket push URL
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Stats endpoint URL
    #[arg(long)]
    pub stats_url: Option<String>,

    /// Never use the push channel
    #[arg(long)]
    pub no_push: bool,

    /// Never poll the stats endpoint
    #[arg(long)]
    pub no_pull: bool,

    /// Fallback poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Reconnect attempts before push is abandoned
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    /// Stats refresh interval while push is up, in milliseconds
    #[arg(long)]
    pub stats_refresh_interval_ms: Option<u64>,

    /// Push connect timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,
}

impl WatchConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// File config (if any) with flags applied on top
    pub fn resolve(args: &WatchArgs) -> Result<Self> {
        let base = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(args))
    }

    pub fn with_overrides(mut self, args: &WatchArgs) -> Self {
        if let Some(url) = &args.ws_url {
            self.ws_url = Some(url.clone());
        }
        if let Some(url) = &args.stats_url {
            self.stats_url = Some(url.clone());
        }
        if args.no_push {
            self.feed.use_push = false;
        }
        if args.no_pull {
            self.feed.use_pull = false;
        }
        if let Some(ms) = args.poll_interval_ms {
            self.feed.poll_interval_ms = ms;
        }
        if let Some(attempts) = args.max_reconnect_attempts {
            self.feed.max_reconnect_attempts = attempts;
        }
        if let Some(ms) = args.stats_refresh_interval_ms {
            self.feed.stats_refresh_interval_ms = Some(ms);
        }
        if let Some(ms) = args.connect_timeout_ms {
            self.feed.connect_timeout_ms = Some(ms);
        }
        self
    }
}
