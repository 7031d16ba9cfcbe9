//! # GetUp Notifier
//!
//! Feeds task write events (one JSON object per line) to the trigger
//! adapter, then keeps running until every scheduled notification fired.
//!
//! Usage:
//!   getup-notifier --events writes.jsonl          # Read events from a file
//!   tail -f writes.jsonl | getup-notifier         # Read events from stdin
//!   getup-notifier --dry-run --apply-writes       # Log pushes, persist event docs

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use getup_core::traits::PushTransport;
use getup_core::{NotifierConfig, WriteEvent};
use getup_scheduler::{FcmTransport, JsonDocumentStore, LogTransport, TriggerAdapter};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "getup-notifier",
    version,
    about = "⏰ GetUp task-due push notification scheduler"
)]
struct Cli {
    /// Config file (default: ~/.getup/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Document store directory (overrides store.data_dir)
    #[arg(long)]
    data_dir: Option<String>,

    /// JSON-lines file of write events (default: stdin)
    #[arg(long)]
    events: Option<String>,

    /// Store each event's document before triggering on it
    #[arg(long)]
    apply_writes: bool,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "getup_notifier=debug,getup_scheduler=debug,getup_core=debug"
    } else {
        "getup_notifier=info,getup_scheduler=info,getup_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => NotifierConfig::load_from(Path::new(&expand_path(path)))?,
        None => NotifierConfig::load()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = dir.clone();
    }
    if cli.dry_run {
        config.push.dry_run = true;
    }

    let store = Arc::new(JsonDocumentStore::open(&config.store.data_path())?);
    let transport: Arc<dyn PushTransport> = if config.push.is_configured() {
        Arc::new(FcmTransport::new(&config.push))
    } else {
        if !config.push.dry_run {
            tracing::warn!("⚠️ No FCM project or access token configured, notifications will only be logged");
        }
        Arc::new(LogTransport)
    };

    tracing::info!(
        "⏰ GetUp notifier started (store: {}, policy: {:?}, transport: {})",
        store.root().display(),
        config.scheduler.policy,
        transport.name()
    );
    let adapter = TriggerAdapter::from_config(&config, store.clone(), store.clone(), transport);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.events {
        Some(path) => {
            let path = expand_path(path);
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open events file {path}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let apply = cli.apply_writes.then_some(store.as_ref());
    tokio::select! {
        fed = feed(&adapter, apply, reader) => {
            tracing::info!("📋 Input drained after {} event(s)", fed?);
        }
        _ = tokio::signal::ctrl_c() => {
            let dropped = adapter.scheduler().shutdown().await;
            tracing::info!("👋 Interrupted, {} pending job(s) dropped", dropped);
            return Ok(());
        }
    }

    let pending = adapter.scheduler().pending_jobs().await;
    if let Some(last) = pending.last() {
        tracing::info!(
            "⏳ Waiting for {} pending job(s), last due {}",
            pending.len(),
            last.due.to_rfc3339()
        );
    }

    tokio::select! {
        _ = adapter.scheduler().wait_idle() => {
            tracing::info!("✅ All scheduled notifications handled ({} fired)", adapter.scheduler().fired_count());
        }
        _ = tokio::signal::ctrl_c() => {
            let dropped = adapter.scheduler().shutdown().await;
            tracing::info!("👋 Interrupted, {} pending job(s) dropped", dropped);
        }
    }
    Ok(())
}

/// Read write events line by line and hand each to the adapter.
async fn feed(
    adapter: &TriggerAdapter,
    apply: Option<&JsonDocumentStore>,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
) -> Result<usize> {
    let mut lines = reader.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: WriteEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("⚠️ Skipping unparseable event line: {e}");
                continue;
            }
        };

        if let Some(store) = apply {
            let applied = match &event.after {
                Some(doc) => store.put_task(&event.task_id, doc).await,
                None => store.remove_task(&event.task_id).await.map(|_| ()),
            };
            if let Err(e) = applied {
                tracing::warn!("⚠️ Failed to apply write for task '{}': {e}", event.task_id);
            }
        }

        adapter.on_write(&event).await;
        count += 1;
    }
    Ok(count)
}
