//! Tabkeeper - periodic auto-refresh for browser tabs.
//!
//! # Commands
//!
//! - `tabkeeper run`: Start the daemon (timers, dispatcher, HTTP command surface)
//! - `tabkeeper add <url>`: Watch a URL
//! - `tabkeeper list`: Show watches
//! - `tabkeeper remove <id>`: Stop watching
//! - `tabkeeper rename <id> <name>`: Set a watch's display name
//! - `tabkeeper history`: Show the refresh log
//! - `tabkeeper clear-history`: Empty the refresh log
//!
//! # Environment Variables
//!
//! See the [`config`](tabkeeper::config) module for daemon configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tabkeeper::client::{normalize_url, DaemonClient, DEFAULT_DAEMON_URL};
use tabkeeper::config::Config;
use tabkeeper::format;
use tabkeeper::routes::{create_router, AppState};
use tabkeeper::service::{self, FIRE_CHANNEL_CAPACITY};
use tabkeeper::store::{self, FileStore, KvStore};
use tabkeeper::tabs::{HttpTabBridge, MemoryTabs, TabControl};
use tabkeeper::timers::TimerBinding;
use tabkeeper::{Keeper, NewWatch, TabId, WatchId};

/// Time allowed for the dispatcher to finish its current operation on shutdown.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Default refresh interval for `add`, in minutes.
const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Tabkeeper - periodic auto-refresh for browser tabs.
///
/// Runs a daemon that reloads watched tabs on a schedule, skipping the tab
/// you are looking at and reopening tabs you closed.
#[derive(Parser, Debug)]
#[command(name = "tabkeeper")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    TABKEEPER_BRIDGE_URL     Tab bridge URL (required for 'run' unless --simulate)
    TABKEEPER_DATA_DIR       Data directory (default: ~/.tabkeeper)
    TABKEEPER_PORT           Daemon HTTP port (default: 7878)
    TABKEEPER_BIND_ADDR      Daemon bind address (default: 127.0.0.1)
    TABKEEPER_MAX_HISTORY    History capacity (default: 300)
    TABKEEPER_MINUTE_SECS    Seconds per schedule minute (default: 60)
    TABKEEPER_LOG_JSON       JSON logs (default: false)
    TABKEEPER_DAEMON_URL     Daemon URL for client commands

EXAMPLES:
    # Start the daemon against a simulated browser
    tabkeeper run --simulate

    # Refresh a dashboard every 10 minutes
    tabkeeper add grafana.example.com --every 10

    # See what is being watched
    tabkeeper list
")]
struct Cli {
    /// URL of the running daemon (client commands only).
    #[arg(long, global = true, env = "TABKEEPER_DAEMON_URL", default_value = DEFAULT_DAEMON_URL)]
    daemon: String,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon.
    ///
    /// Restores timers for all persisted watches and serves the command
    /// surface over HTTP until SIGINT or SIGTERM.
    Run {
        /// Use an in-process simulated browser instead of the tab bridge.
        #[arg(long)]
        simulate: bool,
    },

    /// Watch a URL. A missing scheme defaults to https://.
    Add {
        url: String,

        /// Refresh interval in minutes (1-1440).
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MINUTES)]
        every: u32,

        /// Bind to an already open tab.
        #[arg(long)]
        tab_id: Option<i64>,

        /// Display title.
        #[arg(long)]
        title: Option<String>,

        /// Watch id (default: generated).
        #[arg(long)]
        id: Option<String>,
    },

    /// List watches.
    List,

    /// Stop watching.
    Remove { id: String },

    /// Set a watch's display name.
    Rename { id: String, name: String },

    /// Show the refresh log, newest first.
    History,

    /// Empty the refresh log.
    ClearHistory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { simulate } => run_daemon(simulate).await,
        command => {
            init_logging(false, "warn");
            run_client(DaemonClient::new(cli.daemon), command).await
        }
    }
}

/// Runs the daemon until a shutdown signal.
async fn run_daemon(simulate: bool) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(config.log_json, "info");

    info!(
        data_dir = %config.data_dir.display(),
        simulate,
        minute_secs = config.minute.as_secs(),
        max_history = config.max_history,
        "Starting tabkeeper daemon"
    );

    let file_store = FileStore::open(config.store_path())
        .await
        .with_context(|| format!("Failed to open store at {}", config.store_path().display()))?;
    let kv: Arc<dyn KvStore> = Arc::new(file_store);
    store::install(kv.as_ref())
        .await
        .context("Failed to initialize store")?;

    let tabs: Arc<dyn TabControl> = if simulate {
        warn!("Using simulated browser, no real tabs will be touched");
        Arc::new(MemoryTabs::new())
    } else {
        let url = config
            .require_bridge_url()
            .context("Set TABKEEPER_BRIDGE_URL or pass --simulate")?;
        info!(bridge_url = %url, "Using tab bridge");
        Arc::new(HttpTabBridge::new(url.to_string()))
    };

    let (fire_tx, fire_rx) = mpsc::channel(FIRE_CHANNEL_CAPACITY);
    let timers = TimerBinding::new(fire_tx, config.minute);
    let mut keeper = Keeper::new(kv, tabs, timers, config.max_history);
    keeper
        .restore_timers()
        .await
        .context("Failed to restore watch timers")?;

    let (handle, dispatcher) = service::spawn(keeper, fire_rx);
    let app = create_router(AppState::new(handle));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(address = %addr, "Command surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // The router owned the last handle; the dispatcher stops once it drains.
    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), dispatcher).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "Dispatcher task failed"),
        Err(_) => warn!("Dispatcher did not stop in time"),
    }

    info!("Tabkeeper stopped");
    Ok(())
}

/// Runs a client subcommand against the daemon.
async fn run_client(client: DaemonClient, command: Command) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Add {
            url,
            every,
            tab_id,
            title,
            id,
        } => {
            let id = id.map_or_else(WatchId::generate, WatchId::from);
            let url = normalize_url(&url);
            client
                .add_watch(NewWatch {
                    id: id.clone(),
                    url: url.clone(),
                    tab_id: tab_id.map(TabId),
                    title,
                    interval_minutes: every,
                })
                .await
                .context("Failed to add watch")?;
            println!("Watching {url} every {every}m as {id}");
        }
        Command::List => {
            let watches = client.get_watches().await.context("Failed to list watches")?;
            println!("{}", format::watch_table(&watches, now));
        }
        Command::Remove { id } => {
            client
                .remove_watch(WatchId::from(id.as_str()))
                .await
                .context("Failed to remove watch")?;
            println!("Removed {id}");
        }
        Command::Rename { id, name } => {
            let name = name.trim().to_string();
            client
                .rename_watch(WatchId::from(id.as_str()), name.clone())
                .await
                .context("Failed to rename watch")?;
            println!("Renamed {id} to {name}");
        }
        Command::History => {
            let history = client.get_history().await.context("Failed to load history")?;
            println!("{}", format::history_lines(&history, now));
        }
        Command::ClearHistory => {
            client
                .clear_history()
                .await
                .context("Failed to clear history")?;
            println!("History cleared");
        }
        Command::Run { .. } => bail!("'run' is not a client command"),
    }

    Ok(())
}

/// Initializes the logging subsystem.
///
/// `RUST_LOG` takes precedence over `default_filter`.
fn init_logging(json: bool, default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
