//! The single serialized operation stream.
//!
//! One task owns the [`Keeper`] and takes work from two channels: watch ids
//! sent by the timers, and commands sent through a [`KeeperHandle`]. Each
//! item runs to completion before the next one is taken, so a refresh cycle
//! and a command never interleave.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tabkeeper::commands::Command;
//! use tabkeeper::service;
//! use tabkeeper::store::MemoryStore;
//! use tabkeeper::tabs::MemoryTabs;
//! use tabkeeper::timers::TimerBinding;
//! use tabkeeper::Keeper;
//!
//! #[tokio::main]
//! async fn main() -> tabkeeper::error::Result<()> {
//!     let (fire_tx, fire_rx) = mpsc::channel(service::FIRE_CHANNEL_CAPACITY);
//!     let timers = TimerBinding::new(fire_tx, Duration::from_secs(60));
//!     let keeper = Keeper::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryTabs::new()),
//!         timers,
//!         300,
//!     );
//!
//!     let (handle, task) = service::spawn(keeper, fire_rx);
//!     let watches = handle.send(Command::GetWatches).await?;
//!     println!("{watches:?}");
//!
//!     drop(handle);
//!     task.await.ok();
//!     Ok(())
//! }
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{Command, Response};
use crate::error::{KeeperError, Result};
use crate::keeper::Keeper;
use crate::types::WatchId;

/// Buffer size of the timer fire channel.
pub const FIRE_CHANNEL_CAPACITY: usize = 256;

/// Buffer size of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<Response>>,
}

/// Cloneable sender of commands to the dispatcher.
#[derive(Debug, Clone)]
pub struct KeeperHandle {
    tx: mpsc::Sender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl KeeperHandle {
    /// Sends `command` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Shutdown`] if the dispatcher has stopped, or
    /// the error the command itself failed with.
    pub async fn send(&self, command: Command) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| KeeperError::Shutdown)?;
        rx.await.map_err(|_| KeeperError::Shutdown)?
    }
}

/// Spawns the dispatcher task.
///
/// The task runs until every [`KeeperHandle`] is dropped, then cancels all
/// timers and returns.
#[must_use]
pub fn spawn(keeper: Keeper, fire_rx: mpsc::Receiver<WatchId>) -> (KeeperHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(keeper, fire_rx, rx));
    (KeeperHandle { tx }, task)
}

async fn run(
    mut keeper: Keeper,
    mut fire_rx: mpsc::Receiver<WatchId>,
    mut command_rx: mpsc::Receiver<Request>,
) {
    info!("Dispatcher started");

    loop {
        tokio::select! {
            request = command_rx.recv() => {
                let Some(Request { command, reply }) = request else {
                    debug!("All handles dropped");
                    break;
                };
                let action = command.action();
                let result = keeper.handle(command).await;
                if let Err(e) = &result {
                    warn!(action, error = %e, "Command failed");
                }
                if reply.send(result).is_err() {
                    debug!(action, "Command caller went away before reply");
                }
            }
            Some(id) = fire_rx.recv() => {
                if let Err(e) = keeper.run_cycle(&id).await {
                    warn!(watch_id = %id, error = %e, "Refresh cycle aborted");
                }
            }
        }
    }

    keeper.shutdown();
    info!("Dispatcher stopped");
}
