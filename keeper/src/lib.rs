//! Tabkeeper - periodic auto-refresh for browser tabs.
//!
//! This crate keeps a set of *watches*, each pairing a URL (and optionally a
//! live tab) with a refresh interval in minutes. When a watch's timer fires,
//! the engine resolves the tab, decides what to do, acts on it through a
//! tab-control facility, and records the outcome.
//!
//! # Overview
//!
//! - A focused tab is never reloaded; the attempt is recorded as `skipped`.
//! - A background tab is reloaded in place.
//! - A closed tab is reopened at the watch URL and the watch is rebound to it.
//!
//! All operations, timer-driven or user-driven, run one at a time on a single
//! dispatcher task, so no update is ever lost to interleaving.
//!
//! # Modules
//!
//! - [`types`]: Watch, history and tab records
//! - [`store`]: Durable key/value store and the watch/history views over it
//! - [`timers`]: Per-watch periodic wake-ups
//! - [`tabs`]: Tab-control facility (HTTP bridge and simulated browser)
//! - [`resolver`]: Maps a watch to its live tab
//! - [`decision`]: Skip/refresh/reopen decision
//! - [`reconcile`]: Persists cycle outcomes
//! - [`keeper`]: The engine tying it all together
//! - [`commands`]: The command surface
//! - [`service`]: Serialized dispatcher and its handle
//! - [`routes`]: HTTP command surface
//! - [`client`]: HTTP client for a running daemon
//! - [`format`]: Terminal rendering for the CLI
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Crate-level error type

pub mod client;
pub mod commands;
pub mod config;
pub mod decision;
pub mod error;
pub mod format;
pub mod keeper;
pub mod reconcile;
pub mod resolver;
pub mod routes;
pub mod service;
pub mod store;
pub mod tabs;
pub mod timers;
pub mod types;

pub use commands::{Command, Response};
pub use config::Config;
pub use error::{KeeperError, Result};
pub use keeper::{CycleReport, Keeper};
pub use service::KeeperHandle;
pub use types::{Attempt, AttemptStatus, HistoryEntry, NewWatch, Tab, TabId, Watch, WatchId};
