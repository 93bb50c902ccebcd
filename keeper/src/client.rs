//! HTTP client for a running tabkeeper daemon, used by the CLI subcommands.
//!
//! # Example
//!
//! ```no_run
//! use tabkeeper::client::DaemonClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tabkeeper::client::ClientError> {
//!     let client = DaemonClient::new("http://127.0.0.1:7878".to_string());
//!     let watches = client.get_watches().await?;
//!     println!("{} watches", watches.len());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::commands::{Command, Response};
use crate::routes::ErrorResponse;
use crate::types::{HistoryEntry, NewWatch, Watch, WatchId};

/// Default daemon URL.
pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:7878";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors returned by [`DaemonClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon refused the command.
    #[error("daemon rejected command ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The daemon answered with a response of the wrong shape.
    #[error("unexpected response to {action}")]
    UnexpectedResponse { action: &'static str },
}

/// Client for the daemon's `POST /command` endpoint.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    base_url: String,
    client: Client,
}

impl DaemonClient {
    /// Creates a client for the daemon at `base_url`.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Sends a raw command.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] on transport failure and
    /// [`ClientError::Rejected`] on a non-success status.
    pub async fn send(&self, command: &Command) -> Result<Response, ClientError> {
        debug!(action = command.action(), "Sending command to daemon");
        let response = self
            .client
            .post(format!("{}/command", self.base_url))
            .json(command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<Response>().await?)
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn add_watch(&self, watch: NewWatch) -> Result<(), ClientError> {
        let command = Command::AddWatch { watch };
        self.expect_ack(&command).await
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn remove_watch(&self, id: WatchId) -> Result<(), ClientError> {
        self.expect_ack(&Command::RemoveWatch { id }).await
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn rename_watch(&self, id: WatchId, name: String) -> Result<(), ClientError> {
        self.expect_ack(&Command::RenameWatch { id, name }).await
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn clear_history(&self) -> Result<(), ClientError> {
        self.expect_ack(&Command::ClearHistory).await
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn get_watches(&self) -> Result<BTreeMap<WatchId, Watch>, ClientError> {
        match self.send(&Command::GetWatches).await? {
            Response::Watches(watches) => Ok(watches),
            Response::Ack { .. } | Response::History(_) => Err(ClientError::UnexpectedResponse {
                action: "getWatches",
            }),
        }
    }

    /// # Errors
    ///
    /// See [`DaemonClient::send`].
    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        match self.send(&Command::GetHistory).await? {
            Response::History(entries) => Ok(entries),
            Response::Ack { .. } | Response::Watches(_) => Err(ClientError::UnexpectedResponse {
                action: "getHistory",
            }),
        }
    }

    async fn expect_ack(&self, command: &Command) -> Result<(), ClientError> {
        match self.send(command).await? {
            Response::Ack { success: true } => Ok(()),
            _ => Err(ClientError::UnexpectedResponse {
                action: command.action(),
            }),
        }
    }
}

/// Prefixes `https://` when `input` has no `http(s)://` scheme.
#[must_use]
pub fn normalize_url(input: &str) -> String {
    let url = input.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
