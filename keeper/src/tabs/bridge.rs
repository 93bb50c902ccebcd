//! HTTP client for a browser-side tab bridge.
//!
//! The bridge is a small companion (typically a browser extension with a
//! native messaging host or a local listener) that exposes the browser's tab
//! API as JSON over HTTP:
//!
//! | method | path | response |
//! |--------|------|----------|
//! | `GET` | `/tabs/{id}` | tab, or `404` |
//! | `GET` | `/tabs?url=<url>` | array of tabs |
//! | `POST` | `/tabs/{id}/reload` | `2xx`, or `404` |
//! | `POST` | `/tabs` with `{"url": ...}` | created tab |
//!
//! # Example
//!
//! ```no_run
//! use tabkeeper::tabs::{HttpTabBridge, TabControl};
//! use tabkeeper::types::TabId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tabkeeper::tabs::TabError> {
//!     let bridge = HttpTabBridge::new("http://127.0.0.1:7879".to_string());
//!     let tab = bridge.get(TabId(42)).await?;
//!     println!("tab 42 active: {}", tab.active);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, trace};

use super::{TabControl, TabError};
use crate::types::{Tab, TabId};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct CreateTabRequest<'a> {
    url: &'a str,
}

/// [`TabControl`] backed by the HTTP tab bridge.
#[derive(Debug, Clone)]
pub struct HttpTabBridge {
    base_url: String,
    client: Client,
}

impl HttpTabBridge {
    /// Creates a client for the bridge at `base_url`.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(2)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// The bridge base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Maps non-success responses to [`TabError`]. `404` becomes `NotFound(id)`
/// when the request addressed a specific tab.
async fn check_status(response: Response, tab: Option<TabId>) -> Result<Response, TabError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, tab) {
        return Err(TabError::NotFound(id));
    }
    let message = response.text().await.unwrap_or_default();
    Err(TabError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TabControl for HttpTabBridge {
    async fn get(&self, id: TabId) -> Result<Tab, TabError> {
        trace!(tab_id = %id, "Bridge get");
        let response = self.client.get(self.url(&format!("/tabs/{id}"))).send().await?;
        let tab = check_status(response, Some(id)).await?.json::<Tab>().await?;
        Ok(tab)
    }

    async fn query(&self, url: &str) -> Result<Vec<Tab>, TabError> {
        trace!(url, "Bridge query");
        let response = self
            .client
            .get(self.url("/tabs"))
            .query(&[("url", url)])
            .send()
            .await?;
        let tabs = check_status(response, None).await?.json::<Vec<Tab>>().await?;
        debug!(url, matches = tabs.len(), "Bridge query answered");
        Ok(tabs)
    }

    async fn reload(&self, id: TabId) -> Result<(), TabError> {
        trace!(tab_id = %id, "Bridge reload");
        let response = self
            .client
            .post(self.url(&format!("/tabs/{id}/reload")))
            .send()
            .await?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<Tab, TabError> {
        trace!(url, "Bridge create");
        let response = self
            .client
            .post(self.url("/tabs"))
            .json(&CreateTabRequest { url })
            .send()
            .await?;
        let tab = check_status(response, None).await?.json::<Tab>().await?;
        Ok(tab)
    }
}
