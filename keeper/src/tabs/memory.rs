//! In-process simulated browser.
//!
//! Keeps a table of tabs and a log of the reloads and creations performed
//! against it, so tests can assert on side effects.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{TabControl, TabError};
use crate::types::{Tab, TabId};

/// First id handed out by [`MemoryTabs::create`].
const FIRST_TAB_ID: i64 = 1000;

#[derive(Debug)]
struct Browser {
    tabs: BTreeMap<TabId, Tab>,
    next_id: i64,
    reloads: Vec<TabId>,
    created: Vec<TabId>,
    close_on_reload: bool,
}

/// Simulated tab-control facility.
#[derive(Debug)]
pub struct MemoryTabs {
    browser: Mutex<Browser>,
}

impl Default for MemoryTabs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTabs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            browser: Mutex::new(Browser {
                tabs: BTreeMap::new(),
                next_id: FIRST_TAB_ID,
                reloads: Vec::new(),
                created: Vec::new(),
                close_on_reload: false,
            }),
        }
    }

    /// Adds or replaces a tab as if the user had opened it.
    pub fn open(&self, id: TabId, url: &str, title: &str, active: bool) {
        let mut browser = self.lock();
        browser.tabs.insert(
            id,
            Tab {
                id,
                active,
                title: Some(title.to_string()),
                url: Some(url.to_string()),
            },
        );
    }

    /// Closes a tab. Returns whether it was open.
    pub fn close(&self, id: TabId) -> bool {
        self.lock().tabs.remove(&id).is_some()
    }

    /// Marks a tab focused or unfocused.
    pub fn set_active(&self, id: TabId, active: bool) {
        if let Some(tab) = self.lock().tabs.get_mut(&id) {
            tab.active = active;
        }
    }

    /// Makes the next reload find its tab already closed, as when the user
    /// closes a tab between resolution and reload.
    pub fn close_before_next_reload(&self) {
        self.lock().close_on_reload = true;
    }

    /// Tabs reloaded so far, in order.
    #[must_use]
    pub fn reloads(&self) -> Vec<TabId> {
        self.lock().reloads.clone()
    }

    /// Tabs created so far, in order.
    #[must_use]
    pub fn created(&self) -> Vec<TabId> {
        self.lock().created.clone()
    }

    /// Snapshot of a tab, if open.
    #[must_use]
    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.lock().tabs.get(&id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Browser> {
        self.browser
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TabControl for MemoryTabs {
    async fn get(&self, id: TabId) -> Result<Tab, TabError> {
        self.lock().tabs.get(&id).cloned().ok_or(TabError::NotFound(id))
    }

    async fn query(&self, url: &str) -> Result<Vec<Tab>, TabError> {
        Ok(self
            .lock()
            .tabs
            .values()
            .filter(|tab| tab.url.as_deref() == Some(url))
            .cloned()
            .collect())
    }

    async fn reload(&self, id: TabId) -> Result<(), TabError> {
        let mut browser = self.lock();
        if std::mem::take(&mut browser.close_on_reload) {
            browser.tabs.remove(&id);
        }
        if !browser.tabs.contains_key(&id) {
            return Err(TabError::NotFound(id));
        }
        browser.reloads.push(id);
        debug!(tab_id = %id, "Simulated reload");
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<Tab, TabError> {
        let mut browser = self.lock();
        let id = TabId(browser.next_id);
        browser.next_id += 1;

        // New tabs open in the background.
        let tab = Tab {
            id,
            active: false,
            title: None,
            url: Some(url.to_string()),
        };
        browser.tabs.insert(id, tab.clone());
        browser.created.push(id);
        debug!(tab_id = %id, url, "Simulated tab creation");
        Ok(tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_tab_is_not_found() {
        let tabs = MemoryTabs::new();
        let err = tabs.get(TabId(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn query_matches_exact_url_only() {
        let tabs = MemoryTabs::new();
        tabs.open(TabId(1), "https://example.com", "Example", false);
        tabs.open(TabId(2), "https://example.com/other", "Other", false);

        let found = tabs.query("https://example.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, TabId(1));
    }

    #[tokio::test]
    async fn reload_records_side_effect() {
        let tabs = MemoryTabs::new();
        tabs.open(TabId(1), "https://example.com", "Example", false);

        tabs.reload(TabId(1)).await.unwrap();
        assert_eq!(tabs.reloads(), vec![TabId(1)]);

        assert!(tabs.reload(TabId(9)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let tabs = MemoryTabs::new();
        let a = tabs.create("https://a.example").await.unwrap();
        let b = tabs.create("https://b.example").await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(!a.active);
        assert_eq!(tabs.created(), vec![a.id, b.id]);
        assert!(tabs.tab(a.id).is_some());
    }

    #[tokio::test]
    async fn close_before_next_reload_applies_once() {
        let tabs = MemoryTabs::new();
        tabs.open(TabId(1), "https://example.com", "Example", false);
        tabs.open(TabId(2), "https://example.org", "Other", false);
        tabs.close_before_next_reload();

        assert!(tabs.reload(TabId(1)).await.unwrap_err().is_not_found());
        assert!(tabs.tab(TabId(1)).is_none());
        tabs.reload(TabId(2)).await.unwrap();
        assert_eq!(tabs.reloads(), vec![TabId(2)]);
    }

    #[test]
    fn close_and_set_active() {
        let tabs = MemoryTabs::new();
        tabs.open(TabId(1), "https://example.com", "Example", false);
        tabs.set_active(TabId(1), true);
        assert!(tabs.tab(TabId(1)).unwrap().active);

        assert!(tabs.close(TabId(1)));
        assert!(!tabs.close(TabId(1)));
    }
}
