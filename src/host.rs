//! Terminal stand-ins for the browser platform: tabs, alerts, and menus.

use async_trait::async_trait;
use colored::*;
use plainly_core::{
    ActionMessage, BusError, ContentScript, ContextMenus, Document, MenuItem, MessageBus, Notifier, TabHost, TabId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Alerts printed to stdout.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&self, message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }
}

/// Menu registrations are only logged.
pub struct LoggedMenus;

impl ContextMenus for LoggedMenus {
    fn create(&self, item: MenuItem) {
        debug!(id = item.id, title = item.title, "Registered context menu item");
    }
}

struct Tab {
    bus: MessageBus,
    document: Arc<Mutex<Document>>,
}

/// In-memory pages, each served by its own content script.
#[derive(Default)]
pub struct PageTabs {
    tabs: HashMap<TabId, Tab>,
}

impl PageTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `document` in tab `id` and start its content script.
    pub fn open(&mut self, id: TabId, document: Document) -> Arc<Mutex<Document>> {
        let document = Arc::new(Mutex::new(document));
        let (bus, rx) = MessageBus::channel();
        tokio::spawn(ContentScript::new(Arc::clone(&document)).serve(rx));

        self.tabs.insert(
            id,
            Tab {
                bus,
                document: Arc::clone(&document),
            },
        );
        document
    }

    /// Resolves once every message already pushed to `id` has been handled.
    pub async fn flush(&self, id: TabId) {
        if let Some(tab) = self.tabs.get(&id) {
            let _ = tab.bus.send_message(ActionMessage::Unknown).await;
        }
    }
}

#[async_trait]
impl TabHost for PageTabs {
    fn push_to_tab(&self, tab: TabId, message: ActionMessage) -> Result<(), BusError> {
        self.tabs
            .get(&tab)
            .ok_or(BusError::Disconnected)?
            .bus
            .notify(message)
    }

    async fn alert(&self, tab: TabId, message: &str) {
        println!("{} {}", format!("[tab {}]", tab).dimmed(), message.yellow());
    }

    async fn selected_text(&self, tab: TabId) -> Option<String> {
        let tab = self.tabs.get(&tab)?;
        let text = tab.document.lock().await.selected_text();
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_reaches_content_script() {
        let mut tabs = PageTabs::new();
        let mut page = Document::new("a ubiquitous word");
        page.select_text("ubiquitous");
        let document = tabs.open(1, page);

        assert_eq!(tabs.selected_text(1).await.as_deref(), Some("ubiquitous"));

        tabs.push_to_tab(1, ActionMessage::replace_word("common", Some("ubiquitous")))
            .unwrap();
        tabs.flush(1).await;

        assert_eq!(document.lock().await.text(), "a common word");
    }

    #[tokio::test]
    async fn test_push_to_missing_tab() {
        let tabs = PageTabs::new();
        assert_eq!(
            tabs.push_to_tab(9, ActionMessage::replace_word("x", None)),
            Err(BusError::Disconnected)
        );
        assert_eq!(tabs.selected_text(9).await, None);
    }
}
