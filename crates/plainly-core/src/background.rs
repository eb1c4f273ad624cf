//! Background router: the long-lived listener every other context talks to.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ai::TextGateway;
use crate::bus::Envelope;
use crate::error::BusError;
use crate::message::{ActionMessage, ActionResponse, PageData};
use crate::settings::SettingsStore;

pub type TabId = u32;

pub const VISUAL_ACK: &str = "Visual generation request received";
pub const PPT_ACK: &str = "PowerPoint creation request received";
pub const MISSING_KEY_ALERT: &str = "Please set your Cohere API key in the extension settings.";

pub const SIMPLIFY_MENU_ID: &str = "simplifyWord";

/// Context-menu entry shown while text is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: &'static str,
    pub title: &'static str,
    pub contexts: &'static [&'static str],
}

pub const MENU_ITEM: MenuItem = MenuItem {
    id: SIMPLIFY_MENU_ID,
    title: "Simplify this word",
    contexts: &["selection"],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
}

pub trait ContextMenus: Send + Sync {
    fn create(&self, item: MenuItem);
}

/// Access to open pages.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// One-way push to the tab's content script. No delivery guarantee.
    fn push_to_tab(&self, tab: TabId, message: ActionMessage) -> Result<(), BusError>;

    /// Blocking notification inside the page.
    async fn alert(&self, tab: TabId, message: &str);

    /// Current selection in the page, if it can be read.
    async fn selected_text(&self, tab: TabId) -> Option<String>;
}

/// Outcome of dispatching one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Reply(ActionResponse),
    /// Not addressed to the background; the reply channel is closed unanswered.
    Silent,
}

pub struct BackgroundRouter {
    settings: Arc<dyn SettingsStore>,
    gateway: Arc<dyn TextGateway>,
    tabs: Arc<dyn TabHost>,
}

impl BackgroundRouter {
    pub fn new(settings: Arc<dyn SettingsStore>, gateway: Arc<dyn TextGateway>, tabs: Arc<dyn TabHost>) -> Self {
        Self { settings, gateway, tabs }
    }

    pub async fn dispatch(&self, message: ActionMessage) -> Dispatch {
        info!(action = message.action(), "Background received message");

        match message {
            ActionMessage::GenerateVisual => {
                info!("Visual generation requested, no generator is connected");
                Dispatch::Reply(ActionResponse::acknowledged(VISUAL_ACK))
            }
            ActionMessage::CreatePpt => {
                info!("Presentation requested, no exporter is connected");
                Dispatch::Reply(ActionResponse::acknowledged(PPT_ACK))
            }
            ActionMessage::GetAiSummary { data } => Dispatch::Reply(self.summarize(&data).await),
            ActionMessage::TestApiConnection { api_key } => Dispatch::Reply(self.test_connection(&api_key).await),
            ActionMessage::ReplaceWord { .. } | ActionMessage::Unknown => Dispatch::Silent,
        }
    }

    async fn summarize(&self, page: &PageData) -> ActionResponse {
        match self.gateway.summarize(page).await {
            Ok(result) => {
                debug!("AI summary received");
                ActionResponse::summary(result)
            }
            Err(err) => {
                error!("AI API error: {}", err);
                ActionResponse::failure(error_text(err.to_string(), "Failed to get AI summary"))
            }
        }
    }

    async fn test_connection(&self, api_key: &str) -> ActionResponse {
        match self.gateway.test_connection(api_key).await {
            Ok(()) => ActionResponse::connected(),
            Err(err) => {
                error!("API test error: {}", err);
                ActionResponse::failure(error_text(err.to_string(), "Failed to connect to API"))
            }
        }
    }

    /// Dispatch one envelope and answer it exactly once.
    pub async fn handle(&self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        match self.dispatch(message).await {
            Dispatch::Reply(response) => reply.send(response),
            Dispatch::Silent => reply.dismiss(),
        }
    }

    /// Handle every envelope on `rx`, each in its own task, until all bus
    /// senders are dropped.
    pub async fn serve(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            let router = Arc::clone(&self);
            tokio::spawn(async move {
                router.handle(envelope).await;
            });
        }
        debug!("Message bus closed, background router stopping");
    }

    pub fn on_installed(&self, menus: &dyn ContextMenus) {
        menus.create(MENU_ITEM);
    }

    /// Simplify the clicked selection and push the result into `tab`.
    pub async fn on_menu_clicked(&self, click: &MenuClick, tab: TabId) {
        if click.menu_item_id != SIMPLIFY_MENU_ID {
            return;
        }
        let Some(selected) = click.selection_text.as_deref().filter(|text| !text.is_empty()) else {
            return;
        };

        let api_key = match self.settings.api_key().await {
            Ok(Some(api_key)) => api_key,
            Ok(None) => {
                self.tabs.alert(tab, MISSING_KEY_ALERT).await;
                return;
            }
            Err(err) => {
                error!("Could not read settings: {}", err);
                self.tabs.alert(tab, &format!("Error simplifying word: {}", err)).await;
                return;
            }
        };

        match self.gateway.simplify_phrase(&api_key, selected).await {
            Ok(word) => {
                let push = ActionMessage::replace_word(&word, Some(selected));
                if let Err(err) = self.tabs.push_to_tab(tab, push) {
                    warn!(tab, "Could not deliver simplified word: {}", err);
                }
            }
            Err(err) => {
                error!("Error simplifying word: {}", err);
                self.tabs.alert(tab, &format!("Error simplifying word: {}", err)).await;
            }
        }
    }
}

fn error_text(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
