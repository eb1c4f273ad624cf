use std::sync::Arc;
use tracing::{debug, warn};

use crate::background::{TabHost, TabId};
use crate::bus::MessageBus;
use crate::message::{ActionMessage, ActionResponse};
use crate::settings::SettingsStore;

pub const ENTER_TEXT: &str = "Please enter some text to simplify.";
pub const SET_API_KEY: &str = "Error: Please set your API key in the extension settings.";
pub const SIMPLIFYING: &str = "Simplifying...";
pub const TEST_LABEL: &str = "Test API Connection";
pub const TESTING_LABEL: &str = "Testing...";

/// Title sent with text typed into the popup.
pub const USER_INPUT_TITLE: &str = "User Input";

/// Blocking notification shown to the user.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestButton {
    pub label: String,
    pub disabled: bool,
}

impl Default for TestButton {
    fn default() -> Self {
        Self {
            label: TEST_LABEL.to_string(),
            disabled: false,
        }
    }
}

/// State and actions of one popup lifetime.
pub struct Popup {
    bus: MessageBus,
    settings: Arc<dyn SettingsStore>,
    tabs: Arc<dyn TabHost>,
    notifier: Arc<dyn Notifier>,

    pub input: String,
    pub output: String,
    pub settings_visible: bool,
    pub api_key_field: String,
    pub test_button: TestButton,
}

impl Popup {
    pub fn new(
        bus: MessageBus,
        settings: Arc<dyn SettingsStore>,
        tabs: Arc<dyn TabHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bus,
            settings,
            tabs,
            notifier,
            input: String::new(),
            output: String::new(),
            settings_visible: false,
            api_key_field: String::new(),
            test_button: TestButton::default(),
        }
    }

    /// Pre-fill the input from the active tab's selection. Best effort.
    pub async fn open(&mut self, active_tab: Option<TabId>) {
        let Some(tab) = active_tab else {
            return;
        };
        if let Some(text) = self.tabs.selected_text(tab).await.filter(|t| !t.is_empty()) {
            self.input = text;
        }
    }

    pub async fn submit(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.output = ENTER_TEXT.to_string();
            return;
        }

        self.output = SIMPLIFYING.to_string();

        let has_key = match self.settings.api_key().await {
            Ok(key) => key.is_some(),
            Err(err) => {
                warn!("Could not read settings: {}", err);
                false
            }
        };
        if !has_key {
            self.output = SET_API_KEY.to_string();
            return;
        }

        debug!("Sending text to background for simplification");
        let reply = match self.bus.send_message(ActionMessage::summarize(USER_INPUT_TITLE, &text)).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Background unreachable: {}", err);
                None
            }
        };

        self.output = match reply {
            Some(ActionResponse {
                success: true,
                simplified,
                ..
            }) => simplified.unwrap_or_default(),
            other => format!("Error: {}", ActionResponse::describe_error(other.as_ref())),
        };
    }

    /// Show or hide the settings panel, loading the stored key when shown.
    pub async fn toggle_settings(&mut self) {
        self.settings_visible = !self.settings_visible;
        if !self.settings_visible {
            return;
        }

        match self.settings.api_key().await {
            Ok(Some(key)) => self.api_key_field = key,
            Ok(None) => {}
            Err(err) => warn!("Could not load API key: {}", err),
        }
    }

    pub async fn save_settings(&mut self) {
        let api_key = self.api_key_field.trim().to_string();
        if api_key.is_empty() {
            self.notifier.alert("Please enter a valid API key.");
            return;
        }

        match self.settings.set_api_key(&api_key).await {
            Ok(()) => {
                self.notifier.alert("API key saved!");
                self.settings_visible = false;
            }
            Err(err) => self.notifier.alert(&format!("Could not save API key: {}", err)),
        }
    }

    /// Check the key in the settings field against the API.
    pub async fn test_connection(&mut self) {
        let api_key = self.api_key_field.trim().to_string();
        if api_key.is_empty() {
            self.notifier.alert("Please enter an API key to test.");
            return;
        }

        self.test_button = TestButton {
            label: TESTING_LABEL.to_string(),
            disabled: true,
        };

        let reply = self
            .bus
            .send_message(ActionMessage::TestApiConnection { api_key })
            .await
            .ok()
            .flatten();

        self.test_button = TestButton::default();

        match reply {
            Some(response) if response.success => self.notifier.alert("API connection successful!"),
            other => {
                let detail = other
                    .and_then(|r| r.error)
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.notifier.alert(&format!("API connection failed: {}", detail));
            }
        }
    }
}
