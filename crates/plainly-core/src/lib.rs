pub mod ai;
pub mod background;
pub mod bus;
pub mod config;
pub mod content;
pub mod error;
pub mod message;
pub mod popup;
pub mod settings;

// Re-export main types for convenience
pub use ai::{parse_generation, CohereClient, TextGateway};
pub use background::{BackgroundRouter, ContextMenus, Dispatch, MenuClick, MenuItem, TabHost, TabId};
pub use bus::{Envelope, MessageBus, Responder};
pub use config::Config;
pub use content::{ContentScript, Document, Marker, Node, Selection};
pub use error::{BusError, ContentError, GatewayError};
pub use message::{ActionMessage, ActionResponse, GenerationResult, PageData};
pub use popup::{Notifier, Popup};
pub use settings::{FileSettings, MemorySettings, SettingsStore, API_KEY_SETTING};
