use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plainly_core::background::{MenuClick, SIMPLIFY_MENU_ID};
use plainly_core::popup::SIMPLIFYING;
use plainly_core::{
    ActionMessage, ActionResponse, BackgroundRouter, CohereClient, Config, Document, FileSettings, MessageBus,
    Popup, SettingsStore, TabHost, TextGateway,
};

mod host;

use host::{LoggedMenus, PageTabs, TerminalNotifier};

const ACTIVE_TAB: u32 = 1;

#[derive(Parser)]
#[command(name = "plainly")]
#[command(about = "Summarize and simplify text with the Cohere generate API")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "PLAINLY_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simplify text the way the popup does
    Summarize {
        /// Text to simplify
        text: String,
    },
    /// Summarize a page, printing both sections
    Page {
        /// File holding the page text
        file: PathBuf,
        /// Page title
        #[arg(short, long, default_value = "Untitled")]
        title: String,
    },
    /// Replace a phrase in a page with a simpler one (context menu flow)
    Simplify {
        /// Page text
        #[arg(short, long)]
        page: String,
        /// Phrase to select and simplify
        #[arg(short, long)]
        select: String,
    },
    /// Test an API key against the generate endpoint
    Test {
        /// Key to test (defaults to the stored key)
        api_key: Option<String>,
    },
    /// Store the API key
    SetKey {
        api_key: String,
    },
    /// Show the stored API key, masked
    ShowKey,
    /// Write the current configuration to the config file
    Init,
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// The wired-up contexts for one invocation.
struct Extension {
    bus: MessageBus,
    router: Arc<BackgroundRouter>,
    settings: Arc<dyn SettingsStore>,
    tabs: Arc<PageTabs>,
}

impl Extension {
    fn start(config: &Config, settings: Arc<dyn SettingsStore>, tabs: PageTabs) -> Self {
        let tabs = Arc::new(tabs);
        let gateway: Arc<dyn TextGateway> = Arc::new(CohereClient::with_config(Arc::clone(&settings), config));
        let router = Arc::new(BackgroundRouter::new(
            Arc::clone(&settings),
            gateway,
            Arc::clone(&tabs) as Arc<dyn TabHost>,
        ));
        router.on_installed(&LoggedMenus);

        let (bus, rx) = MessageBus::channel();
        tokio::spawn(Arc::clone(&router).serve(rx));

        Self { bus, router, settings, tabs }
    }

    fn popup(&self) -> Popup {
        Popup::new(
            self.bus.clone(),
            Arc::clone(&self.settings),
            Arc::clone(&self.tabs) as Arc<dyn TabHost>,
            Arc::new(TerminalNotifier),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config);

    let settings: Arc<dyn SettingsStore> = match &cli.settings {
        Some(path) => Arc::new(FileSettings::new(path)),
        None => Arc::new(FileSettings::open_default()?),
    };

    match cli.command {
        Commands::Summarize { text } => summarize(&config, settings, &text).await,
        Commands::Page { file, title } => summarize_page(&config, settings, &file, &title).await?,
        Commands::Simplify { page, select } => simplify(&config, settings, &page, &select).await,
        Commands::Test { api_key } => test_key(&config, settings, api_key).await?,
        Commands::SetKey { api_key } => set_key(&config, settings, &api_key).await,
        Commands::ShowKey => show_key(&config, settings).await,
        Commands::Init => init_config(&config)?,
    }

    Ok(())
}

async fn summarize(config: &Config, settings: Arc<dyn SettingsStore>, text: &str) {
    let extension = Extension::start(config, settings, PageTabs::new());
    let mut popup = extension.popup();
    popup.input = text.to_string();

    println!("{}", SIMPLIFYING.dimmed());
    popup.submit().await;
    println!("{}", popup.output);
}

async fn summarize_page(config: &Config, settings: Arc<dyn SettingsStore>, file: &Path, title: &str) -> Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let extension = Extension::start(config, settings, PageTabs::new());

    println!("📄 Summarizing {}", title.bold().cyan());
    let reply = extension
        .bus
        .send_message(ActionMessage::summarize(title, &content))
        .await?;

    match reply {
        Some(ActionResponse {
            success: true,
            summary,
            simplified,
            ..
        }) => {
            println!("\n{}", "Summary:".bold().green());
            println!("{}", summary.unwrap_or_default());
            println!("\n{}", "Simplified:".bold().green());
            println!("{}", simplified.unwrap_or_default());
        }
        other => {
            println!("{}: {}", "Error".red(), ActionResponse::describe_error(other.as_ref()));
        }
    }

    Ok(())
}

async fn simplify(config: &Config, settings: Arc<dyn SettingsStore>, page: &str, phrase: &str) {
    let mut tabs = PageTabs::new();
    let mut document = Document::new(page);
    if !document.select_text(phrase) {
        println!("{} \"{}\" does not appear in the page", "Error:".red(), phrase);
        return;
    }
    let document = tabs.open(ACTIVE_TAB, document);

    let extension = Extension::start(config, settings, tabs);
    let click = MenuClick {
        menu_item_id: SIMPLIFY_MENU_ID.to_string(),
        selection_text: Some(phrase.to_string()),
    };
    extension.router.on_menu_clicked(&click, ACTIVE_TAB).await;
    extension.tabs.flush(ACTIVE_TAB).await;

    let document = document.lock().await;
    println!("{}", document.text());
    for marker in document.markers() {
        println!("  {} {} ({})", "•".green(), marker.text.bold(), marker.title.dimmed());
    }
}

async fn test_key(config: &Config, settings: Arc<dyn SettingsStore>, api_key: Option<String>) -> Result<()> {
    let api_key = match api_key {
        Some(key) => Some(key),
        None => settings.api_key().await?,
    };

    let extension = Extension::start(config, settings, PageTabs::new());
    let mut popup = extension.popup();
    popup.api_key_field = api_key.unwrap_or_default();

    println!("🔑 Testing API connection...");
    popup.test_connection().await;
    Ok(())
}

async fn set_key(config: &Config, settings: Arc<dyn SettingsStore>, api_key: &str) {
    let extension = Extension::start(config, settings, PageTabs::new());
    let mut popup = extension.popup();
    popup.api_key_field = api_key.to_string();
    popup.save_settings().await;
}

async fn show_key(config: &Config, settings: Arc<dyn SettingsStore>) {
    let extension = Extension::start(config, settings, PageTabs::new());
    let mut popup = extension.popup();
    popup.toggle_settings().await;

    if popup.api_key_field.is_empty() {
        println!("{}", "No API key set. Store one with: plainly set-key <key>".yellow());
    } else {
        println!("{}", mask(&popup.api_key_field).green());
    }
}

fn init_config(config: &Config) -> Result<()> {
    let path = config.save()?;
    println!("⚙️  Wrote config to {}", path.display().to_string().bold());
    Ok(())
}

/// Hide all but the last four characters. Short keys are hidden entirely.
fn mask(api_key: &str) -> String {
    let len = api_key.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let visible: String = api_key.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), visible)
}
