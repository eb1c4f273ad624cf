use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Storage key for the Cohere API credential.
pub const API_KEY_SETTING: &str = "cohere_api_key";

/// Key/value persistence shared by every context. Last write wins.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// The stored credential. An empty string counts as unconfigured.
    async fn api_key(&self) -> Result<Option<String>> {
        Ok(self.get(API_KEY_SETTING).await?.filter(|key| !key.is_empty()))
    }

    async fn set_api_key(&self, api_key: &str) -> Result<()> {
        self.set(API_KEY_SETTING, api_key).await
    }
}

/// Settings kept in a JSON object on disk.
pub struct FileSettings {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Open the settings file in the user's config directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::get_settings_path()?))
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(BTreeMap::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let values = serde_json::from_str(&content)?;
        Ok(values)
    }

    fn get_settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("plainly").join("settings.json"))
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.read_all().await?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());

        // Create settings directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&values)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// In-process settings, for tests and hosts without a config directory.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(api_key: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(API_KEY_SETTING.to_string(), api_key.to_string());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
