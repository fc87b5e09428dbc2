//! Persistence backends and on-disk state for InvKeeper.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ik_core::{CoreError, CoreResult, InventoryStore};

mod accounts;
mod document;
mod prefs;
mod sqlite;

pub use accounts::AccountStore;
pub use document::{DocumentStore, COLLECTION};
pub use prefs::FilePreferences;
pub use sqlite::{SqliteStore, SCHEMA_VERSION};

/// Default directory name for application data.
pub const DATA_DIR_NAME: &str = "invkeeper";
/// Preference scope holding the session flag.
pub const SESSION_PREFS: &str = "user_session";
/// Preference scope holding widget visibility flags.
pub const WIDGET_PREFS: &str = "inventory_widget_prefs";

const CONFIG_FILE_NAME: &str = "config.yaml";
const DATABASE_FILE_NAME: &str = "inventory.db";
const ACCOUNTS_FILE_NAME: &str = "accounts.yaml";
const LOG_FILE_NAME: &str = "invkeeper.log";

/// Shared handle to whichever inventory backend is active.
pub type SharedStore = Arc<dyn InventoryStore + Send + Sync>;

/// Which inventory backend to compose the application with.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Embedded relational store.
    #[default]
    Local,
    /// Document collection keyed by item code.
    Document,
}

impl Backend {
    /// Config and environment spelling of the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Document => "document",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match ik_utils::normalize_key(value).as_str() {
            "local" | "sqlite" => Ok(Backend::Local),
            "document" | "remote" => Ok(Backend::Document),
            other => Err(CoreError::Validation(format!("unknown backend `{other}`"))),
        }
    }
}

/// Application data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Create a handle rooted at the provided path.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve the default data path (~/.invkeeper).
    pub fn default_path() -> CoreResult<PathBuf> {
        if let Some(dir) = dirs::home_dir() {
            return Ok(dir.join(format!(".{DATA_DIR_NAME}")));
        }
        Err(CoreError::Storage(
            "unable to determine a default data path".into(),
        ))
    }

    /// Check if the directory has been initialized.
    pub fn exists(&self) -> bool {
        self.root.exists() && self.prefs_root().exists()
    }

    /// Create the directory layout.
    pub fn init(&self) -> CoreResult<()> {
        if self.exists() {
            return Ok(());
        }
        fs::create_dir_all(self.prefs_root())
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        fs::create_dir_all(self.collections_root())
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(())
    }

    fn prefs_root(&self) -> PathBuf {
        self.root.join("prefs")
    }

    fn collections_root(&self) -> PathBuf {
        self.root.join("collections")
    }

    /// Path of the relational database file.
    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE_NAME)
    }

    /// Path of the log file used while the TUI owns the terminal.
    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    /// Open the inventory backend selected for this run.
    pub fn open_store(&self, backend: Backend) -> CoreResult<SharedStore> {
        tracing::debug!(backend = %backend, root = %self.root.display(), "opening inventory store");
        match backend {
            Backend::Local => Ok(Arc::new(SqliteStore::open(&self.database_path())?)),
            Backend::Document => Ok(Arc::new(DocumentStore::new(self.collections_root()))),
        }
    }

    /// Preferences holding the session flag.
    pub fn session_prefs(&self) -> FilePreferences {
        FilePreferences::new(self.prefs_root(), SESSION_PREFS)
    }

    /// Preferences holding widget visibility flags.
    pub fn widget_prefs(&self) -> FilePreferences {
        FilePreferences::new(self.prefs_root(), WIDGET_PREFS)
    }

    /// Local identity provider.
    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.root.join(ACCOUNTS_FILE_NAME))
    }
}

/// Persisted user configuration.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Data directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Backend override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
}

fn config_path() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(DATA_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    Err(CoreError::Storage(
        "unable to determine config directory".into(),
    ))
}

pub fn load_config() -> CoreResult<StoreConfig> {
    let path = config_path()?;
    let config = ik_utils::read_yaml(&path).map_err(|err| CoreError::Storage(err.to_string()))?;
    Ok(config.unwrap_or_default())
}

pub fn save_config(config: &StoreConfig) -> CoreResult<()> {
    let path = config_path()?;
    ik_utils::write_yaml(&path, config).map_err(|err| CoreError::Storage(err.to_string()))
}

/// Remember the data directory and backend chosen at init.
pub fn set_config(path: &Path, backend: Backend) -> CoreResult<()> {
    let config = StoreConfig {
        path: Some(path.to_string_lossy().to_string()),
        backend: Some(backend),
    };
    save_config(&config)
}

pub fn resolve_data_path() -> CoreResult<PathBuf> {
    let config = load_config()?;
    data_path_from(std::env::var("INVKEEPER_PATH").ok(), &config)
}

pub fn resolve_backend() -> CoreResult<Backend> {
    let config = load_config()?;
    backend_from(std::env::var("INVKEEPER_BACKEND").ok(), &config)
}

fn data_path_from(env: Option<String>, config: &StoreConfig) -> CoreResult<PathBuf> {
    if let Some(value) = env {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    if let Some(path) = &config.path {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    DataDir::default_path()
}

fn backend_from(env: Option<String>, config: &StoreConfig) -> CoreResult<Backend> {
    if let Some(value) = env {
        if !value.trim().is_empty() {
            return value.parse();
        }
    }
    Ok(config.backend.unwrap_or_default())
}
