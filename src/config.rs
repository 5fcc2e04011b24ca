//! Settings and their persistence

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::fs::sort::{SortDirection, SortField};
use crate::state::history::DEFAULT_HISTORY_LIMIT;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Default sorting for panes
    pub sorting: SortingConfig,
    /// Favorite directories, in display order
    #[serde(default)]
    pub favorites: Vec<FavoritePath>,
    /// Custom "open with" applications keyed by lowercase file extension
    #[serde(default)]
    pub open_with: BTreeMap<String, String>,
}

/// A favorite/bookmarked path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePath {
    /// Display name for the favorite
    pub name: String,
    /// Full path to the directory
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Reopen the last directories on startup
    pub remember_path: bool,
    pub last_left_path: Option<String>,
    pub last_right_path: Option<String>,
    /// How long a status message stays visible
    pub status_timeout_ms: u64,
    /// Directories remembered per pane for back/forward
    pub history_limit: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remember_path: true,
            last_left_path: None,
            last_right_path: None,
            status_timeout_ms: 3000,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            sorting: SortingConfig::default(),
            favorites: Vec::new(),
            open_with: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> AppResult<Self> {
        Ok(toml_edit::de::from_str(content)?)
    }

    /// Render as TOML. When `existing` is given, values are written into
    /// that document so user comments and layout survive.
    pub fn to_toml(&self, existing: Option<&str>) -> AppResult<String> {
        match existing.map(|s| s.parse::<toml_edit::DocumentMut>()) {
            Some(Ok(doc)) => Ok(self.update_document(doc)),
            _ => Ok(toml_edit::ser::to_string_pretty(self)?),
        }
    }

    fn update_document(&self, mut doc: toml_edit::DocumentMut) -> String {
        use toml_edit::{Item, Table, value};

        if !doc.contains_table("general") {
            doc["general"] = Item::Table(Table::new());
        }
        let general = &mut doc["general"];
        general["remember_path"] = value(self.general.remember_path);
        general["status_timeout_ms"] = value(self.general.status_timeout_ms as i64);
        general["history_limit"] = value(self.general.history_limit as i64);
        match &self.general.last_left_path {
            Some(p) => general["last_left_path"] = value(p.as_str()),
            None => {
                if let Some(t) = general.as_table_mut() {
                    t.remove("last_left_path");
                }
            }
        }
        match &self.general.last_right_path {
            Some(p) => general["last_right_path"] = value(p.as_str()),
            None => {
                if let Some(t) = general.as_table_mut() {
                    t.remove("last_right_path");
                }
            }
        }

        if !doc.contains_table("sorting") {
            doc["sorting"] = Item::Table(Table::new());
        }
        doc["sorting"]["field"] = value(sort_field_name(self.sorting.field));
        doc["sorting"]["direction"] = value(match self.sorting.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        });

        let mut favorites = toml_edit::ArrayOfTables::new();
        for fav in &self.favorites {
            let mut tbl = Table::new();
            tbl["name"] = value(fav.name.as_str());
            tbl["path"] = value(fav.path.as_str());
            favorites.push(tbl);
        }
        doc.remove("favorites");
        if !favorites.is_empty() {
            doc.insert("favorites", Item::ArrayOfTables(favorites));
        }

        let mut open_with = Table::new();
        for (ext, app) in &self.open_with {
            open_with[ext.as_str()] = value(app.as_str());
        }
        doc.remove("open_with");
        if !open_with.is_empty() {
            doc.insert("open_with", Item::Table(open_with));
        }

        doc.to_string()
    }

    /// Application registered for a file extension (case-insensitive)
    pub fn open_with_for(&self, extension: &str) -> Option<&str> {
        self.open_with
            .get(&extension.to_lowercase())
            .map(|s| s.as_str())
    }
}

fn sort_field_name(field: SortField) -> &'static str {
    match field {
        SortField::Name => "name",
        SortField::Size => "size",
        SortField::Modified => "modified",
        SortField::Extension => "extension",
    }
}

/// Get the config directory path for the current platform
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // Windows: %APPDATA%\commander
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("commander"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        // XDG_CONFIG_HOME first, then ~/.config
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
            .map(|p| p.join("commander"))
    }
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Persistence collaborator for settings
pub trait SettingsStore: Send {
    /// Load settings, falling back to defaults when nothing usable is stored
    fn load(&self) -> Config;

    fn save(&self, config: &Config) -> AppResult<()>;
}

/// Settings stored in a TOML file
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the platform default location
    pub fn default_location() -> AppResult<Self> {
        config_file()
            .map(Self::new)
            .ok_or_else(|| AppError::Config("Could not determine config directory".to_string()))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Config {
        match fs::read_to_string(&self.path) {
            Ok(content) => match Config::from_toml(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "could not parse settings, using defaults");
                    Config::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read settings, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, config: &Config) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let existing = fs::read_to_string(&self.path).ok();
        let content = config.to_toml(existing.as_deref())?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Settings kept in memory only
#[derive(Default)]
pub struct MemorySettingsStore {
    config: Mutex<Config>,
    saves: Mutex<usize>,
}

impl MemorySettingsStore {
    pub fn new(config: Config) -> Self {
        Self {
            config: Mutex::new(config),
            saves: Mutex::new(0),
        }
    }

    /// Latest saved settings
    pub fn snapshot(&self) -> Config {
        self.config.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Config {
        self.snapshot()
    }

    fn save(&self, config: &Config) -> AppResult<()> {
        let mut stored = self
            .config
            .lock()
            .map_err(|_| AppError::Config("settings lock poisoned".to_string()))?;
        *stored = config.clone();
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }
}
