use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::db::{DbError, LabDb};
use crate::types::{Config, MAX_EXCLUSIVE_EDIT_MINUTES};

/// Shared handle for callers that serve more than one request: the loaded
/// configuration plus the single database connection.
pub struct AppState {
    pub config: Config,
    pub db: Mutex<LabDb>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, DbError> {
        let db = LabDb::open(&config)?;
        log::info!(
            "Opened lab database (lease length {} min)",
            config.exclusive_edit_minutes
        );
        Ok(Self {
            config,
            db: Mutex::new(db),
        })
    }

    /// Run `f` with exclusive access to the database.
    pub fn with_db<T>(&self, f: impl FnOnce(&LabDb) -> T) -> T {
        let guard = self.db.lock();
        f(&guard)
    }
}

/// Get the canonical config file path (~/.benchbook/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".benchbook").join("config.json"))
}

/// Load configuration from ~/.benchbook/config.json. A missing file yields
/// the defaults.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    if !(1..=MAX_EXCLUSIVE_EDIT_MINUTES).contains(&config.exclusive_edit_minutes) {
        return Err(format!(
            "exclusiveEditMinutes must be between 1 and {}, got {}",
            MAX_EXCLUSIVE_EDIT_MINUTES, config.exclusive_edit_minutes
        ));
    }

    Ok(config)
}

/// Write the config file, creating ~/.benchbook/ if needed.
pub fn save_config_to(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;

    Ok(())
}
