//! Project and user configuration.
//!
//! Project settings live in `.tack/config.toml` next to the store; user
//! settings live in `<config_dir>/tack/config.toml`. Missing files yield
//! defaults. Unknown keys are ignored so older binaries can read newer
//! files.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TackError};
use crate::order::{OutOfRangePolicy, UnknownItemPolicy};

/// Directory holding the store and project config, relative to the root.
pub const DATA_DIR: &str = ".tack";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub moves: MoveConfig,
    #[serde(default)]
    pub reorder: ReorderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a writer waits on the SQLite lock before giving up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveConfig {
    /// Extra attempts after a busy conflict before the error is surfaced.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            out_of_range: OutOfRangePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderConfig {
    #[serde(default)]
    pub unknown_items: UnknownItemPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Default identity when neither `--user` nor `TACK_USER` is set.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

/// Path of the project config under `root`.
#[must_use]
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join("config.toml")
}

/// Load `.tack/config.toml` under `root`, or defaults if absent.
///
/// # Errors
///
/// Returns [`TackError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load_project_config(root: &Path) -> Result<ProjectConfig> {
    read_toml(&project_config_path(root))
}

/// Load the per-user config, or defaults if absent.
///
/// # Errors
///
/// Returns [`TackError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    read_toml(&config_dir.join("tack/config.toml"))
}

fn read_toml<T>(path: &Path) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| TackError::Config {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    toml::from_str(&content).map_err(|err| TackError::Config {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Pick the output mode: `--json`, then `FORMAT`, then the user config,
/// then `pretty` on a terminal and `text` otherwise.
#[must_use]
pub fn resolve_output(
    cli_json: bool,
    env_format: Option<&str>,
    user_output: Option<&str>,
) -> &'static str {
    fn normalize(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json";
    }
    if let Some(mode) = env_format.and_then(normalize) {
        return mode;
    }
    if let Some(mode) = user_output.and_then(normalize) {
        return mode;
    }
    if std::io::stdout().is_terminal() {
        "pretty"
    } else {
        "text"
    }
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_max_conflict_retries() -> u32 {
    2
}
