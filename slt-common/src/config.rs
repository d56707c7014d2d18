//! Configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config file (`~/.config/slt/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not fatal: a warning is logged and compiled
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SLT_CONFIG";

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";

/// Default timeout for media downloads
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 30;

/// Sessions untouched for this long are dropped
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 2 * 60 * 60;

/// Default cap on concurrently open sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Where submitted rows go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Local append-only SQLite table
    Sqlite { path: PathBuf },
    /// Google Sheets `values:append`
    Sheets {
        spreadsheet_id: String,
        /// A1 range naming the target sheet, e.g. `Sheet1`
        #[serde(default = "default_sheet_range")]
        range: String,
        /// Service-account JSON key; tokens are minted and refreshed from it
        #[serde(default)]
        credentials_path: Option<PathBuf>,
        /// Environment variable holding a fixed bearer token, used only when
        /// no `credentials_path` is given
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_sheet_range() -> String {
    "Sheet1".to_string()
}

fn default_token_env() -> String {
    "SLT_SHEETS_TOKEN".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Sqlite {
            path: default_data_folder().join("responses.db"),
        }
    }
}

/// Service configuration (TOML)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub bind_addr: String,
    /// Catalog file; the built-in catalog is used when absent
    pub catalog_path: Option<PathBuf>,
    pub sink: SinkConfig,
    pub media_timeout_secs: u64,
    /// Idle time after which an unsubmitted session is discarded
    pub session_idle_secs: u64,
    pub max_sessions: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            catalog_path: None,
            sink: SinkConfig::default(),
            media_timeout_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SurveyConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration, falling back to defaults when no file is available
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Config file not found: {} (using compiled defaults)",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Resolve the config file path
///
/// Returns `None` when neither argument nor environment names a file and no
/// user config file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config file
    user_config_path().filter(|p| p.exists())
}

/// `~/.config/slt/config.toml` (platform equivalent elsewhere)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("slt").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("slt"))
        .unwrap_or_else(|| PathBuf::from("./slt_data"))
}
