//! Bootstrap configuration loading and root folder resolution
//!
//! Configuration file priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `~/.config/pmon/config.toml` if present
//! 4. Built-in defaults
//!
//! Every field has a default, so a missing file is never fatal.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PMON_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "PMON_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database, snapshot and reports (relative paths resolve here)
    pub root_folder: Option<PathBuf>,

    /// SQLite database file
    pub database_path: PathBuf,

    /// HTTP trigger port
    pub port: u16,

    pub logging: LoggingConfig,

    /// Remote document store holding parsed recipes; absent means snapshot only
    pub document_store: Option<DocumentStoreConfig>,

    /// Local recipe snapshot used when the document store is unavailable
    pub snapshot_path: PathBuf,

    /// Directory receiving `weekly_report_YYYYMMDD.json` artifacts
    pub reports_dir: PathBuf,

    pub accuracy: AccuracyConfig,

    pub report: ReportConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: PathBuf::from("monitoring.db"),
            port: 5790,
            logging: LoggingConfig::default(),
            document_store: None,
            snapshot_path: PathBuf::from("data/recent_recipes.json"),
            reports_dir: PathBuf::from("reports"),
            accuracy: AccuracyConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Firestore-compatible document store holding parsed recipes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// REST root, e.g. `https://firestore.googleapis.com/v1`
    #[serde(default = "default_document_store_url")]
    pub base_url: String,

    pub project_id: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Pre-issued OAuth bearer token (optional)
    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_document_store_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_collection() -> String {
    "test_parsed_recipes".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Accuracy run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    /// Parser whose health record is updated
    pub parser_name: String,

    /// Most-recent recipes fetched as the sampling pool
    pub pool_size: usize,

    /// Recipes checked per run
    pub sample_size: usize,

    /// Minimum delay after each live fetch
    pub pacing_secs: f64,

    pub fetch_timeout_secs: u64,

    /// CSS selector marking ingredient lines on live pages
    pub ingredient_selector: String,

    pub user_agent: String,

    /// Advisory cadence written to `next_run`
    pub next_run_interval_days: i64,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            parser_name: "allrecipes".to_string(),
            pool_size: 30,
            sample_size: 5,
            pacing_secs: 2.0,
            fetch_timeout_secs: default_request_timeout_secs(),
            ingredient_selector: "[data-ingredient]".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            next_run_interval_days: 7,
        }
    }
}

/// Weekly report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Parsers scoring below this accuracy are reported as failing
    pub failing_threshold: f64,

    pub window_days: i64,

    /// Most frequent error messages kept per parser
    pub top_issues_per_parser: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            failing_threshold: 90.0,
            window_days: 7,
            top_issues_per_parser: 5,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from the resolved file, or defaults when none exists
    ///
    /// Returns the file that was read alongside the configuration. Nothing is
    /// logged here: this runs before the subscriber that the configuration
    /// itself sets up.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match config_file_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Resolve a configured path against the root folder
    pub fn resolve_path(&self, root_folder: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root_folder.join(path)
        }
    }
}

/// Locate the configuration file
///
/// An explicit CLI or environment path is returned even if it does not exist,
/// so that the subsequent load reports the bad path instead of silently
/// falling back to defaults.
pub fn config_file_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("pmon").join("config.toml"))
        .filter(|p| p.exists())
}

/// Root folder resolution:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("pmon"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pmon"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("pmon"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pmon"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("pmon"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pmon"))
    } else {
        PathBuf::from("./pmon_data")
    }
}
