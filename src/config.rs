//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$FAMARCHIVE_CONFIG` (environment variable)
//! 2. `~/.config/famarchive/config.toml` (Linux/macOS)
//!    `%APPDATA%\famarchive\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sync::SyncLimits;

/// Environment variable that overrides `enrichment.api_key`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Default viewer identity for the CLI.
    pub identity: IdentityConfig,
    /// Upload and quota limits.
    pub limits: LimitsConfig,
    /// AI enrichment endpoint.
    pub enrichment: EnrichmentConfig,
    /// Listing settings.
    pub display: DisplayConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory holding the local catalog, blobs and logs.
    pub data_dir: Option<PathBuf>,
    /// `strftime` format string for dates in listings.
    pub date_format: String,
}

/// Who the CLI acts as when `--user`/`--email` are not given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Upload and quota limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-file cap in bytes (default: 10 MiB).
    pub max_file_size: u64,
    /// Cap on the combined size of one upload batch (default: 50 MiB).
    pub max_item_upload: u64,
    /// Storage quota shown to users (default: 5 GiB).
    pub storage_quota: u64,
    /// Fraction of the quota at which usage is highlighted.
    pub quota_warning_threshold: f64,
}

/// AI enrichment endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Transcribe documents and describe images on upload.
    pub enabled: bool,
    /// API base URL (without `/models/...`).
    pub api_url: String,
    /// Model name.
    pub model: String,
    /// API key. `$GEMINI_API_KEY` takes precedence.
    pub api_key: Option<String>,
    /// Base request timeout; scaled up for large files.
    pub timeout_secs: u64,
}

/// Listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Items per page in `list`.
    pub page_size: usize,
    /// Number of items in the "recent" view.
    pub recent_limit: usize,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default export format: "csv" or "sql".
    pub default_format: String,
    /// Default output directory.
    pub default_output_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * MIB,
            max_item_upload: 50 * MIB,
            storage_quota: 5 * GIB,
            quota_warning_threshold: 0.8,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            recent_limit: 10,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: "csv".to_string(),
            default_output_dir: None,
        }
    }
}

impl LimitsConfig {
    /// The limits the synchronizer enforces before uploading.
    pub fn sync_limits(&self) -> SyncLimits {
        SyncLimits {
            max_file_size: self.max_file_size,
            max_item_upload: self.max_item_upload,
        }
    }
}

impl EnrichmentConfig {
    /// API key from the environment, else from the file. Blank keys count
    /// as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("FAMARCHIVE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("famarchive").join("config.toml"))
}

/// Return the data directory for the local catalog, blobs and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("famarchive")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("famarchive.log")
}
