//! Configuration system for the FitChat messaging server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/fitchat/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatConfigFile {
    server: ServerFileConfig,
    store: StoreFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    send_queue_capacity: Option<usize>,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    database: Option<PathBuf>,
    timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the messaging server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "FitChat messaging server")]
pub struct ChatCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "FITCHAT_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/fitchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[arg(long, env = "FITCHAT_DB")]
    pub database: Option<PathBuf>,

    /// Per-operation store timeout in milliseconds.
    #[arg(long)]
    pub store_timeout_ms: Option<u64>,

    /// Capacity of each connection's outbound event queue.
    #[arg(long)]
    pub send_queue_capacity: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "FITCHAT_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:3001`).
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub database: PathBuf,
    /// Per-operation store timeout in milliseconds.
    pub store_timeout_ms: u64,
    /// Capacity of each connection's outbound event queue.
    pub send_queue_capacity: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            database: PathBuf::from("fitchat.db"),
            store_timeout_ms: 5000,
            send_queue_capacity: 64,
            log_level: "info".to_string(),
        }
    }
}

impl ChatConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &ChatCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ChatConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &ChatCliArgs, file: &ChatConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            database: cli
                .database
                .clone()
                .or_else(|| file.store.database.clone())
                .unwrap_or(defaults.database),
            store_timeout_ms: cli
                .store_timeout_ms
                .or(file.store.timeout_ms)
                .unwrap_or(defaults.store_timeout_ms),
            send_queue_capacity: cli
                .send_queue_capacity
                .or(file.server.send_queue_capacity)
                .unwrap_or(defaults.send_queue_capacity),
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ChatConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ChatConfigFile::default());
        };
        config_dir.join("fitchat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChatConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
