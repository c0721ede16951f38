//! Configuration module for the gopherd server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::gopher::{ItemType, TypeMap};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the Gopher server
#[derive(Parser, Debug, Default)]
#[command(name = "gopherd")]
#[command(author = "gopherd authors")]
#[command(version = "0.1.0")]
#[command(about = "A Gopher server for a directory tree", long_about = None)]
pub struct CliArgs {
    /// Directory to serve
    pub root: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hostname used in menu links
    #[arg(long)]
    pub host: Option<String>,

    /// Address to listen on
    #[arg(short, long)]
    pub address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait for the selector line (0 = no limit)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Seconds allowed for writing a response (0 = no limit)
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Always use the buffered copy path for files
    #[arg(long)]
    pub no_sendfile: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extension to item type code, e.g. `md = "0"`
    #[serde(default)]
    pub types: HashMap<String, String>,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Hostname advertised in menus
    #[serde(default = "default_host")]
    pub host: String,
    /// Address to bind to
    #[serde(default = "default_address")]
    pub address: String,
    /// Port to bind to and advertise
    #[serde(default = "default_port")]
    pub port: u16,
    /// Content root
    pub root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            address: default_address(),
            port: default_port(),
            root: None,
        }
    }
}

/// Per-connection deadlines in seconds
#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_read_timeout")]
    pub read: u64,
    #[serde(default = "default_write_timeout")]
    pub write: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read: default_read_timeout(),
            write: default_write_timeout(),
        }
    }
}

/// File transfer configuration
#[derive(Debug, Deserialize)]
pub struct TransferConfig {
    /// Use zero-copy transfer where the platform supports it
    #[serde(default = "default_sendfile")]
    pub sendfile: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            sendfile: default_sendfile(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    70
}

fn default_read_timeout() -> u64 {
    30
}

fn default_write_timeout() -> u64 {
    60
}

fn default_sendfile() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration, immutable once the server starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname written into every menu entry
    pub host: String,
    pub address: String,
    pub port: u16,
    /// Absolute content root without a trailing separator
    pub root: PathBuf,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub sendfile: bool,
    pub types: TypeMap,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let root = cli
            .root
            .or(toml_config.server.root)
            .ok_or(ConfigError::MissingRoot)?;
        let root = resolve_root(root)?;

        let mut overrides = Vec::with_capacity(toml_config.types.len());
        for (extension, code) in toml_config.types {
            let item_type = parse_item_type(&code).ok_or_else(|| ConfigError::InvalidItemType {
                extension: extension.clone(),
                code: code.clone(),
            })?;
            overrides.push((extension, item_type));
        }

        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            address: cli.address.unwrap_or(toml_config.server.address),
            port: cli.port.unwrap_or(toml_config.server.port),
            root,
            read_timeout: timeout_from_secs(
                cli.read_timeout.unwrap_or(toml_config.timeouts.read),
            ),
            write_timeout: timeout_from_secs(
                cli.write_timeout.unwrap_or(toml_config.timeouts.write),
            ),
            sendfile: !cli.no_sendfile && toml_config.transfer.sendfile,
            types: TypeMap::with_overrides(overrides),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// `address:port` as shown in logs
    pub fn listen_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Make the root absolute, drop any trailing separator and require a directory.
fn resolve_root(root: PathBuf) -> Result<PathBuf, ConfigError> {
    let resolved =
        std::fs::canonicalize(&root).map_err(|e| ConfigError::RootUnreadable(root.clone(), e))?;
    if !resolved.is_dir() {
        return Err(ConfigError::RootNotDirectory(root));
    }
    Ok(resolved)
}

fn parse_item_type(code: &str) -> Option<ItemType> {
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ItemType::from_code(c),
        _ => None,
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, toml::de::Error),
    #[error("No content root given")]
    MissingRoot,
    #[error("Content root '{}' is not accessible: {}", .0.display(), .1)]
    RootUnreadable(PathBuf, std::io::Error),
    #[error("Content root '{}' is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("Invalid item type '{code}' for extension '{extension}'")]
    InvalidItemType { extension: String, code: String },
}
