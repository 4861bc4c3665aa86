//! Configuration file management for the exporter.
//!
//! Settings come from three places, later ones winning:
//!
//! 1. Default values
//! 2. Configuration file (given with `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! cert_dir = "/etc/letsencrypt/live"
//! output = "table"
//!
//! [server]
//! address = "0.0.0.0:9866"
//! scan_on_scrape = true
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [push]
//! enabled = false
//! address = "http://localhost:9091"
//! job = "certbot_exporter"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub const DEFAULT_CERT_DIR: &str = "/etc/letsencrypt/live";
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:9866";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PUSH_ADDRESS: &str = "http://localhost:9091";
pub const DEFAULT_PUSH_JOB: &str = "certbot_exporter";

/// How the `scan` command prints its report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
}

/// Main configuration structure.
///
/// All fields are optional so that partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Certbot `live` directory holding one sub-directory per certificate
    pub cert_dir: Option<String>,
    /// Output format of the `scan` command
    pub output: Option<OutputFormat>,
    pub server: Option<ServerConfig>,
    pub logging: Option<LoggingConfig>,
    pub push: Option<PushConfig>,
}

/// Exposition server settings.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ServerConfig {
    /// Listen address, e.g. "0.0.0.0:9866"
    pub address: Option<String>,
    /// Rescan the store on every scrape of `/metrics`
    pub scan_on_scrape: Option<bool>,
    /// Seconds between background scans when `scan_on_scrape` is off
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: Option<String>,
    /// Emit JSON lines instead of compact text
    pub json: Option<bool>,
}

/// Prometheus Push Gateway settings used by `scan`.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PushConfig {
    pub enabled: Option<bool>,
    /// Push Gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
    pub job: Option<String>,
}

/// Fully resolved settings, produced by [`Config::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cert_dir: String,
    pub output: OutputFormat,
    pub address: SocketAddr,
    pub scan_on_scrape: bool,
    pub interval_secs: u64,
    pub log_level: String,
    pub log_json: bool,
    pub push: Option<PushTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushTarget {
    pub address: String,
    pub job: String,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Configuration with every default filled in.
    pub fn defaults() -> Self {
        Config {
            cert_dir: Some(DEFAULT_CERT_DIR.to_string()),
            output: Some(OutputFormat::Table),
            server: Some(ServerConfig {
                address: Some(DEFAULT_ADDRESS.to_string()),
                scan_on_scrape: Some(true),
                interval_secs: Some(DEFAULT_INTERVAL_SECS),
            }),
            logging: Some(LoggingConfig {
                level: Some("info".to_string()),
                json: Some(false),
            }),
            push: Some(PushConfig {
                enabled: Some(false),
                address: Some(DEFAULT_PUSH_ADDRESS.to_string()),
                job: Some(DEFAULT_PUSH_JOB.to_string()),
            }),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// A field set in `other` replaces the one in `self`; unset fields keep
    /// the current value.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.cert_dir.is_some() {
            self.cert_dir = other.cert_dir;
        }
        if other.output.is_some() {
            self.output = other.output;
        }

        if let Some(other_server) = other.server {
            let server = self.server.get_or_insert_with(ServerConfig::default);
            if other_server.address.is_some() {
                server.address = other_server.address;
            }
            if other_server.scan_on_scrape.is_some() {
                server.scan_on_scrape = other_server.scan_on_scrape;
            }
            if other_server.interval_secs.is_some() {
                server.interval_secs = other_server.interval_secs;
            }
        }

        if let Some(other_logging) = other.logging {
            let logging = self.logging.get_or_insert_with(LoggingConfig::default);
            if other_logging.level.is_some() {
                logging.level = other_logging.level;
            }
            if other_logging.json.is_some() {
                logging.json = other_logging.json;
            }
        }

        if let Some(other_push) = other.push {
            let push = self.push.get_or_insert_with(PushConfig::default);
            if other_push.enabled.is_some() {
                push.enabled = other_push.enabled;
            }
            if other_push.address.is_some() {
                push.address = other_push.address;
            }
            if other_push.job.is_some() {
                push.job = other_push.job;
            }
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only the arguments that were given (Some values) override other
    /// configurations.
    pub fn from_cli_args(
        cert_dir: Option<String>,
        output: Option<OutputFormat>,
        address: Option<String>,
        log_level: Option<String>,
        log_json: Option<bool>,
        push: Option<bool>,
        push_address: Option<String>,
    ) -> Self {
        Config {
            cert_dir,
            output,
            server: Some(ServerConfig {
                address,
                scan_on_scrape: None,
                interval_secs: None,
            }),
            logging: Some(LoggingConfig {
                level: log_level,
                json: log_json,
            }),
            push: Some(PushConfig {
                enabled: push,
                address: push_address,
                job: None,
            }),
        }
    }

    /// Checks the merged configuration and resolves it into [`Settings`].
    ///
    /// Missing values fall back to the defaults.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let defaults = Config::defaults().merge_with(self.clone());
        let server = defaults.server.unwrap_or_default();
        let logging = defaults.logging.unwrap_or_default();
        let push = defaults.push.unwrap_or_default();

        let cert_dir = defaults.cert_dir.unwrap_or_default();
        if cert_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cert_dir must not be empty".to_string(),
            ));
        }

        let raw_address = server
            .address
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let address: SocketAddr = raw_address.parse().map_err(|e| {
            ConfigError::Validation(format!("invalid server address '{}': {}", raw_address, e))
        })?;

        let interval_secs = server.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be greater than zero".to_string(),
            ));
        }

        let push = if push.enabled.unwrap_or(false) {
            Some(PushTarget {
                address: push
                    .address
                    .unwrap_or_else(|| DEFAULT_PUSH_ADDRESS.to_string()),
                job: push.job.unwrap_or_else(|| DEFAULT_PUSH_JOB.to_string()),
            })
        } else {
            None
        };

        Ok(Settings {
            cert_dir,
            output: defaults.output.unwrap_or(OutputFormat::Table),
            address,
            scan_on_scrape: server.scan_on_scrape.unwrap_or(true),
            interval_secs,
            log_level: logging.level.unwrap_or_else(|| "info".to_string()),
            log_json: logging.json.unwrap_or(false),
            push,
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config::defaults();
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (empty fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}
