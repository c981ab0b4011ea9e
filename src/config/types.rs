//! Configuration types and CLI options.
//!
//! This module defines the enums and structs used for command-line argument
//! parsing and the file-backed gateway configuration.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::config::constants::{DEFAULT_CONFIG_PATH, MAX_TOLERANCE_MS, ZONE_FILTER_DISABLED};
use crate::error_handling::{ConfigError, ConfigValidationError};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "camea_gateway", version, about)]
pub struct Opt {
    /// Gateway configuration file (YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What the binary should do.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the gateway (default)
    Run,
    /// Query Vidar for a time window and print every candidate
    ProbeVidar {
        /// Center of the window, CAMEA format (YYYYMMDDTHHMMSSffffff+HHMM)
        #[arg(long)]
        time: String,
        /// Half-width of the window in milliseconds
        #[arg(long, default_value_t = 1000)]
        tolerance: i64,
    },
    /// Send one software trigger to the Vidar camera
    Trigger,
}

/// Where detection images come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Mode {
    /// Query the Vidar capture database
    #[serde(rename = "VIDAR")]
    Vidar,
    /// Answer every request with generated stub images
    #[serde(rename = "TEST")]
    Test,
}

/// `service` section: the inbound listener and gateway identity.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub module_id: String,
    pub mode: Mode,
    /// Minutes until an orderly shutdown; 0 runs until interrupted
    pub operating_time_minutes: u64,
    /// First message id put on the wire
    #[serde(default)]
    pub initial_message_id: u16,
}

/// `settings` section: socket and formatting parameters.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    /// Read buffer size for both sockets
    pub buffer_size: usize,
    /// IANA zone used for `TimeDet` and `UT`
    pub timezone: String,
    /// Inbound read timeout
    pub socket_timeout_seconds: u64,
    /// Prefix of large-detection image ids
    pub camera_unit_id: String,
}

/// `vidar` section: the camera capture database.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VidarConfig {
    pub ip: String,
    /// Search half-width; 0 defers to each request's `ToleranceMS`
    pub tolerance_ms: u64,
    /// `"0"` or a comma separated list of zone names
    pub zone_filter: String,
}

/// `camea_db` section: the CAMEA image store reached over the uplink.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameaDbConfig {
    pub ip: String,
    pub port: u16,
}

/// Complete gateway configuration as read from the YAML file.
///
/// # Examples
///
/// ```no_run
/// use camea_gateway::GatewayConfig;
///
/// let config = GatewayConfig::load("config.yaml").expect("valid configuration");
/// println!("listening on {}:{}", config.service.host, config.service.port);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub service: ServiceConfig,
    pub settings: SettingsConfig,
    pub vidar: VidarConfig,
    pub camea_db: CameaDbConfig,
}

impl GatewayConfig {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` for malformed YAML, missing or mistyped keys
    /// - `ConfigError::Invalid` if a value fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.service.host.trim().is_empty() {
            return Err(ConfigValidationError::new(
                "service.host",
                "must not be empty (use 0.0.0.0 to listen on all interfaces)",
            ));
        }
        if self.service.module_id.trim().is_empty() {
            return Err(ConfigValidationError::new(
                "service.module_id",
                "must not be empty",
            ));
        }
        if self.settings.buffer_size == 0 {
            return Err(ConfigValidationError::new(
                "settings.buffer_size",
                "must be greater than 0",
            ));
        }
        if self.settings.socket_timeout_seconds == 0 {
            return Err(ConfigValidationError::new(
                "settings.socket_timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.settings.timezone.parse::<Tz>().is_err() {
            return Err(ConfigValidationError::new(
                "settings.timezone",
                format!(
                    "'{}' is not an IANA time zone name (e.g. Europe/Kyiv)",
                    self.settings.timezone
                ),
            ));
        }
        if self.vidar.ip.trim().is_empty() && self.service.mode == Mode::Vidar {
            return Err(ConfigValidationError::new(
                "vidar.ip",
                "must not be empty in VIDAR mode",
            ));
        }
        if self.vidar.tolerance_ms > MAX_TOLERANCE_MS {
            return Err(ConfigValidationError::new(
                "vidar.tolerance_ms",
                format!("must not exceed {} ms", MAX_TOLERANCE_MS),
            ));
        }
        if self.camea_db.ip.trim().is_empty() {
            return Err(ConfigValidationError::new("camea_db.ip", "must not be empty"));
        }
        Ok(())
    }

    /// Configured time zone. Falls back to UTC only if `validate` was skipped.
    pub fn timezone(&self) -> Tz {
        self.settings.timezone.parse().unwrap_or(Tz::UTC)
    }

    /// Zones accepted by the candidate filter, `None` when filtering is off.
    pub fn zone_filter(&self) -> Option<Vec<String>> {
        let raw = self.vidar.zone_filter.trim();
        if raw.is_empty() || raw == ZONE_FILTER_DISABLED {
            return None;
        }
        Some(
            raw.split(',')
                .map(|z| z.trim().to_string())
                .filter(|z| !z.is_empty())
                .collect(),
        )
    }

    /// `host:port` of the inbound listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }

    /// `ip:port` of the CAMEA image store.
    pub fn uplink_addr(&self) -> String {
        format!("{}:{}", self.camea_db.ip, self.camea_db.port)
    }
}
