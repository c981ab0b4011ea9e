//! Application configuration and constants.
//!
//! This module provides:
//! - Protocol and timer constants
//! - CLI option types and parsing
//! - The YAML-backed gateway configuration and its validation

mod constants;
#[cfg(test)]
pub(crate) mod test_helpers;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{
    CameaDbConfig, Command, GatewayConfig, LogFormat, LogLevel, Mode, Opt, ServiceConfig,
    SettingsConfig, VidarConfig,
};
