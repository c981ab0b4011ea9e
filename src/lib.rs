//! camea_gateway library: a protocol gateway between CAMEA and a Vidar ANPR camera.
//!
//! CAMEA asks over a binary-framed TCP link whether a vehicle was seen around
//! a given time. The gateway looks the time up in the Vidar camera's capture
//! log, acknowledges the request on the same link and pushes the matching
//! images to the CAMEA image store over a second, persistent link.
//!
//! # Example
//!
//! ```no_run
//! use camea_gateway::{run_gateway, GatewayConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::load("config.yaml")?;
//! let report = run_gateway(config).await?;
//! println!("Answered {} requests ({} found)", report.requests, report.found);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

pub mod config;
pub mod correlator;
pub mod error_handling;
pub mod gateway;
pub mod image_generator;
pub mod initialization;
pub mod protocol;
pub mod session;
pub mod vidar;

// Re-export public API
pub use config::{Command, GatewayConfig, LogFormat, LogLevel, Mode, Opt};
pub use gateway::{run_gateway, Gateway, GatewayReport, MessageIdSequence};
