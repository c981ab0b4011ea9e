//! Error type definitions.
//!
//! This module defines the error enums for every boundary of the gateway and
//! the event kinds counted by `GatewayStats`.

use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::session::UplinkState;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the logger with custom message (e.g., file creation).
    #[error("Logger initialization error: {0}")]
    LoggerSetupError(String),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// A configuration value that parsed but is not acceptable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid configuration value for '{field}': {message}")]
pub struct ConfigValidationError {
    /// Dotted path of the offending key, e.g. `settings.timezone`
    pub field: &'static str,
    /// What is wrong and what is expected
    pub message: String,
}

impl ConfigValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Error types for loading the configuration file. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML, missing keys or mistyped values.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A value failed validation.
    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
}

/// Error types for the binary frame codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer does not start with the data-frame magic.
    #[error("bad frame magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// The payload is not valid UTF-8.
    #[error("frame payload is not valid UTF-8: {0}")]
    InvalidUtf8(std::str::Utf8Error),

    /// The payload does not fit the 32-bit length field.
    #[error("frame payload of {0} bytes exceeds the length field")]
    PayloadTooLarge(usize),
}

/// A CAMEA query that cannot be turned into a `DetectionRequest`.
///
/// These are logged and the query is dropped; the session continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The record carries no `msg:DetectionRequest`.
    #[error("not a DetectionRequest")]
    NotADetectionRequest,

    /// A required key is absent or empty.
    #[error("missing {0} in the DetectionRequest")]
    MissingField(&'static str),

    /// `ImageTime` does not follow `YYYYMMDDTHHMMSSffffff±HHMM`.
    #[error("incorrect datetime in the DetectionRequest: {0}")]
    InvalidImageTime(String),

    /// `ToleranceMS` is not an integer.
    #[error("incorrect ToleranceMS in the DetectionRequest: {0}")]
    InvalidTolerance(String),
}

/// Error types for the Vidar HTTP/XML API.
#[derive(Error, Debug)]
pub enum VidarError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("Vidar request failed: {0}")]
    Http(#[from] ReqwestError),

    /// Vidar answered with a non-success status.
    #[error("Vidar answered {status} for {url}")]
    Status { status: u16, url: String },

    /// The XML body is missing an expected element or value.
    #[error("malformed Vidar response: {0}")]
    MalformedResponse(String),

    /// No record exists for the requested id.
    #[error("Vidar has no record with id {0}")]
    NotFound(String),
}

impl VidarError {
    /// Whether repeating the same request might succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            VidarError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            VidarError::Status { status, .. } => (500..600).contains(status),
            VidarError::MalformedResponse(_) | VidarError::NotFound(_) => false,
        }
    }
}

/// Error types for the outbound uplink to the CAMEA image store.
#[derive(Error, Debug)]
pub enum UplinkError {
    /// A send was attempted while the uplink is not `Ready`.
    #[error("uplink is not ready (state: {0:?})")]
    NotReady(UplinkState),

    /// The image store did not answer the handshake in time.
    #[error("image store did not answer the handshake within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// The image store closed the connection.
    #[error("image store closed the connection")]
    Closed,

    /// Socket error.
    #[error("uplink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound message could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Events counted over the gateway's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum GatewayEvent {
    /// A CAMEA session was accepted
    InboundSession,
    /// A DetectionRequest was parsed
    RequestReceived,
    /// A record looked like a request but could not be parsed
    MalformedQuery,
    /// A capture matched and both responses were built
    MatchFound,
    /// Nothing matched; a NULL ack was sent
    MatchNotFound,
    /// A Vidar lookup failed and was degraded to not-found
    VidarFailure,
    /// A frame could not be delivered to CAMEA
    SendFailure,
    /// The uplink rebuilt its connection
    UplinkReconnect,
}

impl std::fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEvent::InboundSession => "CAMEA sessions accepted",
            GatewayEvent::RequestReceived => "Detection requests",
            GatewayEvent::MalformedQuery => "Malformed queries",
            GatewayEvent::MatchFound => "Matches found",
            GatewayEvent::MatchNotFound => "Not found",
            GatewayEvent::VidarFailure => "Vidar failures",
            GatewayEvent::SendFailure => "Send failures",
            GatewayEvent::UplinkReconnect => "Uplink reconnects",
        }
    }
}
