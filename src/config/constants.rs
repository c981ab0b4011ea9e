//! Configuration constants.
//!
//! This module defines the protocol constants and operational parameters
//! used throughout the gateway: timer cadences, timeouts, retry policy and
//! the markers that delimit inbound records.

use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// Timers
/// Keep-alive cadence on both the inbound session and the uplink.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
/// How long the uplink waits for the image store's handshake answer.
///
/// The image store answers immediately in practice; the bound exists so a
/// silent peer cannot wedge the uplink forever.
pub const UPLINK_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// TCP connect timeout for the uplink.
pub const UPLINK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Delay between failed uplink connect attempts.
pub const UPLINK_RECONNECT_DELAY: Duration = Duration::from_secs(1);

// Vidar HTTP access
/// Per-request timeout for the Vidar HTTP API in seconds
pub const VIDAR_HTTP_TIMEOUT_SECS: u64 = 5;
/// User-Agent sent to the Vidar HTTP API
pub const VIDAR_USER_AGENT: &str = concat!("camea_gateway/", env!("CARGO_PKG_VERSION"));

// Retry strategy (Vidar lookups)
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 100;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 1;
/// Number of retries after the initial attempt
pub const RETRY_MAX_ATTEMPTS: usize = 2;

// Inbound record framing
/// Leading markers of every message CAMEA can send: data frame, handshake, keep-alive.
pub const STREAM_MARKERS: [[u8; 4]; 3] = [*b"DAtP", *b"HSxx", *b"KAxx"];
/// `msg` value of a detection query.
pub const DETECTION_REQUEST_MSG: &str = "DetectionRequest";

// TEST mode stub data
/// Plate text reported for every request in TEST mode
pub const STUB_PLATE_TEXT: &str = "AA1234AA";
/// Plate country reported for every request in TEST mode
pub const STUB_PLATE_COUNTRY: &str = "UA";

/// Largest tolerance accepted from the config file or a request (one day).
pub const MAX_TOLERANCE_MS: u64 = 86_400_000;

/// Zone filter value that disables zone filtering.
pub const ZONE_FILTER_DISABLED: &str = "0";
