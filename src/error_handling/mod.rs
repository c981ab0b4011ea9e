//! Error handling and gateway statistics.
//!
//! This module provides:
//! - Error type definitions for every boundary (config, codec, requests,
//!   Vidar, uplink, initialization)
//! - The retry strategy used for Vidar lookups
//! - Lifetime event counters
//!
//! Only configuration errors and a broken accept loop are fatal. Malformed
//! queries and Vidar failures are logged and absorbed so one bad request
//! never takes the CAMEA session down.

mod stats;
mod types;

use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

// Re-export public API
pub use stats::GatewayStats;
pub use types::{
    ConfigError, ConfigValidationError, FrameError, GatewayEvent, InitializationError,
    RequestError, UplinkError, VidarError,
};

/// Creates the back-off schedule for retrying a Vidar request.
///
/// Yields one delay per retry; an empty schedule means a single attempt.
pub fn get_retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(crate::config::RETRY_MAX_ATTEMPTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_gateway_stats_initialization() {
        let stats = GatewayStats::new();
        for event in GatewayEvent::iter() {
            assert_eq!(stats.count(event), 0);
        }
    }

    #[test]
    fn test_gateway_stats_record() {
        let stats = GatewayStats::new();
        stats.record(GatewayEvent::RequestReceived);
        stats.record(GatewayEvent::RequestReceived);
        stats.record(GatewayEvent::UplinkReconnect);
        assert_eq!(stats.count(GatewayEvent::RequestReceived), 2);
        assert_eq!(stats.count(GatewayEvent::UplinkReconnect), 1);
        assert_eq!(stats.count(GatewayEvent::MatchFound), 0);
    }

    #[test]
    fn test_retry_strategy_is_bounded() {
        let delays: Vec<Duration> = get_retry_strategy().collect();
        assert_eq!(delays.len(), crate::config::RETRY_MAX_ATTEMPTS);
        assert!(delays
            .iter()
            .all(|d| *d <= Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS)));
    }

    #[test]
    fn test_validation_error_display() {
        let e = ConfigValidationError::new("settings.buffer_size", "must be greater than 0");
        assert_eq!(
            e.to_string(),
            "invalid configuration value for 'settings.buffer_size': must be greater than 0"
        );
    }

    #[test]
    fn test_vidar_status_retriability() {
        let server = VidarError::Status {
            status: 503,
            url: "http://vidar/lpr/cff".into(),
        };
        let client = VidarError::Status {
            status: 404,
            url: "http://vidar/lpr/cff".into(),
        };
        assert!(server.is_retriable());
        assert!(!client.is_retriable());
        assert!(!VidarError::NotFound("9".into()).is_retriable());
    }
}
