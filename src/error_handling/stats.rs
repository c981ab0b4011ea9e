//! Gateway statistics tracking.
//!
//! This module provides thread-safe counters for the events the gateway
//! sees over its lifetime (requests, matches, failures, reconnects).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::GatewayEvent;

/// Thread-safe gateway statistics tracker.
///
/// Every `GatewayEvent` gets an atomic counter initialized to zero on
/// creation, so the inbound session, the uplink task and the correlator can
/// all record into one shared `Arc<GatewayStats>`.
pub struct GatewayStats {
    counters: HashMap<GatewayEvent, AtomicUsize>,
}

impl GatewayStats {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for event in GatewayEvent::iter() {
            counters.insert(event, AtomicUsize::new(0));
        }
        GatewayStats { counters }
    }

    /// Records one occurrence of `event`.
    pub fn record(&self, event: GatewayEvent) {
        if let Some(counter) = self.counters.get(&event) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Current count for `event`.
    pub fn count(&self, event: GatewayEvent) -> usize {
        self.counters
            .get(&event)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Logs every non-zero counter.
    pub fn log_summary(&self) {
        log::info!("Gateway statistics:");
        for event in GatewayEvent::iter() {
            let count = self.count(event);
            if count > 0 {
                log::info!("   {}: {}", event, count);
            }
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}
