//! HTTP client initialization.
//!
//! This module builds the HTTP client used to talk to the Vidar camera.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::{VIDAR_HTTP_TIMEOUT_SECS, VIDAR_USER_AGENT};

/// Initializes the Vidar HTTP client.
///
/// Creates a `reqwest::Client` configured with:
/// - A fixed User-Agent identifying the gateway
/// - A per-request timeout so a stalled camera cannot block a CAMEA session
/// - Redirects disabled; Vidar serves everything from one origin
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_vidar_client() -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(VIDAR_HTTP_TIMEOUT_SECS))
        .user_agent(VIDAR_USER_AGENT)
        .build()?;
    Ok(Arc::new(client))
}
