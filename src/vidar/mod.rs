//! Access to the Vidar camera's capture database.
//!
//! The correlator only sees the `CaptureStore` trait; `VidarClient` is the
//! HTTP/XML implementation used in production, tests substitute their own.

mod client;
pub mod xml;

pub use client::VidarClient;

use crate::error_handling::VidarError;

/// One row of Vidar's capture log inside a query window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Capture time in milliseconds since the Unix epoch
    pub capture_time_ms: i64,
    /// Opaque Vidar record id
    pub record_id: String,
}

/// Full detail of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub record_id: String,
    pub capture_time_ms: i64,
    pub plate_text: String,
    pub country_code: String,
    /// Base64 plate crop as served by Vidar
    pub plate_image_b64: String,
    /// Base64 full scene as served by Vidar
    pub full_image_b64: String,
}

/// Source of captures for the correlator.
#[async_trait::async_trait]
pub trait CaptureStore: Send + Sync {
    /// Captures with `center_ms - tolerance_ms <= time <= center_ms + tolerance_ms`.
    ///
    /// An empty window is `Ok(vec![])`, not an error. Order is the store's
    /// own and is preserved for tie-breaking.
    async fn query_candidates(
        &self,
        center_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Vec<CandidateRecord>, VidarError>;

    /// Full record for `record_id`, or `VidarError::NotFound`.
    async fn fetch_image(&self, record_id: &str) -> Result<ImageRecord, VidarError>;
}
