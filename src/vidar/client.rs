//! HTTP/XML client for the Vidar `lpr/cff` API.

use std::sync::Arc;

use tokio_retry::RetryIf;

use super::xml;
use super::{CandidateRecord, CaptureStore, ImageRecord};
use crate::error_handling::{get_retry_strategy, VidarError};

/// Client for one Vidar camera.
#[derive(Clone)]
pub struct VidarClient {
    http: Arc<reqwest::Client>,
    base_url: String,
    zone_filter: Option<Vec<String>>,
}

impl VidarClient {
    /// Client for the camera at `ip` (host or host:port), plain HTTP.
    pub fn new(http: Arc<reqwest::Client>, ip: &str, zone_filter: Option<Vec<String>>) -> Self {
        Self::with_base_url(http, format!("http://{}", ip), zone_filter)
    }

    /// Client for an explicit base URL such as `http://127.0.0.1:8080`.
    pub fn with_base_url(
        http: Arc<reqwest::Client>,
        base_url: impl Into<String>,
        zone_filter: Option<Vec<String>>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            zone_filter,
        }
    }

    /// URL of the capture-log query for the inclusive window `[from_ms, to_ms]`.
    pub fn candidates_url(&self, from_ms: i64, to_ms: i64) -> String {
        format!(
            "{}/lpr/cff?cmd=querydb&sql=select%20*%20from%20cffresult%20where%20frametimems%20%3E%3D%20{}%20and%20frametimems%20%3C%3D%20{}",
            self.base_url, from_ms, to_ms
        )
    }

    /// URL of the detail query for one record.
    pub fn image_url(&self, record_id: &str) -> String {
        format!("{}/lpr/cff?cmd=getdata&id={}", self.base_url, record_id)
    }

    /// Fires a software trigger. The trigger must be enabled on the camera.
    pub async fn send_software_trigger(&self) -> Result<(), VidarError> {
        let url = format!(
            "{}/trigger/swtrigger?wfilter=1&sendtrigger=1",
            self.base_url
        );
        self.get_text(&url).await?;
        log::info!("Software trigger sent to {}", self.base_url);
        Ok(())
    }

    fn zone_accepted(&self, zone: Option<&str>) -> bool {
        match &self.zone_filter {
            None => true,
            Some(zones) => zone.is_some_and(|z| zones.iter().any(|allowed| allowed == z)),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, VidarError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VidarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// GET with the shared back-off; only transient failures are repeated.
    async fn get_text_with_retry(&self, url: &str) -> Result<String, VidarError> {
        RetryIf::spawn(
            get_retry_strategy(),
            move || async move {
                let result = self.get_text(url).await;
                if let Err(e) = &result {
                    log::debug!("Vidar request {} failed: {}", url, e);
                }
                result
            },
            |e: &VidarError| e.is_retriable(),
        )
        .await
    }

    fn parse_candidates(&self, body: &str) -> Result<Vec<CandidateRecord>, VidarError> {
        let mut candidates = Vec::new();
        for row in xml::rows(body) {
            let zone = xml::value_attr(row, "ZONE_NAME");
            if !self.zone_accepted(zone.as_deref()) {
                log::debug!("Skipping capture in zone {:?}", zone);
                continue;
            }
            let record_id = xml::value_attr(row, "ID")
                .ok_or_else(|| VidarError::MalformedResponse("row without ID".into()))?;
            let raw_time = xml::value_attr(row, "FRAMETIMEMS").ok_or_else(|| {
                VidarError::MalformedResponse(format!("row {} without FRAMETIMEMS", record_id))
            })?;
            let capture_time_ms = raw_time.trim().parse::<i64>().map_err(|_| {
                VidarError::MalformedResponse(format!(
                    "row {} has FRAMETIMEMS '{}'",
                    record_id, raw_time
                ))
            })?;
            candidates.push(CandidateRecord {
                capture_time_ms,
                record_id,
            });
        }
        Ok(candidates)
    }

    fn parse_image(record_id: &str, body: &str) -> Result<ImageRecord, VidarError> {
        let id = xml::value_attr(body, "ID").unwrap_or_default();
        if id.is_empty() {
            return Err(VidarError::NotFound(record_id.to_string()));
        }
        let field = |parent: &str, child: &str| {
            xml::nested_value_attr(body, parent, child).ok_or_else(|| {
                VidarError::MalformedResponse(format!(
                    "record {} has no {}/{}",
                    record_id, parent, child
                ))
            })
        };
        let raw_time = field("capture", "frametimems")?;
        let capture_time_ms = raw_time.trim().parse::<i64>().map_err(|_| {
            VidarError::MalformedResponse(format!(
                "record {} has frametimems '{}'",
                record_id, raw_time
            ))
        })?;
        Ok(ImageRecord {
            record_id: id,
            capture_time_ms,
            plate_text: field("anpr", "text")?,
            country_code: field("anpr", "country")?,
            plate_image_b64: field("images", "lp_img")?,
            full_image_b64: field("images", "normal_img")?,
        })
    }
}

#[async_trait::async_trait]
impl CaptureStore for VidarClient {
    async fn query_candidates(
        &self,
        center_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Vec<CandidateRecord>, VidarError> {
        let tolerance_ms = tolerance_ms.max(0);
        let url = self.candidates_url(
            center_ms.saturating_sub(tolerance_ms),
            center_ms.saturating_add(tolerance_ms),
        );
        let body = self.get_text_with_retry(&url).await?;
        let candidates = self.parse_candidates(&body)?;
        log::debug!(
            "Vidar returned {} candidate(s) around {} ms (+/- {} ms)",
            candidates.len(),
            center_ms,
            tolerance_ms
        );
        Ok(candidates)
    }

    async fn fetch_image(&self, record_id: &str) -> Result<ImageRecord, VidarError> {
        let body = self.get_text_with_retry(&self.image_url(record_id)).await?;
        Self::parse_image(record_id, &body)
    }
}
