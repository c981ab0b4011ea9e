//! Parsing of inbound CAMEA `DetectionRequest` queries.

use chrono::{DateTime, FixedOffset};

use crate::config::{DETECTION_REQUEST_MSG, MAX_TOLERANCE_MS};
use crate::error_handling::RequestError;
use crate::protocol::time::parse_image_time;

/// A parsed CAMEA detection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRequest {
    pub request_id: String,
    pub requested_sensor: Option<String>,
    pub image_time: DateTime<FixedOffset>,
    /// The request's own `ToleranceMS`, if it carried one.
    pub tolerance_ms: Option<i64>,
}

impl DetectionRequest {
    /// Picks the tolerance for this request.
    ///
    /// A positive configured tolerance always wins. A configured value of
    /// zero defers to the request's own `ToleranceMS`. The two are never
    /// combined.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::MissingField("ToleranceMS")` when the configured
    /// value is zero and the request did not carry one, and
    /// `RequestError::InvalidTolerance` when the configured value is out of range.
    pub fn effective_tolerance_ms(&self, configured_ms: u64) -> Result<i64, RequestError> {
        if configured_ms > 0 {
            return i64::try_from(configured_ms)
                .ok()
                .filter(|ms| *ms as u64 <= MAX_TOLERANCE_MS)
                .ok_or_else(|| RequestError::InvalidTolerance(configured_ms.to_string()));
        }
        self.tolerance_ms
            .ok_or(RequestError::MissingField("ToleranceMS"))
    }
}

/// Returns true if a reassembled record carries `msg:DetectionRequest`.
///
/// The `msg` value must match exactly, so `msg:DetectionRequestRepeat` is not a request.
pub fn is_detection_request(record: &str) -> bool {
    let text = record.trim_end_matches('\0');
    text.find("msg:")
        .map(|start| {
            split_fields(&text[start..])
                .into_iter()
                .any(|(key, value)| key == "msg" && value == DETECTION_REQUEST_MSG)
        })
        .unwrap_or(false)
}

/// Splits `key:value|key:value` text into pairs.
///
/// Each segment is split on its first `:` only. Segments without a `:` get an
/// empty value.
pub fn split_fields(text: &str) -> Vec<(&str, &str)> {
    text.split('|')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.split_once(':').unwrap_or((segment, "")))
        .collect()
}

/// Parses a detection request out of one reassembled record.
///
/// Trailing null padding is stripped and parsing starts at the `msg:` key,
/// which skips the binary envelope header in front of it.
///
/// # Errors
///
/// - `RequestError::NotADetectionRequest` if the `msg` key is absent or names another message
/// - `RequestError::MissingField` for a missing `RequestID` or `ImageTime`
/// - `RequestError::InvalidImageTime` for an unparseable `ImageTime`
/// - `RequestError::InvalidTolerance` for a `ToleranceMS` that is not an
///   integer in `0..=MAX_TOLERANCE_MS`
pub fn parse_detection_request(record: &str) -> Result<DetectionRequest, RequestError> {
    let text = record.trim_end_matches('\0');
    let start = text.find("msg:").ok_or(RequestError::NotADetectionRequest)?;

    let mut msg = None;
    let mut request_id = None;
    let mut requested_sensor = None;
    let mut image_time = None;
    let mut tolerance = None;

    for (key, value) in split_fields(&text[start..]) {
        match key {
            "msg" => msg = Some(value),
            "RequestID" => request_id = Some(value),
            "RequestedSensor" => requested_sensor = Some(value),
            "ImageTime" => image_time = Some(value),
            "ToleranceMS" => tolerance = Some(value),
            _ => {}
        }
    }

    if msg != Some(DETECTION_REQUEST_MSG) {
        return Err(RequestError::NotADetectionRequest);
    }

    let request_id = request_id
        .filter(|v| !v.is_empty())
        .ok_or(RequestError::MissingField("RequestID"))?;
    let image_time = image_time.ok_or(RequestError::MissingField("ImageTime"))?;
    let image_time = parse_image_time(image_time)?;

    let tolerance_ms = match tolerance {
        Some(raw) => Some(
            raw.trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms <= MAX_TOLERANCE_MS)
                .map(|ms| ms as i64)
                .ok_or_else(|| RequestError::InvalidTolerance(raw.to_string()))?,
        ),
        None => None,
    };

    Ok(DetectionRequest {
        request_id: request_id.to_string(),
        requested_sensor: requested_sensor
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        image_time,
        tolerance_ms,
    })
}
