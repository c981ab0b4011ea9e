//! Outbound CAMEA messages and their `key:value|...` payload text.

/// Placeholder image id for a request with no matching capture.
pub const NULL_IMAGE_ID: &str = "NULL";

/// Plate read attached to a found repeat ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateRead {
    pub text: String,
    pub country: String,
}

/// `DetectionRequestRepeat`: the acknowledgement every request receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatAck {
    pub module_id: String,
    pub request_id: String,
    /// `None` renders as `ImageID:NULL` (nothing matched).
    pub image_id: Option<String>,
    pub time_det: String,
    /// Present only when a capture matched.
    pub plate: Option<PlateRead>,
}

/// `LargeDetection`: the matched capture with both images embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeDetection {
    pub module_id: String,
    pub image_id: String,
    pub time_det: String,
    pub sent_at: String,
    pub plate_text: String,
    pub country: String,
    /// Base64 plate crop, relayed byte for byte.
    pub plate_image_b64: String,
    /// Base64 full scene, relayed byte for byte.
    pub full_image_b64: String,
}

/// Any message the gateway sends back to CAMEA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResponse {
    RepeatAck(RepeatAck),
    LargeDetection(LargeDetection),
}

impl DetectionResponse {
    /// The `msg` value of this response.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionResponse::RepeatAck(_) => "DetectionRequestRepeat",
            DetectionResponse::LargeDetection(_) => "LargeDetection",
        }
    }

    /// Renders the payload text carried inside a frame.
    pub fn to_payload(&self) -> String {
        let mut fields: Vec<(&str, String)> = vec![("msg", self.kind().to_string())];

        match self {
            DetectionResponse::RepeatAck(ack) => {
                fields.push(("ModuleID", ack.module_id.clone()));
                fields.push(("RequestID", ack.request_id.clone()));
                fields.push((
                    "ImageID",
                    ack.image_id.clone().unwrap_or_else(|| NULL_IMAGE_ID.to_string()),
                ));
                fields.push(("TimeDet", ack.time_det.clone()));
                if let Some(plate) = &ack.plate {
                    let is_detection = if plate.text.is_empty() { "0" } else { "1" };
                    fields.push(("LP", plate.text.clone()));
                    fields.push(("ILPC", plate.country.clone()));
                    fields.push(("IsDetection", is_detection.to_string()));
                }
            }
            DetectionResponse::LargeDetection(det) => {
                fields.push(("ModuleID", det.module_id.clone()));
                fields.push(("ImageID", det.image_id.clone()));
                fields.push(("TimeDet", det.time_det.clone()));
                fields.push(("UT", det.sent_at.clone()));
                fields.push(("ExtraCount", "0".to_string()));
                fields.push(("LPText", det.plate_text.clone()));
                fields.push(("ILPC", det.country.clone()));
                fields.push(("LpJpeg", det.plate_image_b64.clone()));
                fields.push(("FullImage64", det.full_image_b64.clone()));
            }
        }

        join_fields(&fields)
    }

    /// Payload text with embedded images cut to a short prefix, for logs.
    pub fn to_log_summary(&self) -> String {
        match self {
            DetectionResponse::RepeatAck(_) => self.to_payload(),
            DetectionResponse::LargeDetection(det) => {
                let mut short = det.clone();
                short.plate_image_b64 = truncate_for_log(&det.plate_image_b64);
                short.full_image_b64 = truncate_for_log(&det.full_image_b64);
                DetectionResponse::LargeDetection(short).to_payload()
            }
        }
    }
}

fn join_fields(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Cuts a long value to a short prefix followed by `...`.
pub fn truncate_for_log(value: &str) -> String {
    const KEEP: usize = 20;
    match value.char_indices().nth(KEEP) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found_ack() -> RepeatAck {
        RepeatAck {
            module_id: "M1".into(),
            request_id: "42".into(),
            image_id: Some("M1_20240101T120000100+0200".into()),
            time_det: "20240101T120000100+0200".into(),
            plate: Some(PlateRead {
                text: "AA1234AA".into(),
                country: "UA".into(),
            }),
        }
    }

    #[test]
    fn test_found_ack_payload() {
        let payload = DetectionResponse::RepeatAck(found_ack()).to_payload();
        assert_eq!(
            payload,
            "msg:DetectionRequestRepeat|ModuleID:M1|RequestID:42|ImageID:M1_20240101T120000100+0200|TimeDet:20240101T120000100+0200|LP:AA1234AA|ILPC:UA|IsDetection:1"
        );
    }

    #[test]
    fn test_found_ack_without_plate_text_is_not_a_detection() {
        let mut ack = found_ack();
        ack.plate = Some(PlateRead {
            text: String::new(),
            country: String::new(),
        });
        let payload = DetectionResponse::RepeatAck(ack).to_payload();
        assert!(payload.ends_with("|LP:|ILPC:|IsDetection:0"));
    }

    #[test]
    fn test_not_found_ack_payload() {
        let ack = RepeatAck {
            image_id: None,
            plate: None,
            ..found_ack()
        };
        let payload = DetectionResponse::RepeatAck(ack).to_payload();
        assert!(payload.contains("|ImageID:NULL|"));
        assert!(!payload.contains("LP:"));
        assert!(!payload.contains("ILPC:"));
        assert!(!payload.contains("IsDetection"));
    }

    #[test]
    fn test_large_detection_field_order() {
        let det = LargeDetection {
            module_id: "M1".into(),
            image_id: "U7_20240101T120000100+0200".into(),
            time_det: "20240101T120000100+0200".into(),
            sent_at: "2024-01-01T12:00:01.000+02:00".into(),
            plate_text: "AA1234AA".into(),
            country: "UA".into(),
            plate_image_b64: "cGxhdGU=".into(),
            full_image_b64: "c2NlbmU=".into(),
        };
        let payload = DetectionResponse::LargeDetection(det).to_payload();
        let keys: Vec<&str> = payload
            .split('|')
            .map(|f| f.split_once(':').unwrap().0)
            .collect();
        assert_eq!(
            keys,
            vec![
                "msg",
                "ModuleID",
                "ImageID",
                "TimeDet",
                "UT",
                "ExtraCount",
                "LPText",
                "ILPC",
                "LpJpeg",
                "FullImage64"
            ]
        );
        assert!(payload.contains("|ExtraCount:0|"));
        assert!(payload.ends_with("|LpJpeg:cGxhdGU=|FullImage64:c2NlbmU="));
    }

    #[test]
    fn test_log_summary_truncates_images() {
        let det = LargeDetection {
            module_id: "M1".into(),
            image_id: "x".into(),
            time_det: "t".into(),
            sent_at: "u".into(),
            plate_text: "p".into(),
            country: "c".into(),
            plate_image_b64: "A".repeat(500),
            full_image_b64: "B".repeat(5000),
        };
        let summary = DetectionResponse::LargeDetection(det).to_log_summary();
        assert!(summary.len() < 300);
        assert!(summary.contains(&format!("LpJpeg:{}...", "A".repeat(20))));
    }
}
