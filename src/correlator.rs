//! Matching CAMEA detection requests against Vidar captures.
//!
//! For each request the correlator looks up every capture inside the
//! tolerance window, keeps the one closest in time and turns it into the
//! two CAMEA answers: a `DetectionRequestRepeat` ack for the management
//! socket and a `LargeDetection` carrying both images for the uplink.
//! Lookup failures never escape; they become a not-found ack.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;

use crate::config::{GatewayConfig, STUB_PLATE_COUNTRY, STUB_PLATE_TEXT};
use crate::error_handling::VidarError;
use crate::image_generator::StubImageGenerator;
use crate::protocol::{
    epoch_ms_to_zone, format_send_time, format_time_det, DetectionRequest, LargeDetection,
    PlateRead, RepeatAck,
};
use crate::vidar::{CandidateRecord, CaptureStore, ImageRecord};

/// Identity and tuning shared by every answer.
#[derive(Debug, Clone)]
pub struct CorrelatorSettings {
    /// Default `ModuleID` when the request names no sensor
    pub module_id: String,
    /// Prefix of large-detection image ids
    pub camera_unit_id: String,
    /// Configured window half-width; 0 defers to the request
    pub tolerance_ms: u64,
    pub timezone: Tz,
}

impl CorrelatorSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            module_id: config.service.module_id.clone(),
            camera_unit_id: config.settings.camera_unit_id.clone(),
            tolerance_ms: config.vidar.tolerance_ms,
            timezone: config.timezone(),
        }
    }
}

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// A capture matched
    Found,
    /// The window held no usable capture
    NotFound,
    /// Vidar could not be queried; answered as not found
    LookupFailed,
}

/// The answers to one request.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub outcome: CorrelationOutcome,
    /// Always sent back on the management socket
    pub ack: RepeatAck,
    /// Present only when a capture matched
    pub detection: Option<LargeDetection>,
}

enum DetectionSource {
    Vidar(Arc<dyn CaptureStore>),
    Stub(StubImageGenerator),
}

/// Resolves detection requests into CAMEA answers.
pub struct Correlator {
    source: DetectionSource,
    settings: CorrelatorSettings,
}

/// The candidate closest to `target_ms`.
///
/// Ties keep the earliest candidate in input order.
pub fn select_best_fit(candidates: &[CandidateRecord], target_ms: i64) -> Option<&CandidateRecord> {
    let mut best: Option<(&CandidateRecord, u64)> = None;
    for candidate in candidates {
        let deviation = candidate.capture_time_ms.abs_diff(target_ms);
        match best {
            Some((_, best_deviation)) if best_deviation <= deviation => {}
            _ => best = Some((candidate, deviation)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

impl Correlator {
    /// Correlator backed by a capture store (VIDAR mode).
    pub fn with_store(store: Arc<dyn CaptureStore>, settings: CorrelatorSettings) -> Self {
        Self {
            source: DetectionSource::Vidar(store),
            settings,
        }
    }

    /// Correlator answering every request with stub data (TEST mode).
    pub fn stub(settings: CorrelatorSettings) -> Self {
        Self {
            source: DetectionSource::Stub(StubImageGenerator::new()),
            settings,
        }
    }

    /// Produces the answers for one request. Never fails.
    pub async fn correlate(&self, request: &DetectionRequest) -> Correlation {
        match &self.source {
            DetectionSource::Stub(generator) => self.stub_answer(request, generator),
            DetectionSource::Vidar(store) => match self.lookup(store.as_ref(), request).await {
                Ok(Some((candidate, image))) => self.found(request, &candidate, image),
                Ok(None) => self.not_found(request, CorrelationOutcome::NotFound),
                Err(e) => {
                    log::error!(
                        "Vidar lookup for request {} failed, answering not found: {}",
                        request.request_id,
                        e
                    );
                    self.not_found(request, CorrelationOutcome::LookupFailed)
                }
            },
        }
    }

    async fn lookup(
        &self,
        store: &dyn CaptureStore,
        request: &DetectionRequest,
    ) -> Result<Option<(CandidateRecord, ImageRecord)>, VidarError> {
        let tolerance_ms = match request.effective_tolerance_ms(self.settings.tolerance_ms) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Request {}: {}", request.request_id, e);
                return Ok(None);
            }
        };
        let target_ms = request.image_time.timestamp_millis();

        let candidates = store.query_candidates(target_ms, tolerance_ms).await?;
        let Some(best) = select_best_fit(&candidates, target_ms) else {
            log::info!(
                "No capture within {} ms of request {}",
                tolerance_ms,
                request.request_id
            );
            return Ok(None);
        };
        log::debug!(
            "Request {}: best of {} candidate(s) is {} ({} ms off)",
            request.request_id,
            candidates.len(),
            best.record_id,
            best.capture_time_ms.abs_diff(target_ms)
        );

        match store.fetch_image(&best.record_id).await {
            Ok(image) => Ok(Some((best.clone(), image))),
            Err(VidarError::NotFound(id)) => {
                log::warn!("Vidar record {} vanished before it could be fetched", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn module_id(&self, request: &DetectionRequest) -> String {
        request
            .requested_sensor
            .clone()
            .unwrap_or_else(|| self.settings.module_id.clone())
    }

    fn sent_at(&self) -> String {
        format_send_time(&Utc::now().with_timezone(&self.settings.timezone))
    }

    fn not_found(&self, request: &DetectionRequest, outcome: CorrelationOutcome) -> Correlation {
        Correlation {
            outcome,
            ack: RepeatAck {
                module_id: self.module_id(request),
                request_id: request.request_id.clone(),
                image_id: None,
                time_det: format_time_det(&request.image_time),
                plate: None,
            },
            detection: None,
        }
    }

    fn found(
        &self,
        request: &DetectionRequest,
        candidate: &CandidateRecord,
        image: ImageRecord,
    ) -> Correlation {
        let time_det = epoch_ms_to_zone(candidate.capture_time_ms, self.settings.timezone)
            .map(|t| format_time_det(&t))
            .unwrap_or_else(|| format_time_det(&request.image_time));
        self.compose(
            request,
            time_det,
            image.plate_text,
            image.country_code,
            image.plate_image_b64,
            image.full_image_b64,
        )
    }

    fn stub_answer(&self, request: &DetectionRequest, generator: &StubImageGenerator) -> Correlation {
        self.compose(
            request,
            format_time_det(&request.image_time),
            STUB_PLATE_TEXT.to_string(),
            STUB_PLATE_COUNTRY.to_string(),
            generator.plate_image_b64().to_string(),
            generator.scene_image_b64().to_string(),
        )
    }

    fn compose(
        &self,
        request: &DetectionRequest,
        time_det: String,
        plate_text: String,
        country: String,
        plate_image_b64: String,
        full_image_b64: String,
    ) -> Correlation {
        let module_id = self.module_id(request);
        let ack = RepeatAck {
            module_id: module_id.clone(),
            request_id: request.request_id.clone(),
            image_id: Some(format!("{}_{}", module_id, time_det)),
            time_det: time_det.clone(),
            plate: Some(PlateRead {
                text: plate_text.clone(),
                country: country.clone(),
            }),
        };
        let detection = LargeDetection {
            module_id,
            image_id: format!("{}_{}", self.settings.camera_unit_id, time_det),
            time_det,
            sent_at: self.sent_at(),
            plate_text,
            country,
            plate_image_b64,
            full_image_b64,
        };
        Correlation {
            outcome: CorrelationOutcome::Found,
            ack,
            detection: Some(detection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::protocol::{parse_detection_request, DetectionResponse};

    /// In-memory store that records the windows it was asked for.
    #[derive(Default)]
    struct FakeStore {
        candidates: Vec<CandidateRecord>,
        fail_query: bool,
        windows: Mutex<Vec<(i64, i64)>>,
    }

    impl FakeStore {
        fn with(candidates: &[(i64, &str)]) -> Self {
            Self {
                candidates: candidates
                    .iter()
                    .map(|(t, id)| CandidateRecord {
                        capture_time_ms: *t,
                        record_id: id.to_string(),
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl CaptureStore for FakeStore {
        async fn query_candidates(
            &self,
            center_ms: i64,
            tolerance_ms: i64,
        ) -> Result<Vec<CandidateRecord>, VidarError> {
            self.windows.lock().unwrap().push((center_ms, tolerance_ms));
            if self.fail_query {
                return Err(VidarError::MalformedResponse("boom".into()));
            }
            Ok(self
                .candidates
                .iter()
                .filter(|c| (c.capture_time_ms - center_ms).abs() <= tolerance_ms)
                .cloned()
                .collect())
        }

        async fn fetch_image(&self, record_id: &str) -> Result<ImageRecord, VidarError> {
            let candidate = self
                .candidates
                .iter()
                .find(|c| c.record_id == record_id)
                .ok_or_else(|| VidarError::NotFound(record_id.to_string()))?;
            Ok(ImageRecord {
                record_id: record_id.to_string(),
                capture_time_ms: candidate.capture_time_ms,
                plate_text: format!("PLATE{}", record_id),
                country_code: "UA".into(),
                plate_image_b64: "cGxhdGU=".into(),
                full_image_b64: "c2NlbmU=".into(),
            })
        }
    }

    // 2024-01-01 12:00:00.000 +02:00
    const T0: i64 = 1_704_103_200_000;
    const REQUEST: &str = "msg:DetectionRequest|RequestID:42|ImageTime:20240101T120000000000+0200";

    fn settings(tolerance_ms: u64) -> CorrelatorSettings {
        CorrelatorSettings {
            module_id: "CAM1".into(),
            camera_unit_id: "UNIT7".into(),
            tolerance_ms,
            timezone: chrono_tz::Europe::Kyiv,
        }
    }

    fn candidates(times: &[i64]) -> Vec<CandidateRecord> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| CandidateRecord {
                capture_time_ms: *t,
                record_id: i.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_best_fit_picks_minimum_deviation() {
        let c = candidates(&[100, 250, 400]);
        assert_eq!(select_best_fit(&c, 200).map(|c| c.capture_time_ms), Some(250));
    }

    #[test]
    fn test_best_fit_tie_keeps_first_seen() {
        let c = candidates(&[100, 300]);
        assert_eq!(select_best_fit(&c, 200).map(|c| c.record_id.as_str()), Some("0"));

        let reversed = candidates(&[300, 100]);
        assert_eq!(
            select_best_fit(&reversed, 200).map(|c| c.capture_time_ms),
            Some(300)
        );
    }

    #[test]
    fn test_best_fit_empty() {
        assert!(select_best_fit(&[], 0).is_none());
    }

    #[tokio::test]
    async fn test_found_request() {
        let store = Arc::new(FakeStore::with(&[(T0 + 100, "11")]));
        let correlator = Correlator::with_store(store, settings(500));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::Found);

        let ack = DetectionResponse::RepeatAck(result.ack).to_payload();
        assert_eq!(
            ack,
            "msg:DetectionRequestRepeat|ModuleID:CAM1|RequestID:42|\
             ImageID:CAM1_20240101T120000100+0200|TimeDet:20240101T120000100+0200|\
             LP:PLATE11|ILPC:UA|IsDetection:1"
        );

        let detection = result.detection.unwrap();
        assert_eq!(detection.image_id, "UNIT7_20240101T120000100+0200");
        assert_eq!(detection.plate_text, "PLATE11");
        assert_eq!(detection.plate_image_b64, "cGxhdGU=");
        assert_eq!(detection.full_image_b64, "c2NlbmU=");
    }

    #[tokio::test]
    async fn test_not_found_has_null_image() {
        let store = Arc::new(FakeStore::with(&[(T0 + 10_000, "11")]));
        let correlator = Correlator::with_store(store, settings(500));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::NotFound);
        assert!(result.detection.is_none());
        assert_eq!(
            DetectionResponse::RepeatAck(result.ack).to_payload(),
            "msg:DetectionRequestRepeat|ModuleID:CAM1|RequestID:42|ImageID:NULL|\
             TimeDet:20240101T120000000+0200"
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_not_found() {
        let store = Arc::new(FakeStore {
            fail_query: true,
            ..Default::default()
        });
        let correlator = Correlator::with_store(store, settings(500));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::LookupFailed);
        assert_eq!(result.ack.image_id, None);
        assert!(result.detection.is_none());
    }

    #[tokio::test]
    async fn test_configured_tolerance_wins() {
        let store = Arc::new(FakeStore::default());
        let correlator = Correlator::with_store(store.clone(), settings(500));
        let request = parse_detection_request(&format!("{}|ToleranceMS:2000", REQUEST)).unwrap();

        correlator.correlate(&request).await;
        assert_eq!(*store.windows.lock().unwrap(), vec![(T0, 500)]);
    }

    #[tokio::test]
    async fn test_zero_tolerance_defers_to_request() {
        let store = Arc::new(FakeStore::default());
        let correlator = Correlator::with_store(store.clone(), settings(0));
        let request = parse_detection_request(&format!("{}|ToleranceMS:2000", REQUEST)).unwrap();

        correlator.correlate(&request).await;
        assert_eq!(*store.windows.lock().unwrap(), vec![(T0, 2000)]);
    }

    #[tokio::test]
    async fn test_zero_tolerance_without_request_value_skips_lookup() {
        let store = Arc::new(FakeStore::with(&[(T0, "1")]));
        let correlator = Correlator::with_store(store.clone(), settings(0));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::NotFound);
        assert!(store.windows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_configured_tolerance_skips_lookup() {
        let store = Arc::new(FakeStore::with(&[(T0, "1")]));
        let correlator = Correlator::with_store(store.clone(), settings(u64::MAX));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::NotFound);
        assert_eq!(result.ack.image_id, None);
        assert!(store.windows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requested_sensor_overrides_module_id() {
        let store = Arc::new(FakeStore::with(&[(T0, "5")]));
        let correlator = Correlator::with_store(store, settings(500));
        let request =
            parse_detection_request(&format!("{}|RequestedSensor:LANE3", REQUEST)).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.ack.module_id, "LANE3");
        assert_eq!(
            result.ack.image_id.as_deref(),
            Some("LANE3_20240101T120000000+0200")
        );
        assert_eq!(result.detection.unwrap().module_id, "LANE3");
    }

    #[tokio::test]
    async fn test_stub_mode_answers_without_store() {
        let correlator = Correlator::stub(settings(500));
        let request = parse_detection_request(REQUEST).unwrap();

        let result = correlator.correlate(&request).await;
        assert_eq!(result.outcome, CorrelationOutcome::Found);
        let plate = result.ack.plate.unwrap();
        assert_eq!(plate.text, STUB_PLATE_TEXT);
        assert_eq!(plate.country, STUB_PLATE_COUNTRY);
        assert_eq!(result.ack.time_det, "20240101T120000000+0200");
        let detection = result.detection.unwrap();
        assert!(!detection.full_image_b64.is_empty());
        assert!(!detection.plate_image_b64.is_empty());
    }
}
