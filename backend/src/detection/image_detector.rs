use image::{ImageReader, RgbImage};
use reqwest::blocking::Client;
use shared::{DetectionLabel, DetectionResult, RealityCheck};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

use super::explanation::explain;
use crate::models::{ImageClassifier, InferenceError, ModelError};
use crate::reality::RealityAssessor;

/// Vendor labels that name the authentic class.
const AUTHENTIC_LABELS: [&str; 3] = ["human", "real", "authentic"];

const NEUTRAL_SCORE: f32 = 0.5;
const AI_THRESHOLD: f32 = 0.5;

const MODEL_UNAVAILABLE_MESSAGE: &str =
    "The AI detection model could not be loaded. Please check server logs.";
const REMOTE_SKIP_MESSAGE: &str = "Reality check skipped for remote URL.";

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(Url),
}

impl ImageSource {
    pub fn parse(input: &str) -> Self {
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ImageSource::Url(url),
            _ => ImageSource::Path(PathBuf::from(input)),
        }
    }
}

/// Maps a vendor label/confidence pair onto the probability of AI generation.
pub fn canonical_likelihood(label: &str, confidence: f32) -> f32 {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        NEUTRAL_SCORE
    };
    let label = label.trim().to_lowercase();
    if AUTHENTIC_LABELS.contains(&label.as_str()) {
        1.0 - confidence
    } else {
        confidence
    }
}

pub fn label_for(ai_likelihood: f32) -> DetectionLabel {
    if ai_likelihood > AI_THRESHOLD {
        DetectionLabel::AiGenerated
    } else {
        DetectionLabel::Real
    }
}

/// Downloads remote images with a bounded timeout.
pub struct RemoteFetcher {
    timeout: Duration,
    client: OnceLock<Client>,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, InferenceError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| InferenceError::Fetch(e.to_string()))?;
        Ok(self.client.get_or_init(|| client))
    }

    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, InferenceError> {
        let response = self
            .client()?
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| InferenceError::Fetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .map_err(|e| InferenceError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Single-image detector: classifier output, banded explanation and the
/// optional reality check.
pub struct ImageDetector {
    classifier: Option<Arc<dyn ImageClassifier>>,
    reality: RealityAssessor,
    fetcher: RemoteFetcher,
    check_remote_images: bool,
}

impl ImageDetector {
    pub fn new(
        classifier: Result<Arc<dyn ImageClassifier>, ModelError>,
        reality: RealityAssessor,
        fetcher: RemoteFetcher,
        check_remote_images: bool,
    ) -> Self {
        let classifier = match classifier {
            Ok(classifier) => {
                log::info!("Image classifier loaded successfully");
                Some(classifier)
            }
            Err(e) => {
                log::error!("Image classifier unavailable: {}", e);
                None
            }
        };
        Self {
            classifier,
            reality,
            fetcher,
            check_remote_images,
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn reality(&self) -> &RealityAssessor {
        &self.reality
    }

    pub fn classify(&self, source: &ImageSource) -> DetectionResult {
        self.run(source, true)
    }

    pub fn classify_path(&self, path: &Path) -> DetectionResult {
        self.classify(&ImageSource::Path(path.to_path_buf()))
    }

    /// Scores a local image without the reality check. Video frames go
    /// through here since their verdict only uses the likelihood.
    pub fn score_path(&self, path: &Path) -> DetectionResult {
        self.run(&ImageSource::Path(path.to_path_buf()), false)
    }

    fn run(&self, source: &ImageSource, with_reality: bool) -> DetectionResult {
        let Some(classifier) = self.classifier.as_deref() else {
            return DetectionResult {
                ai_likelihood: NEUTRAL_SCORE,
                label: DetectionLabel::ModelError,
                explanation: MODEL_UNAVAILABLE_MESSAGE.to_string(),
                reality_check: None,
            };
        };

        match self.try_classify(classifier, source, with_reality) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error in prediction: {}", e);
                DetectionResult {
                    ai_likelihood: NEUTRAL_SCORE,
                    label: DetectionLabel::Error,
                    explanation: format!("Processing failed: {}", e),
                    reality_check: None,
                }
            }
        }
    }

    fn try_classify(
        &self,
        classifier: &dyn ImageClassifier,
        source: &ImageSource,
        with_reality: bool,
    ) -> Result<DetectionResult, InferenceError> {
        let (image, remote_bytes) = match source {
            ImageSource::Path(path) => {
                let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
                (image.to_rgb8(), None)
            }
            ImageSource::Url(url) => {
                let bytes = self.fetcher.fetch(url)?;
                (image::load_from_memory(&bytes)?.to_rgb8(), Some(bytes))
            }
        };

        let ai_likelihood = score_image(classifier, &image)?;
        let explanation = explain(ai_likelihood, &mut rand::rng());

        let reality_check = with_reality.then(|| match (source, remote_bytes) {
            (ImageSource::Path(path), _) => RealityCheck::Assessed(self.reality.assess(path)),
            (ImageSource::Url(_), Some(bytes)) if self.check_remote_images => {
                RealityCheck::Assessed(self.reality.assess_bytes(&bytes))
            }
            (ImageSource::Url(_), _) => RealityCheck::Skipped {
                reality_score: NEUTRAL_SCORE,
                message: REMOTE_SKIP_MESSAGE.to_string(),
            },
        });

        Ok(DetectionResult {
            ai_likelihood,
            label: label_for(ai_likelihood),
            explanation,
            reality_check,
        })
    }
}

fn score_image(classifier: &dyn ImageClassifier, image: &RgbImage) -> Result<f32, InferenceError> {
    let predictions = classifier.predict(image)?;
    let top = predictions.first().ok_or(InferenceError::EmptyOutput)?;
    log::debug!("Top prediction: {} ({:.4})", top.label, top.score);
    Ok(canonical_likelihood(&top.label, top.score))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::explanation::{
        CRITICAL_PREFIX, CRITICAL_REASONS, HIGH_AUTHENTICITY, LIKELY_AUTHENTIC,
    };
    use crate::models::Prediction;
    use image::{ImageFormat, Rgb};
    use shared::FindingStatus;
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Classifier answering with a fixed label/score pair.
    pub(crate) struct FixedClassifier {
        pub label: &'static str,
        pub score: f32,
    }

    impl ImageClassifier for FixedClassifier {
        fn predict(&self, _image: &RgbImage) -> Result<Vec<Prediction>, InferenceError> {
            Ok(vec![Prediction {
                label: self.label.to_string(),
                score: self.score,
            }])
        }
    }

    struct FailingClassifier;

    impl ImageClassifier for FailingClassifier {
        fn predict(&self, _image: &RgbImage) -> Result<Vec<Prediction>, InferenceError> {
            Err(InferenceError::Model("CUDA out of memory".into()))
        }
    }

    pub(crate) fn detector_with(classifier: Arc<dyn ImageClassifier>) -> ImageDetector {
        ImageDetector::new(
            Ok(classifier),
            RealityAssessor::default(),
            RemoteFetcher::new(Duration::from_secs(1)),
            false,
        )
    }

    fn remote_detector(check_remote_images: bool) -> ImageDetector {
        ImageDetector::new(
            Ok(Arc::new(FixedClassifier {
                label: "artificial",
                score: 0.8,
            })),
            RealityAssessor::default(),
            RemoteFetcher::new(Duration::from_secs(5)),
            check_remote_images,
        )
    }

    /// Serves a single PNG response on a loopback port and returns its URL.
    fn serve_png_once() -> Url {
        let mut png = Vec::new();
        RgbImage::from_pixel(16, 16, Rgb([200, 40, 40]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                png.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(&png).unwrap();
        });

        Url::parse(&format!("http://{}/upload.png", addr)).unwrap()
    }

    fn sample_image(dir: &Path) -> PathBuf {
        let path = dir.join("sample.png");
        RgbImage::from_pixel(16, 16, Rgb([90, 120, 150])).save(&path).unwrap();
        path
    }

    #[test]
    fn authentic_labels_invert_confidence() {
        assert!((canonical_likelihood("human", 0.9) - 0.1).abs() < 1e-6);
        assert!((canonical_likelihood("Real", 0.7) - 0.3).abs() < 1e-6);
        assert!((canonical_likelihood("artificial", 0.95) - 0.95).abs() < 1e-6);
        assert_eq!(canonical_likelihood("artificial", f32::NAN), 0.5);
        assert_eq!(canonical_likelihood("artificial", 1.7), 1.0);
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(label_for(0.5), DetectionLabel::Real);
        assert_eq!(label_for(0.5001), DetectionLabel::AiGenerated);
    }

    #[test]
    fn url_inputs_are_recognized() {
        assert!(matches!(
            ImageSource::parse("https://example.com/cat.jpg"),
            ImageSource::Url(_)
        ));
        assert_eq!(
            ImageSource::parse("/tmp/cat.jpg"),
            ImageSource::Path(PathBuf::from("/tmp/cat.jpg"))
        );
    }

    #[test]
    fn human_label_scores_as_real() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(Arc::new(FixedClassifier {
            label: "human",
            score: 0.9,
        }));

        let result = detector.classify_path(&sample_image(dir.path()));

        assert!((result.ai_likelihood - 0.1).abs() < 1e-6);
        assert_eq!(result.label, DetectionLabel::Real);
        assert!(
            result.explanation == HIGH_AUTHENTICITY || result.explanation == LIKELY_AUTHENTIC
        );
    }

    #[test]
    fn artificial_label_draws_critical_explanation() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(Arc::new(FixedClassifier {
            label: "artificial",
            score: 0.95,
        }));

        let result = detector.classify_path(&sample_image(dir.path()));

        assert!((result.ai_likelihood - 0.95).abs() < 1e-6);
        assert_eq!(result.label, DetectionLabel::AiGenerated);
        assert!(result.explanation.starts_with(CRITICAL_PREFIX));
        assert!(CRITICAL_REASONS.iter().any(|r| result.explanation.contains(r)));
    }

    #[test]
    fn local_images_get_reality_check() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(Arc::new(FixedClassifier {
            label: "artificial",
            score: 0.6,
        }));

        let result = detector.classify_path(&sample_image(dir.path()));

        match result.reality_check {
            Some(RealityCheck::Assessed(reality)) => {
                assert_eq!(reality.metadata.status, FindingStatus::Warning);
                assert_eq!(reality.context.status, FindingStatus::Error);
            }
            other => panic!("expected assessed reality check, got {:?}", other),
        }
    }

    #[test]
    fn remote_images_skip_reality_check_by_default() {
        let detector = remote_detector(false);

        let result = detector.classify(&ImageSource::Url(serve_png_once()));

        assert_eq!(result.label, DetectionLabel::AiGenerated);
        assert!((result.ai_likelihood - 0.8).abs() < 1e-6);
        match result.reality_check {
            Some(RealityCheck::Skipped {
                reality_score,
                message,
            }) => {
                assert_eq!(reality_score, 0.5);
                assert_eq!(message, "Reality check skipped for remote URL.");
            }
            other => panic!("expected skipped reality check, got {:?}", other),
        }
    }

    #[test]
    fn remote_images_are_assessed_when_enabled() {
        let detector = remote_detector(true);

        let result = detector.classify(&ImageSource::Url(serve_png_once()));

        assert_eq!(result.label, DetectionLabel::AiGenerated);
        match result.reality_check {
            Some(RealityCheck::Assessed(reality)) => {
                assert_eq!(reality.metadata.status, FindingStatus::Warning);
                assert_eq!(reality.context.status, FindingStatus::Error);
            }
            other => panic!("expected assessed reality check, got {:?}", other),
        }
    }

    #[test]
    fn unreachable_url_degrades_to_error_label() {
        let closed_port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/missing.png", closed_port)).unwrap();

        let result = remote_detector(false).classify(&ImageSource::Url(url));

        assert_eq!(result.label, DetectionLabel::Error);
        assert_eq!(result.ai_likelihood, 0.5);
        assert!(
            result
                .explanation
                .starts_with("Processing failed: Failed to fetch remote image")
        );
        assert!(result.reality_check.is_none());
    }

    #[test]
    fn scoring_a_path_skips_reality_check() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(Arc::new(FixedClassifier {
            label: "artificial",
            score: 0.7,
        }));

        let result = detector.score_path(&sample_image(dir.path()));

        assert_eq!(result.label, DetectionLabel::AiGenerated);
        assert!((result.ai_likelihood - 0.7).abs() < 1e-6);
        assert!(result.reality_check.is_none());
    }

    #[test]
    fn inference_failure_degrades_to_error_label() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(Arc::new(FailingClassifier));

        let result = detector.classify_path(&sample_image(dir.path()));

        assert_eq!(result.label, DetectionLabel::Error);
        assert_eq!(result.ai_likelihood, 0.5);
        assert!(result.explanation.contains("CUDA out of memory"));
        assert!(result.reality_check.is_none());
    }

    #[test]
    fn unreadable_path_degrades_to_error_label() {
        let detector = detector_with(Arc::new(FixedClassifier {
            label: "artificial",
            score: 0.9,
        }));
        let result = detector.classify_path(Path::new("/nonexistent/picture.jpg"));
        assert_eq!(result.label, DetectionLabel::Error);
        assert!(result.explanation.starts_with("Processing failed:"));
    }

    #[test]
    fn missing_model_short_circuits() {
        let detector = ImageDetector::new(
            Err(ModelError::BackendDisabled),
            RealityAssessor::default(),
            RemoteFetcher::new(Duration::from_secs(1)),
            false,
        );
        assert!(!detector.is_model_loaded());

        let result = detector.classify_path(Path::new("/does/not/matter.png"));
        assert_eq!(result.label, DetectionLabel::ModelError);
        assert_eq!(result.ai_likelihood, 0.5);
        assert!(result.reality_check.is_none());
    }
}
