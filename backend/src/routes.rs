use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{DetectionResult, FeedbackSubmission, RealityCheck};
use std::io::Write;
use std::path::Path;

use crate::detection::{ImageDetector, ImageSource, VideoDetector, VideoError};
use crate::feedback::feedback_service::{FeedbackError, FeedbackService};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
struct DetectionResponse {
    id: String,
    #[serde(flatten)]
    result: DetectionResult,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    classifier_loaded: bool,
    captioner_configured: bool,
}

#[derive(Deserialize)]
struct UrlRequest {
    url: String,
}

#[derive(Deserialize)]
struct VideoQuery {
    stride: Option<usize>,
}

#[derive(Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

struct Upload {
    bytes: Vec<u8>,
    suffix: String,
}

pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File suffix for the temp copy, kept so decoders can sniff by extension.
fn upload_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".upload".to_string())
}

/// Collects the first non-empty file field of a multipart body.
async fn read_upload(mut payload: Multipart, limits: UploadLimits) -> Result<Upload, HttpResponse> {
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        warn!("Malformed multipart payload: {}", e);
        HttpResponse::BadRequest().json(ErrorResponse::new(format!("Malformed upload: {}", e)))
    })? {
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                HttpResponse::BadRequest()
                    .json(ErrorResponse::new(format!("Malformed upload: {}", e)))
            })?;
            if data.len() + chunk.len() > limits.max_bytes {
                return Err(HttpResponse::PayloadTooLarge().json(ErrorResponse::new(format!(
                    "Upload exceeds {} bytes",
                    limits.max_bytes
                ))));
            }
            data.extend_from_slice(&chunk);
        }
        if !data.is_empty() {
            return Ok(Upload {
                bytes: data,
                suffix: upload_suffix(file_name.as_deref()),
            });
        }
    }
    Err(HttpResponse::BadRequest().json(ErrorResponse::new("No file uploaded")))
}

fn log_detection(id: &str, result: &DetectionResult) {
    match result.reality_check.as_ref().map(RealityCheck::reality_score) {
        Some(reality) => info!(
            "Detection {}: {} (ai_likelihood {:.3}, reality score {:.2})",
            id, result.label, result.ai_likelihood, reality
        ),
        None => info!(
            "Detection {}: {} (ai_likelihood {:.3})",
            id, result.label, result.ai_likelihood
        ),
    }
}

fn write_temp(upload: &Upload) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&upload.suffix)
        .tempfile()?;
    file.write_all(&upload.bytes)?;
    file.flush()?;
    Ok(file)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/detect/image").route(web::post().to(detect_image)))
        .service(web::resource("/api/detect/url").route(web::post().to(detect_url)))
        .service(web::resource("/api/detect/video").route(web::post().to(detect_video)))
        .service(web::resource("/api/feedback").route(web::post().to(submit_feedback)));
}

async fn health(detector: web::Data<ImageDetector>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        classifier_loaded: detector.is_model_loaded(),
        captioner_configured: detector.reality().has_captioner(),
    })
}

async fn detect_image(
    detector: web::Data<ImageDetector>,
    limits: web::Data<UploadLimits>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let upload = match read_upload(payload, **limits).await {
        Ok(upload) => upload,
        Err(response) => return Ok(response),
    };
    let id = content_hash(&upload.bytes);
    info!("Received image upload {} ({} bytes)", id, upload.bytes.len());

    let detector = detector.into_inner();
    let result = web::block(move || {
        let temp_image = write_temp(&upload)?;
        Ok::<_, std::io::Error>(detector.classify_path(temp_image.path()))
    })
    .await?;

    match result {
        Ok(result) => {
            log_detection(&id, &result);
            Ok(HttpResponse::Ok().json(DetectionResponse { id, result }))
        }
        Err(e) => {
            error!("Failed to stage upload {}: {}", id, e);
            Ok(HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Failed to store upload")))
        }
    }
}

async fn detect_url(
    detector: web::Data<ImageDetector>,
    request: web::Json<UrlRequest>,
) -> Result<HttpResponse, Error> {
    let source = ImageSource::parse(request.url.trim());
    if !matches!(source, ImageSource::Url(_)) {
        return Ok(HttpResponse::BadRequest()
            .json(ErrorResponse::new("Only http(s) URLs are supported")));
    }
    let id = content_hash(request.url.trim().as_bytes());
    info!("Classifying remote image {}", request.url);

    let detector = detector.into_inner();
    let result = web::block(move || detector.classify(&source)).await?;
    log_detection(&id, &result);
    Ok(HttpResponse::Ok().json(DetectionResponse { id, result }))
}

async fn detect_video(
    detector: web::Data<VideoDetector>,
    limits: web::Data<UploadLimits>,
    query: web::Query<VideoQuery>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let stride = query.stride.unwrap_or_else(|| detector.default_stride());
    if stride == 0 {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("stride must be at least 1")));
    }
    let upload = match read_upload(payload, **limits).await {
        Ok(upload) => upload,
        Err(response) => return Ok(response),
    };
    info!("Received video upload ({} bytes), stride {}", upload.bytes.len(), stride);

    let detector = detector.into_inner();
    let result = web::block(move || {
        let temp_video = write_temp(&upload).map_err(|e| VideoError::Open(e.to_string()))?;
        detector.process(temp_video.path(), stride)
    })
    .await?;

    match result {
        Ok(verdict) => Ok(HttpResponse::Ok().json(verdict)),
        Err(e) => {
            warn!("Video analysis failed: {}", e);
            Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse::new(e.to_string())))
        }
    }
}

async fn submit_feedback(
    feedback: web::Data<FeedbackService>,
    submission: web::Json<FeedbackSubmission>,
) -> HttpResponse {
    match feedback.record(submission.into_inner()).await {
        Ok(record) => HttpResponse::Created().json(serde_json::json!({ "id": record.id })),
        Err(FeedbackError::Invalid(reason)) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(reason))
        }
        Err(e) => {
            error!("Failed to record feedback: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Failed to record feedback"))
        }
    }
}
