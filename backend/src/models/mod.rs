pub mod caption_service;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch_classifier;

use image::RgbImage;
use std::sync::Arc;

use crate::config::AppConfig;
use caption_service::HttpCaptioner;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Classifier backend not compiled in (enable the `torch` feature)")]
    BackendDisabled,
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Captioning is not configured")]
    NotConfigured,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to fetch remote image: {0}")]
    Fetch(String),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    Model(String),
    #[error("Classifier returned no predictions")]
    EmptyOutput,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("Caption request failed: {0}")]
    Request(String),
    #[error("Caption endpoint returned status {0}")]
    Status(u16),
    #[error("Caption response had no generated text")]
    EmptyResponse,
    #[error("Failed to encode image for captioning: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

/// An image classifier producing label/confidence pairs, highest score first.
pub trait ImageClassifier: Send + Sync {
    fn predict(&self, image: &RgbImage) -> Result<Vec<Prediction>, InferenceError>;
}

pub trait Captioner: Send + Sync {
    fn caption(&self, image: &RgbImage) -> Result<String, CaptionError>;
}

/// Pairs raw class probabilities with their labels and orders them by score.
#[cfg_attr(not(feature = "torch"), allow(dead_code))]
pub fn rank_predictions(labels: &[String], probabilities: &[f32]) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = labels
        .iter()
        .zip(probabilities.iter())
        .map(|(label, score)| Prediction {
            label: label.clone(),
            score: *score,
        })
        .collect();
    predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    predictions
}

#[cfg(feature = "torch")]
pub fn load_classifier(config: &AppConfig) -> Result<Arc<dyn ImageClassifier>, ModelError> {
    let classifier = torch_classifier::TorchClassifier::load(&config.model)?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "torch"))]
pub fn load_classifier(_config: &AppConfig) -> Result<Arc<dyn ImageClassifier>, ModelError> {
    Err(ModelError::BackendDisabled)
}

pub fn load_captioner(config: &AppConfig) -> Result<Arc<dyn Captioner>, ModelError> {
    let endpoint = config
        .captioning
        .endpoint
        .clone()
        .ok_or(ModelError::NotConfigured)?;
    let captioner = HttpCaptioner::new(
        endpoint,
        config.captioning.api_token.clone(),
        std::time::Duration::from_secs(config.captioning.timeout_secs),
    )?;
    Ok(Arc::new(captioner))
}
