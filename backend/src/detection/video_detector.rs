use image::{DynamicImage, ImageFormat};
use shared::{VideoLabel, VideoResult};
use std::path::Path;
use std::sync::Arc;

use super::image_detector::ImageDetector;
use crate::config::VideoConfig;
use crate::video::{FrameSampler, FrameSource, SampledFrame, SamplerError, open_video};

const FAKE_FRAME_THRESHOLD: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Could not open video file: {0}")]
    Open(String),
    #[error("No frames analyzed")]
    NoFramesAnalyzed,
}

impl From<SamplerError> for VideoError {
    fn from(err: SamplerError) -> Self {
        match err {
            SamplerError::Open(reason) => VideoError::Open(reason),
            other => VideoError::Open(other.to_string()),
        }
    }
}

/// Running sum of per-frame AI likelihoods.
#[derive(Debug, Default, Clone)]
pub struct ScoreTally {
    total: f64,
    count: usize,
    fake: usize,
}

impl ScoreTally {
    pub fn record(&mut self, score: f32) {
        self.total += score as f64;
        self.count += 1;
        if score > FAKE_FRAME_THRESHOLD {
            self.fake += 1;
        }
    }

    pub fn verdict(&self) -> Result<VideoResult, VideoError> {
        if self.count == 0 {
            return Err(VideoError::NoFramesAnalyzed);
        }
        let average_score = (self.total / self.count as f64) as f32;
        let confidence = (average_score * 100.0).round() as u32;
        let label = if average_score > FAKE_FRAME_THRESHOLD {
            VideoLabel::Fake
        } else {
            VideoLabel::Real
        };
        Ok(VideoResult {
            label,
            average_score,
            frame_count: self.count,
            fake_frame_count: self.fake,
            summary: format!(
                "Analyzed {} frames. {} detected as manipulated. Average anomaly score: {}%",
                self.count, self.fake, confidence
            ),
        })
    }
}

pub struct VideoDetector {
    image_detector: Arc<ImageDetector>,
    config: VideoConfig,
}

impl VideoDetector {
    pub fn new(image_detector: Arc<ImageDetector>, config: VideoConfig) -> Self {
        Self {
            image_detector,
            config,
        }
    }

    pub fn default_stride(&self) -> usize {
        self.config.frame_stride
    }

    pub fn process(&self, video_path: &Path, stride: usize) -> Result<VideoResult, VideoError> {
        let sampler = open_video(video_path, &self.config, stride)?;
        log::info!(
            "Processing {} every {} frames",
            video_path.display(),
            sampler.stride()
        );
        self.analyze(sampler)
    }

    pub fn analyze<S: FrameSource>(
        &self,
        sampler: FrameSampler<S>,
    ) -> Result<VideoResult, VideoError> {
        let mut tally = ScoreTally::default();
        for frame in sampler {
            match frame {
                Ok(frame) => {
                    if let Some(score) = self.score_frame(&frame) {
                        tally.record(score);
                    }
                }
                Err(e) => {
                    log::warn!("Stopping frame sampling early: {}", e);
                    break;
                }
            }
        }
        tally.verdict()
    }

    /// Classifies one frame through a temporary JPEG that is removed on return.
    fn score_frame(&self, frame: &SampledFrame) -> Option<f32> {
        let temp_frame = match tempfile::Builder::new()
            .prefix("frame-")
            .suffix(".jpg")
            .tempfile()
        {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Frame {}: could not create temp file: {}", frame.index, e);
                return None;
            }
        };

        let encoded = DynamicImage::ImageRgb8(frame.image.clone())
            .save_with_format(temp_frame.path(), ImageFormat::Jpeg);
        if let Err(e) = encoded {
            log::warn!("Frame {}: could not write temp frame: {}", frame.index, e);
            return None;
        }

        let result = self.image_detector.score_path(temp_frame.path());
        if !result.label.is_scored() {
            log::warn!(
                "Frame analysis error at frame {}: {}",
                frame.index,
                result.explanation
            );
            return None;
        }
        log::debug!("Frame {} scored {:.4}", frame.index, result.ai_likelihood);
        Some(result.ai_likelihood)
    }
}
