pub mod ffmpeg_source;
pub mod frame_sampler;

use std::path::Path;

use crate::config::VideoConfig;
pub use ffmpeg_source::FfmpegSource;
pub use frame_sampler::{FrameSampler, FrameSource, SampledFrame, SamplerError};

pub fn open_video(
    video_path: &Path,
    config: &VideoConfig,
    stride: usize,
) -> Result<FrameSampler<FfmpegSource>, SamplerError> {
    let source = FfmpegSource::open(video_path, config)?;
    Ok(FrameSampler::new(source, stride))
}
