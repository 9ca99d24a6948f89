pub mod explanation;
pub mod image_detector;
pub mod video_detector;

pub use image_detector::{ImageDetector, ImageSource, RemoteFetcher};
pub use video_detector::{VideoDetector, VideoError};
