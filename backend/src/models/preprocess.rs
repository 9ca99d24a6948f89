#![cfg_attr(not(feature = "torch"), allow(dead_code))]

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::InferenceError;
use crate::config::{ModelConfig, ResizeMethod};

fn filter_for(method: ResizeMethod) -> FilterType {
    match method {
        ResizeMethod::Nearest => FilterType::Nearest,
        ResizeMethod::Bilinear => FilterType::Triangle,
        ResizeMethod::Bicubic => FilterType::CatmullRom,
        ResizeMethod::Lanczos => FilterType::Lanczos3,
    }
}

/// Resizes to the model's square input and flattens into normalized CHW floats.
pub fn to_chw(image: &RgbImage, config: &ModelConfig) -> Result<Vec<f32>, InferenceError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(InferenceError::Preprocessing("image has no pixels".into()));
    }
    let size = config.input_size;
    let resized = imageops::resize(image, size, size, filter_for(config.resize_method));

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            data[channel * plane + i] = (value - config.mean[channel]) / config.std[channel];
        }
    }
    Ok(data)
}
