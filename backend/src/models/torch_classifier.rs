use image::RgbImage;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::to_chw;
use super::{ImageClassifier, InferenceError, ModelError, Prediction, rank_predictions};
use crate::config::{DeviceSelector, ModelConfig};

/// TorchScript image classifier. The module handle is not `Sync`, so calls
/// are serialized through a mutex.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    config: ModelConfig,
}

fn resolve_device(selector: DeviceSelector) -> Device {
    match selector {
        DeviceSelector::Cpu => Device::Cpu,
        DeviceSelector::Cuda => Device::Cuda(0),
        DeviceSelector::Auto => Device::cuda_if_available(),
    }
}

impl TorchClassifier {
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let device = resolve_device(config.device);
        log::info!(
            "Loading classifier from {} on {:?}",
            config.classifier_path.display(),
            device
        );
        let module = CModule::load_on_device(&config.classifier_path, device).map_err(|e| {
            ModelError::Load {
                path: config.classifier_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            module: Mutex::new(module),
            device,
            config: config.clone(),
        })
    }
}

impl ImageClassifier for TorchClassifier {
    fn predict(&self, image: &RgbImage) -> Result<Vec<Prediction>, InferenceError> {
        let size = self.config.input_size as i64;
        let data = to_chw(image, &self.config)?;
        let tensor = Tensor::from_slice(&data)
            .view([1, 3, size, size])
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Model("classifier lock poisoned".into()))?;
            module
                .forward_ts(&[tensor])
                .map_err(|e| InferenceError::Model(e.to_string()))?
        };

        let output_flat = output
            .softmax(-1, Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut probabilities = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut probabilities, num_elements);

        if num_elements != self.config.labels.len() {
            log::warn!(
                "Classifier emitted {} classes but {} labels are configured",
                num_elements,
                self.config.labels.len()
            );
        }

        let predictions = rank_predictions(&self.config.labels, &probabilities);
        if predictions.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }
        Ok(predictions)
    }
}
