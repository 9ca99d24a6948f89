use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/detector.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub captioning: CaptioningConfig,
    pub fetch: FetchConfig,
    pub reality: RealityConfig,
    pub video: VideoConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelector {
    Cpu,
    Cuda,
    Auto,
}

impl std::str::FromStr for DeviceSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceSelector::Cpu),
            "cuda" | "gpu" => Ok(DeviceSelector::Cuda),
            "auto" => Ok(DeviceSelector::Auto),
            other => Err(ConfigError::Invalid(format!("unknown device '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub classifier_path: PathBuf,
    /// Output labels in the order the classifier emits its logits.
    pub labels: Vec<String>,
    pub device: DeviceSelector,
    pub input_size: u32,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub resize_method: ResizeMethod,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classifier_path: PathBuf::from("models/ai-image-detector.pt"),
            labels: vec!["artificial".to_string(), "human".to_string()],
            device: DeviceSelector::Cpu,
            input_size: 224,
            mean: vec![0.5, 0.5, 0.5],
            std: vec![0.5, 0.5, 0.5],
            resize_method: ResizeMethod::Bilinear,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptioningConfig {
    /// Image-to-text endpoint; captioning is disabled when unset.
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealityConfig {
    pub check_remote_images: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub frame_stride: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_stride: 60,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/feedback.jsonl"),
        }
    }
}

impl AppConfig {
    /// Loads the YAML config named by `DETECTOR_CONFIG` (or the default path),
    /// then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DETECTOR_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| {
                    ConfigError::Invalid(format!("PORT must be a port number, got '{}'", port))
                })?;
        }
        if let Some(device) = lookup("DEVICE") {
            self.model.device = device.parse()?;
        }
        if let Some(model_path) = lookup("DETECTOR_MODEL_PATH") {
            self.model.classifier_path = PathBuf::from(model_path);
        }
        if let Some(endpoint) = lookup("CAPTION_ENDPOINT") {
            self.captioning.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("HF_API_TOKEN") {
            self.captioning.api_token = Some(token);
        }
        if let Some(feedback_path) = lookup("FEEDBACK_PATH") {
            self.feedback.path = PathBuf::from(feedback_path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video.frame_stride == 0 {
            return Err(ConfigError::Invalid("video.frame_stride must be at least 1".into()));
        }
        if self.model.labels.is_empty() {
            return Err(ConfigError::Invalid("model.labels must not be empty".into()));
        }
        if self.model.mean.len() != 3 || self.model.std.len() != 3 {
            return Err(ConfigError::Invalid(
                "model.mean and model.std need one value per RGB channel".into(),
            ));
        }
        if self.model.std.iter().any(|s| *s == 0.0) {
            return Err(ConfigError::Invalid("model.std values must be non-zero".into()));
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::Invalid("model.input_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config = AppConfig::from_yaml(
            r#"
video:
  frame_stride: 30
reality:
  check_remote_images: true
"#,
        )
        .unwrap();
        assert_eq!(config.video.frame_stride, 30);
        assert_eq!(config.video.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!(config.reality.check_remote_images);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.model.labels, vec!["artificial", "human"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("DEVICE", "CUDA"),
            ("CAPTION_ENDPOINT", "http://localhost:5000/caption"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.model.device, DeviceSelector::Cuda);
        assert_eq!(
            config.captioning.endpoint.as_deref(),
            Some("http://localhost:5000/caption")
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_stride_fails_validation() {
        let mut config = AppConfig::default();
        config.video.frame_stride = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, 8081);
    }
}
