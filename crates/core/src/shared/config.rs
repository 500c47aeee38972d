use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_DEVICE, DEFAULT_MAX_NUM_FACES, DEFAULT_MIN_DETECTION_CONFIDENCE,
    DEFAULT_MIN_TRACKING_CONFIDENCE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to open a camera and configure the face mesh.
///
/// Missing fields in a config file fall back to the defaults, so a file
/// containing `{}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Camera index (`0`), `/dev/videoN` path or backend-specific device name.
    pub device: String,
    pub max_num_faces: usize,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frame_rate: Option<u32>,
    /// Extra directory searched for model files after the cache.
    pub model_dir: Option<PathBuf>,
    pub detector_model_url: Option<String>,
    pub landmark_model_url: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            max_num_faces: DEFAULT_MAX_NUM_FACES,
            refine_landmarks: true,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_MIN_TRACKING_CONFIDENCE,
            frame_width: None,
            frame_height: None,
            frame_rate: None,
            model_dir: None,
            detector_model_url: None,
            landmark_model_url: None,
        }
    }
}

impl ExtractorConfig {
    /// Platform config file location: `<config dir>/Facemark/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the platform config file if one exists, defaults otherwise.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::Invalid("device must not be empty".into()));
        }
        if self.max_num_faces == 0 {
            return Err(ConfigError::Invalid(
                "max_num_faces must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if matches!(self.frame_width, Some(0)) || matches!(self.frame_height, Some(0)) {
            return Err(ConfigError::Invalid("frame size must be positive".into()));
        }
        Ok(())
    }

    pub fn landmark_count(&self) -> usize {
        if self.refine_landmarks {
            crate::shared::constants::REFINED_MESH_LANDMARKS
        } else {
            crate::shared::constants::MESH_LANDMARKS
        }
    }
}
