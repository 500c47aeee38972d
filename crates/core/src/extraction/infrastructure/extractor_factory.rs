use std::path::PathBuf;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::infrastructure::camera_device::CameraDevice;
use crate::capture::infrastructure::ffmpeg_source::{CaptureSettings, FfmpegFrameSource};
use crate::detection::domain::face_mesh_landmarker::FaceMeshLandmarker;
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::detection::infrastructure::onnx_face_mesh_model::OnnxFaceMeshModel;
use crate::extraction::landmark_extractor::LandmarkExtractor;
use crate::shared::config::ExtractorConfig;
use crate::shared::constants::{
    DETECTOR_MODEL_NAME, LANDMARK_MODEL_NAME, REFINED_LANDMARK_MODEL_NAME,
};
use crate::shared::model_resolver::{self, ProgressFn};

/// Download progress callback: `(model_name, bytes_downloaded, total_bytes)`.
pub type DownloadProgress = fn(&str, u64, u64);

/// Opens the configured camera and builds a ready extractor around it.
pub fn open_extractor(
    config: &ExtractorConfig,
    progress: Option<DownloadProgress>,
) -> Result<LandmarkExtractor, Box<dyn std::error::Error>> {
    config.validate()?;
    // Models resolve before the camera opens.
    let landmarker = build_landmarker(config, progress)?;
    let device = CameraDevice::parse(&config.device);
    let source = FfmpegFrameSource::open_device(&device, &capture_settings(config))?;
    Ok(LandmarkExtractor::new(Box::new(source), Box::new(landmarker)))
}

/// Builds an extractor that reads from an already opened source, such as a
/// recorded video.
pub fn open_extractor_with_source(
    config: &ExtractorConfig,
    source: Box<dyn FrameSource>,
    progress: Option<DownloadProgress>,
) -> Result<LandmarkExtractor, Box<dyn std::error::Error>> {
    config.validate()?;
    let landmarker = build_landmarker(config, progress)?;
    Ok(LandmarkExtractor::new(source, Box::new(landmarker)))
}

/// Builds an extractor for still images that never opens a camera.
pub fn open_image_extractor(
    config: &ExtractorConfig,
    progress: Option<DownloadProgress>,
) -> Result<LandmarkExtractor, Box<dyn std::error::Error>> {
    config.validate()?;
    let landmarker = build_landmarker(config, progress)?;
    Ok(LandmarkExtractor::for_images(Box::new(landmarker)))
}

/// Resolves both models and wires detector, mesh network and tracking.
pub fn build_landmarker(
    config: &ExtractorConfig,
    progress: Option<DownloadProgress>,
) -> Result<FaceMeshLandmarker, Box<dyn std::error::Error>> {
    let detector_path = resolve_model(
        DETECTOR_MODEL_NAME,
        config.detector_model_url.as_deref(),
        config,
        progress,
    )?;
    let landmark_path = resolve_model(
        landmark_model_name(config),
        config.landmark_model_url.as_deref(),
        config,
        progress,
    )?;

    let detector = OnnxBlazefaceDetector::new(&detector_path, config.min_detection_confidence)?;
    let model = OnnxFaceMeshModel::new(&landmark_path, config.landmark_count())?;
    log::info!(
        "Face mesh ready: max {} face(s), {} landmarks",
        config.max_num_faces,
        config.landmark_count()
    );

    Ok(FaceMeshLandmarker::new(
        Box::new(detector),
        Box::new(model),
        config.max_num_faces,
        config.min_tracking_confidence,
    ))
}

/// The attention model is needed for the iris points of a refined mesh.
pub fn landmark_model_name(config: &ExtractorConfig) -> &'static str {
    if config.refine_landmarks {
        REFINED_LANDMARK_MODEL_NAME
    } else {
        LANDMARK_MODEL_NAME
    }
}

pub fn capture_settings(config: &ExtractorConfig) -> CaptureSettings {
    CaptureSettings {
        frame_width: config.frame_width,
        frame_height: config.frame_height,
        frame_rate: config.frame_rate,
    }
}

fn resolve_model(
    name: &'static str,
    url: Option<&str>,
    config: &ExtractorConfig,
    progress: Option<DownloadProgress>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let callback = progress.map(|report| -> ProgressFn {
        Box::new(move |downloaded, total| report(name, downloaded, total))
    });
    let path = model_resolver::resolve(name, url, config.model_dir.as_deref(), callback)?;
    log::debug!("Using {} for {name}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, REFINED_LANDMARK_MODEL_NAME)]
    #[case(false, LANDMARK_MODEL_NAME)]
    fn test_landmark_model_name(#[case] refine: bool, #[case] expected: &str) {
        let config = ExtractorConfig {
            refine_landmarks: refine,
            ..ExtractorConfig::default()
        };
        assert_eq!(landmark_model_name(&config), expected);
    }

    #[test]
    fn test_capture_settings_copies_hints() {
        let config = ExtractorConfig {
            frame_width: Some(640),
            frame_height: Some(480),
            frame_rate: Some(30),
            ..ExtractorConfig::default()
        };
        assert_eq!(
            capture_settings(&config),
            CaptureSettings {
                frame_width: Some(640),
                frame_height: Some(480),
                frame_rate: Some(30),
            }
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_before_opening_anything() {
        let config = ExtractorConfig {
            max_num_faces: 0,
            ..ExtractorConfig::default()
        };
        let err = open_extractor(&config, None).err().unwrap();
        assert!(err.to_string().contains("max_num_faces"));
    }
}
