use std::time::Instant;

use thiserror::Error;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::detection::domain::face_landmarker::{FaceLandmarker, RunningMode};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::extraction::domain::face_coordinates::{
    landmark_point, FaceCoordinates, MissingLandmark, Point,
};
use crate::extraction::extraction_logger::{ExtractionLogger, NullExtractionLogger};
use crate::shared::constants::UPPER_LIP;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("landmark inference failed: {0}")]
    Inference(String),
    #[error("landmark {index} requested but the mesh has {available} points")]
    MissingLandmark { index: usize, available: usize },
    #[error("frame holds {actual} bytes but {width}x{height} needs {expected}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("extractor is closed")]
    Closed,
}

impl From<MissingLandmark> for ExtractError {
    fn from(e: MissingLandmark) -> Self {
        ExtractError::MissingLandmark {
            index: e.index,
            available: e.available,
        }
    }
}

/// Reads frames from a camera and reports nose and lip positions.
///
/// Owns both the frame source and the face landmarker; they are released by
/// [`close`](Self::close) or when the extractor is dropped. Live operations
/// run the landmarker in stream mode so a face found in one frame is
/// tracked into the next.
pub struct LandmarkExtractor {
    source: Option<Box<dyn FrameSource>>,
    landmarker: Option<Box<dyn FaceLandmarker>>,
    logger: Box<dyn ExtractionLogger>,
}

impl LandmarkExtractor {
    pub fn new(source: Box<dyn FrameSource>, landmarker: Box<dyn FaceLandmarker>) -> Self {
        Self {
            source: Some(source),
            landmarker: Some(landmarker),
            logger: Box::new(NullExtractionLogger),
        }
    }

    /// Extractor for still images only; the live operations report a
    /// closed capture source.
    pub fn for_images(landmarker: Box<dyn FaceLandmarker>) -> Self {
        Self {
            source: None,
            landmarker: Some(landmarker),
            logger: Box::new(NullExtractionLogger),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn ExtractionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Nose, upper lip and lower lip of the first face in the next frame.
    ///
    /// `Ok(None)` when the frame holds no face.
    pub fn capture_and_extract_six(&mut self) -> Result<Option<FaceCoordinates>, ExtractError> {
        let faces = self.capture_and_process()?;
        Ok(faces
            .first()
            .map(FaceCoordinates::from_landmarks)
            .transpose()?)
    }

    /// Landmark 0 of the first face in the next frame.
    pub fn capture_and_extract_one(&mut self) -> Result<Option<Point>, ExtractError> {
        let faces = self.capture_and_process()?;
        first_point(&faces)
    }

    /// Landmark 0 of the first face in a caller-supplied frame.
    ///
    /// Runs a fresh detection without touching the tracking state of the
    /// live operations, so the result depends on `image` alone.
    pub fn extract_from_image(&mut self, image: &Frame) -> Result<Option<Point>, ExtractError> {
        if self.landmarker.is_none() {
            return Err(ExtractError::Closed);
        }
        let faces = self.process(image, RunningMode::Image)?;
        first_point(&faces)
    }

    /// Releases the camera and the models. Safe to call more than once.
    pub fn close(&mut self) {
        let had_resources = self.source.is_some() || self.landmarker.is_some();
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.landmarker = None;
        if had_resources {
            self.logger.summary();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none() && self.landmarker.is_none()
    }

    fn capture_and_process(&mut self) -> Result<Vec<FaceLandmarks>, ExtractError> {
        if self.landmarker.is_none() {
            return Err(ExtractError::Closed);
        }
        let source = self.source.as_mut().ok_or(CaptureError::Closed)?;

        let t0 = Instant::now();
        let frame = source.read()?;
        self.logger
            .timing("capture", t0.elapsed().as_secs_f64() * 1000.0);

        self.process(&frame, RunningMode::Stream)
    }

    fn process(
        &mut self,
        frame: &Frame,
        mode: RunningMode,
    ) -> Result<Vec<FaceLandmarks>, ExtractError> {
        let landmarker = self.landmarker.as_mut().ok_or(ExtractError::Closed)?;
        if !frame.is_well_formed() {
            return Err(ExtractError::InvalidFrame {
                width: frame.width(),
                height: frame.height(),
                expected: frame.expected_len(),
                actual: frame.data().len(),
            });
        }

        let t0 = Instant::now();
        let rgb = frame.to_rgb();
        self.logger
            .timing("convert", t0.elapsed().as_secs_f64() * 1000.0);

        let t0 = Instant::now();
        let faces = landmarker
            .process(&rgb, mode)
            .map_err(|e| ExtractError::Inference(e.to_string()))?;
        self.logger
            .timing("inference", t0.elapsed().as_secs_f64() * 1000.0);
        self.logger.frame(!faces.is_empty());

        Ok(faces)
    }
}

impl Drop for LandmarkExtractor {
    fn drop(&mut self) {
        self.close();
    }
}

fn first_point(faces: &[FaceLandmarks]) -> Result<Option<Point>, ExtractError> {
    Ok(faces
        .first()
        .map(|face| landmark_point(face, UPPER_LIP))
        .transpose()?)
}
