use serde::Serialize;
use thiserror::Error;

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::constants::{LOWER_LIP, NOSE_TIP, UPPER_LIP};

/// Normalized `(x, y)` position in the frame. Serializes as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("landmark {index} requested but the mesh has {available} points")]
pub struct MissingLandmark {
    pub index: usize,
    pub available: usize,
}

/// Reads one landmark of a face as a 2-D point, dropping depth.
pub fn landmark_point(landmarks: &FaceLandmarks, index: usize) -> Result<Point, MissingLandmark> {
    landmarks
        .get(index)
        .map(|lm| Point::new(lm.x, lm.y))
        .ok_or(MissingLandmark {
            index,
            available: landmarks.len(),
        })
}

/// Nose tip and lip midpoints of one face.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceCoordinates {
    pub nose: Point,
    pub upper_lip: Point,
    pub lower_lip: Point,
}

impl FaceCoordinates {
    pub fn from_landmarks(landmarks: &FaceLandmarks) -> Result<Self, MissingLandmark> {
        Ok(Self {
            nose: landmark_point(landmarks, NOSE_TIP)?,
            upper_lip: landmark_point(landmarks, UPPER_LIP)?,
            lower_lip: landmark_point(landmarks, LOWER_LIP)?,
        })
    }

    /// `[nose_x, nose_y, upper_lip_x, upper_lip_y, lower_lip_x, lower_lip_y]`
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.nose.x,
            self.nose.y,
            self.upper_lip.x,
            self.upper_lip.y,
            self.lower_lip.x,
            self.lower_lip.y,
        ]
    }
}
