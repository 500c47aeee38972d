/// Keypoints come in detector order: right eye, left eye, nose tip, mouth
/// center, right ear tragion, left ear tragion. Only the eyes are read, to
/// orient the ROI.
pub const RIGHT_EYE: usize = 0;
pub const LEFT_EYE: usize = 1;

pub const NUM_KEYPOINTS: usize = 6;

/// One detected face. All coordinates are normalized to the frame, so
/// `(0, 0)` is the top-left corner and `(1, 1)` the bottom-right.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
    pub keypoints: [(f64, f64); NUM_KEYPOINTS],
    pub score: f64,
}

impl FaceDetection {
    /// Box as `[x1, y1, x2, y2]`.
    pub fn bbox(&self) -> [f64; 4] {
        [
            self.xmin,
            self.ymin,
            self.xmin + self.width,
            self.ymin + self.height,
        ]
    }

    pub fn center(&self) -> (f64, f64) {
        (self.xmin + self.width / 2.0, self.ymin + self.height / 2.0)
    }
}
