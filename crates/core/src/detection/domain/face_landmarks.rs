//! Face mesh landmarks for a single face.
//!
//! Coordinates are normalized to the frame: `x` by width, `y` by height.
//! `z` is depth relative to the head center, on roughly the same scale as
//! `x`; smaller values are closer to the camera.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<Landmark>,
    /// Probability that the ROI actually contains a face, in `[0, 1]`.
    presence: f64,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>, presence: f64) -> Self {
        Self { points, presence }
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn presence(&self) -> f64 {
        self.presence
    }

    /// Keep only the first `count` points.
    pub fn truncate(&mut self, count: usize) {
        self.points.truncate(count);
    }

    /// Axis-aligned `[x1, y1, x2, y2]` around all points.
    pub fn bounding_box(&self) -> Option<[f64; 4]> {
        let first = self.points.first()?;
        let init = [first.x, first.y, first.x, first.y];
        Some(self.points.iter().fold(init, |b, p| {
            [b[0].min(p.x), b[1].min(p.y), b[2].max(p.x), b[3].max(p.y)]
        }))
    }
}
