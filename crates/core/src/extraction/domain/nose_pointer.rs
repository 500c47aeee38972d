use serde::Serialize;

use super::face_coordinates::Point;

/// Nose displacement that moves the pointer from the grid center to the
/// left edge. Negative because the camera image is mirrored.
pub const DEFAULT_X_SPAN: f64 = -0.07;

/// Nose displacement that moves the pointer from the grid center to the
/// bottom edge.
pub const DEFAULT_Y_SPAN: f64 = 0.1;

/// Cell on the pointer grid. Serializes as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "[u32; 2]")]
pub struct GridPoint {
    pub x: u32,
    pub y: u32,
}

impl From<GridPoint> for [u32; 2] {
    fn from(p: GridPoint) -> Self {
        [p.x, p.y]
    }
}

/// Turns head movement into a position on a `width × height` grid.
///
/// The nose position recorded by [`calibrate`](Self::calibrate) maps to the
/// grid center; moving the nose by one span reaches the grid edge.
#[derive(Clone, Debug)]
pub struct NosePointer {
    width: u32,
    height: u32,
    x_span: f64,
    y_span: f64,
    origin: Option<Point>,
}

impl NosePointer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_spans(width, height, DEFAULT_X_SPAN, DEFAULT_Y_SPAN)
    }

    pub fn with_spans(width: u32, height: u32, x_span: f64, y_span: f64) -> Self {
        Self {
            width,
            height,
            x_span,
            y_span,
            origin: None,
        }
    }

    /// Records the neutral nose position.
    pub fn calibrate(&mut self, origin: Point) {
        log::debug!("Pointer calibrated at ({:.4}, {:.4})", origin.x, origin.y);
        self.origin = Some(origin);
    }

    pub fn is_calibrated(&self) -> bool {
        self.origin.is_some()
    }

    /// Grid cell for a nose position, `None` until calibrated.
    pub fn map(&self, nose: Point) -> Option<GridPoint> {
        let origin = self.origin?;
        Some(GridPoint {
            x: map_axis(nose.x, origin.x, self.x_span, self.width),
            y: map_axis(nose.y, origin.y, self.y_span, self.height),
        })
    }
}

/// Linear map `a·v + b` with `a = extent / (2·span)` and
/// `b = extent/2 − a·origin`, clamped onto the grid.
///
/// Evaluated as `extent/2 + a·(v − origin)` so the origin lands exactly on
/// the center cell.
fn map_axis(value: f64, origin: f64, span: f64, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    let e = extent as f64;
    let a = e / (2.0 * span);
    let g = e / 2.0 + a * (value - origin);
    if !g.is_finite() {
        return extent / 2;
    }
    g.clamp(0.0, e - 1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn calibrated() -> NosePointer {
        let mut pointer = NosePointer::new(80, 50);
        pointer.calibrate(Point::new(0.5, 0.5));
        pointer
    }

    #[test]
    fn test_uncalibrated_maps_nothing() {
        let pointer = NosePointer::new(80, 50);
        assert!(!pointer.is_calibrated());
        assert_eq!(pointer.map(Point::new(0.5, 0.5)), None);
    }

    #[test]
    fn test_origin_maps_to_center() {
        assert_eq!(
            calibrated().map(Point::new(0.5, 0.5)),
            Some(GridPoint { x: 40, y: 25 })
        );
    }

    #[rstest]
    // mirrored: moving the nose left in the image moves the pointer right
    #[case(Point::new(0.43, 0.5), GridPoint { x: 79, y: 25 })]
    #[case(Point::new(0.57, 0.5), GridPoint { x: 0, y: 25 })]
    #[case(Point::new(0.5, 0.6), GridPoint { x: 40, y: 49 })]
    #[case(Point::new(0.5, 0.4), GridPoint { x: 40, y: 0 })]
    fn test_one_span_reaches_edge(#[case] nose: Point, #[case] expected: GridPoint) {
        assert_eq!(calibrated().map(nose), Some(expected));
    }

    #[test]
    fn test_far_movement_is_clamped() {
        let p = calibrated().map(Point::new(0.0, 1.0)).unwrap();
        assert_eq!(p, GridPoint { x: 79, y: 49 });
    }

    #[test]
    fn test_half_span() {
        // 0.05 down is half the vertical span: a quarter grid below center
        let p = calibrated().map(Point::new(0.5, 0.55)).unwrap();
        assert_eq!(p.y, 37);
    }

    #[test]
    fn test_zero_span_stays_on_grid() {
        let mut pointer = NosePointer::with_spans(10, 10, 0.0, 0.1);
        pointer.calibrate(Point::new(0.5, 0.5));
        let p = pointer.map(Point::new(0.5, 0.5)).unwrap();
        assert!(p.x < 10);
    }

    #[test]
    fn test_serializes_as_pair() {
        let json = serde_json::to_string(&GridPoint { x: 3, y: 7 }).unwrap();
        assert_eq!(json, "[3,7]");
    }
}
