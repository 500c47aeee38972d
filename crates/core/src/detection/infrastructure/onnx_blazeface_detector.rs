/// BlazeFace short-range face detector using ONNX Runtime via `ort`.
///
/// Finds face boxes plus six keypoints; the keypoints orient the ROI the
/// mesh network sees. Frames are letterboxed to the square model input so
/// faces are not distorted, and outputs are mapped back to normalized
/// coordinates of the original frame.
use std::path::Path;

use crate::detection::domain::face_detection::{FaceDetection, NUM_KEYPOINTS};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::{Frame, PixelFormat};

use super::execution_provider::{open_session, square_image_input};
use super::math::{nms, sigmoid};

/// BlazeFace short-range input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const NUM_COORDS: usize = 4 + NUM_KEYPOINTS * 2;

/// Raw scores are clipped before the sigmoid.
const SCORE_CLIP: f32 = 100.0;

/// Value of letterbox padding after normalization to `[-1, 1]` (black).
const PAD_VALUE: f32 = -1.0;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
    channels_first: bool,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    ///
    /// The input layout (NCHW or NHWC) is read from the model; a dynamic
    /// shape falls back to 128x128 NCHW.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let (input_size, channels_first) =
            square_image_input(&session).unwrap_or((INPUT_SIZE, true));
        let anchors = generate_anchors(input_size);
        log::debug!(
            "BlazeFace input {input_size}x{input_size} ({}), {} anchors",
            if channels_first { "NCHW" } else { "NHWC" },
            anchors.len()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
            channels_first,
            anchors,
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
        if frame.format() != PixelFormat::Rgb24 {
            return Err("BlazeFace expects an RGB frame".into());
        }
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        // 1. Preprocess: letterbox, normalize to [-1, 1]
        let letterbox = Letterbox::new(frame.width(), frame.height(), self.input_size);
        let input_tensor = preprocess(frame, &letterbox, self.input_size, self.channels_first);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // Two outputs: regressors [1, anchors, 16] and scores [1, anchors, 1].
        // Converters disagree on their order, so tell them apart by size.
        let num_anchors = self.anchors.len();
        let mut regressors = None;
        let mut scores = None;
        for i in 0..outputs.len() {
            let array = outputs[i].try_extract_array::<f32>()?;
            let data: Vec<f32> = array.iter().copied().collect();
            if data.len() == num_anchors * NUM_COORDS {
                regressors = Some(data);
            } else if data.len() == num_anchors {
                scores = Some(data);
            }
        }
        let (Some(regressors), Some(scores)) = (regressors, scores) else {
            return Err(format!(
                "BlazeFace model outputs do not match {num_anchors} anchors"
            )
            .into());
        };

        // 3. Decode + filter by confidence, 4. NMS
        let raw = decode(
            &regressors,
            &scores,
            &self.anchors,
            self.input_size,
            &letterbox,
            self.confidence,
        );
        Ok(nms(raw, NMS_IOU_THRESH, FaceDetection::bbox, |d| d.score))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Placement of the scaled frame inside the square model input.
#[derive(Clone, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    new_w: u32,
    new_h: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn new(frame_w: u32, frame_h: u32, target: u32) -> Self {
        let scale = target as f64 / frame_w.max(frame_h) as f64;
        let new_w = ((frame_w as f64 * scale).round() as u32).clamp(1, target);
        let new_h = ((frame_h as f64 * scale).round() as u32).clamp(1, target);
        Self {
            scale,
            new_w,
            new_h,
            pad_x: (target - new_w) / 2,
            pad_y: (target - new_h) / 2,
        }
    }

    /// Model-normalized point (fraction of the square input) to
    /// frame-normalized point.
    fn unmap_point(&self, x: f32, y: f32, target: u32) -> (f64, f64) {
        let t = target as f64;
        (
            (x as f64 * t - self.pad_x as f64) / self.new_w as f64,
            (y as f64 * t - self.pad_y as f64) / self.new_h as f64,
        )
    }

    fn unmap_size(&self, w: f32, h: f32, target: u32) -> (f64, f64) {
        let t = target as f64;
        (w as f64 * t / self.new_w as f64, h as f64 * t / self.new_h as f64)
    }
}

/// Letterbox the frame into a `size × size` float32 tensor in `[-1, 1]`.
fn preprocess(
    frame: &Frame,
    letterbox: &Letterbox,
    size: u32,
    channels_first: bool,
) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let shape = if channels_first {
        (1, 3, s, s)
    } else {
        (1, s, s, 3)
    };
    let mut tensor = ndarray::Array4::<f32>::from_elem(shape, PAD_VALUE);

    // Nearest-neighbor resize into the padded region
    for y in 0..letterbox.new_h as usize {
        let src_y = (((y as f64 + 0.5) / letterbox.scale) as usize).min(src_h - 1);
        let ty = letterbox.pad_y as usize + y;
        for x in 0..letterbox.new_w as usize {
            let src_x = (((x as f64 + 0.5) / letterbox.scale) as usize).min(src_w - 1);
            let tx = letterbox.pad_x as usize + x;
            for c in 0..3 {
                let v = src[[src_y, src_x, c]] as f32 / 127.5 - 1.0;
                if channels_first {
                    tensor[[0, c, ty, tx]] = v;
                } else {
                    tensor[[0, ty, tx, c]] = v;
                }
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Generate anchor centers for the short-range model.
///
/// Two feature maps: stride 8 with 2 anchors per cell and stride 16 with
/// 6 anchors per cell (896 anchors for a 128 input).
fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::new();

    for &(stride, num) in &strides {
        let grid_size = input_size as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Turn raw regressor/score tensors into frame-normalized detections.
fn decode(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    input_size: u32,
    letterbox: &Letterbox,
    confidence: f64,
) -> Vec<FaceDetection> {
    let s = input_size as f32;
    let mut dets = Vec::new();

    for (i, anchor) in anchors.iter().enumerate() {
        let Some(&raw_score) = scores.get(i) else {
            break;
        };
        let score = sigmoid(raw_score, SCORE_CLIP) as f64;
        if score < confidence {
            continue;
        }
        let Some(r) = regressors.get(i * NUM_COORDS..(i + 1) * NUM_COORDS) else {
            break;
        };

        let cx = anchor[0] + r[0] / s;
        let cy = anchor[1] + r[1] / s;
        let w = r[2] / s;
        let h = r[3] / s;

        let mut keypoints = [(0.0, 0.0); NUM_KEYPOINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            let kx = anchor[0] + r[4 + k * 2] / s;
            let ky = anchor[1] + r[4 + k * 2 + 1] / s;
            *kp = letterbox.unmap_point(kx, ky, input_size);
        }

        let (xmin, ymin) = letterbox.unmap_point(cx - w / 2.0, cy - h / 2.0, input_size);
        let (width, height) = letterbox.unmap_size(w, h, input_size);

        dets.push(FaceDetection {
            xmin,
            ymin,
            width,
            height,
            keypoints,
            score,
        });
    }

    dets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rgb_frame(w: u32, h: u32, value: u8) -> Frame {
        Frame::new(
            vec![value; (w * h * 3) as usize],
            w,
            h,
            PixelFormat::Rgb24,
            0,
        )
    }

    #[test]
    fn test_preprocess_shape_nchw() {
        let frame = rgb_frame(200, 100, 128);
        let lb = Letterbox::new(200, 100, 128);
        let tensor = preprocess(&frame, &lb, 128, true);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_shape_nhwc() {
        let frame = rgb_frame(200, 100, 128);
        let lb = Letterbox::new(200, 100, 128);
        let tensor = preprocess(&frame, &lb, 128, false);
        assert_eq!(tensor.shape(), &[1, 128, 128, 3]);
    }

    #[test]
    fn test_preprocess_normalizes_to_signed_unit_range() {
        let lb = Letterbox::new(50, 50, 128);
        let white = preprocess(&rgb_frame(50, 50, 255), &lb, 128, true);
        let black = preprocess(&rgb_frame(50, 50, 0), &lb, 128, true);
        assert_relative_eq!(white[[0, 0, 64, 64]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(black[[0, 2, 64, 64]], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_preprocess_wide_frame_is_padded_top_and_bottom() {
        let frame = rgb_frame(256, 128, 255);
        let lb = Letterbox::new(256, 128, 128);
        assert_eq!((lb.new_w, lb.new_h, lb.pad_x, lb.pad_y), (128, 64, 0, 32));

        let tensor = preprocess(&frame, &lb, 128, true);
        assert_relative_eq!(tensor[[0, 0, 0, 64]], PAD_VALUE);
        assert_relative_eq!(tensor[[0, 0, 127, 64]], PAD_VALUE);
        assert_relative_eq!(tensor[[0, 0, 64, 64]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_letterbox_unmap_removes_padding() {
        let lb = Letterbox::new(256, 128, 128);
        let (x, y) = lb.unmap_point(0.5, 0.5, 128);
        assert_relative_eq!(x, 0.5);
        assert_relative_eq!(y, 0.5);
        let (_, top) = lb.unmap_point(0.5, 0.25, 128);
        assert_relative_eq!(top, 0.0);
        let (w, h) = lb.unmap_size(0.25, 0.25, 128);
        assert_relative_eq!(w, 0.25);
        assert_relative_eq!(h, 0.5);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors(128).len(), 896);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors(128) {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    fn single_anchor_outputs(raw_score: f32) -> (Vec<f32>, Vec<f32>) {
        let mut reg = vec![0.0f32; NUM_COORDS];
        reg[2] = 32.0; // w = 0.25
        reg[3] = 32.0; // h = 0.25
        reg[4] = -8.0; // right eye x offset
        reg[6] = 8.0; // left eye x offset
        (reg, vec![raw_score])
    }

    #[test]
    fn test_decode_box_and_keypoints() {
        let (reg, scores) = single_anchor_outputs(5.0);
        let lb = Letterbox::new(640, 640, 128);
        let dets = decode(&reg, &scores, &[[0.5, 0.5]], 128, &lb, 0.5);

        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_relative_eq!(d.xmin, 0.375, epsilon = 1e-6);
        assert_relative_eq!(d.ymin, 0.375, epsilon = 1e-6);
        assert_relative_eq!(d.width, 0.25, epsilon = 1e-6);
        assert_relative_eq!(d.height, 0.25, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints[0].0, 0.4375, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints[1].0, 0.5625, epsilon = 1e-6);
        assert_relative_eq!(d.keypoints[2].1, 0.5, epsilon = 1e-6);
        assert!(d.score > 0.99);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let (reg, scores) = single_anchor_outputs(-3.0);
        let lb = Letterbox::new(640, 640, 128);
        assert!(decode(&reg, &scores, &[[0.5, 0.5]], 128, &lb, 0.5).is_empty());
    }

    #[test]
    fn test_decode_stops_on_short_outputs() {
        let lb = Letterbox::new(640, 640, 128);
        let dets = decode(&[0.0; 4], &[5.0, 5.0], &[[0.5, 0.5], [0.2, 0.2]], 128, &lb, 0.5);
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_then_nms_keeps_best_of_overlapping() {
        let (mut reg, _) = single_anchor_outputs(0.0);
        reg.extend_from_slice(&reg.clone());
        let scores = vec![2.0, 4.0];
        let lb = Letterbox::new(640, 640, 128);
        let dets = decode(&reg, &scores, &[[0.5, 0.5], [0.51, 0.5]], 128, &lb, 0.5);
        assert_eq!(dets.len(), 2);

        let kept = nms(dets, NMS_IOU_THRESH, FaceDetection::bbox, |d| d.score);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, sigmoid(4.0, SCORE_CLIP) as f64);
    }
}
