/// Face mesh landmark network using ONNX Runtime via `ort`.
///
/// Takes a rotated face ROI, resamples it into the square model input and
/// maps the predicted mesh back to normalized frame coordinates.
use std::path::Path;

use crate::detection::domain::face_landmarks::{FaceLandmarks, Landmark};
use crate::detection::domain::face_roi::FaceRoi;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::shared::constants::MESH_LANDMARKS;
use crate::shared::frame::{Frame, PixelFormat};

use super::attention_mesh;
use super::execution_provider::{open_session, square_image_input};
use super::math::{sample_bilinear, sigmoid};

/// Face mesh input resolution when the model does not declare one.
const DEFAULT_INPUT_SIZE: u32 = 192;

/// Presence logits are clipped before the sigmoid.
const PRESENCE_CLIP: f32 = 100.0;

pub struct OnnxFaceMeshModel {
    session: ort::session::Session,
    input_size: u32,
    channels_first: bool,
    landmark_count: usize,
}

impl OnnxFaceMeshModel {
    /// Load a face mesh ONNX model that reports `landmark_count` points
    /// (468, or 478 with iris refinement).
    pub fn new(
        model_path: &Path,
        landmark_count: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let (input_size, channels_first) =
            square_image_input(&session).unwrap_or((DEFAULT_INPUT_SIZE, true));
        log::debug!(
            "Face mesh input {input_size}x{input_size} ({}), keeping {landmark_count} landmarks",
            if channels_first { "NCHW" } else { "NHWC" }
        );
        Ok(Self {
            session,
            input_size,
            channels_first,
            landmark_count,
        })
    }
}

impl LandmarkModel for OnnxFaceMeshModel {
    fn run(
        &mut self,
        frame: &Frame,
        roi: &FaceRoi,
    ) -> Result<FaceLandmarks, Box<dyn std::error::Error>> {
        if frame.format() != PixelFormat::Rgb24 {
            return Err("face mesh expects an RGB frame".into());
        }

        let input_tensor = crop_roi(frame, roi, self.input_size, self.channels_first);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let mut flat = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let array = outputs[i].try_extract_array::<f32>()?;
            flat.push(array.iter().copied().collect::<Vec<f32>>());
        }

        let landmarks = decode(
            &flat,
            self.landmark_count,
            roi,
            self.input_size,
            frame.width(),
            frame.height(),
        )?;
        Ok(landmarks)
    }
}

/// Resample the rotated ROI into a `size × size` tensor in `[0, 1]`.
///
/// Pixels that fall outside the frame read as black.
fn crop_roi(frame: &Frame, roi: &FaceRoi, size: u32, channels_first: bool) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let s = size as usize;

    let shape = if channels_first {
        (1, 3, s, s)
    } else {
        (1, s, s, 3)
    };
    let mut tensor = ndarray::Array4::<f32>::zeros(shape);

    for row in 0..s {
        let v = (row as f64 + 0.5) / s as f64;
        for col in 0..s {
            let u = (col as f64 + 0.5) / s as f64;
            let (nx, ny) = roi.project(u, v, frame.width(), frame.height());
            for c in 0..3 {
                let value = sample_bilinear(&src, nx * fw, ny * fh, c) / 255.0;
                if channels_first {
                    tensor[[0, c, row, col]] = value;
                } else {
                    tensor[[0, row, col, c]] = value;
                }
            }
        }
    }

    tensor
}

/// Pick the mesh and presence tensors out of the raw outputs and project
/// the mesh into frame space.
///
/// The mesh is the first output holding at least 468 `(x, y, z)` triples.
/// Attention models report lips, eyes and irises as separate `(x, y)`
/// outputs, which are merged into the mesh. The presence logit is the
/// single-value output, and a model without one is treated as always
/// present.
fn decode(
    outputs: &[Vec<f32>],
    landmark_count: usize,
    roi: &FaceRoi,
    input_size: u32,
    frame_w: u32,
    frame_h: u32,
) -> Result<FaceLandmarks, String> {
    let mesh = outputs
        .iter()
        .find(|o| o.len() % 3 == 0 && o.len() >= MESH_LANDMARKS * 3)
        .ok_or_else(|| "face mesh model produced no landmark tensor".to_string())?;

    let presence = outputs
        .iter()
        .find(|o| o.len() == 1)
        .map(|o| sigmoid(o[0], PRESENCE_CLIP) as f64)
        .unwrap_or(1.0);

    let s = input_size as f64;
    let to_frame = |x: f32, y: f32| roi.project(x as f64 / s, y as f64 / s, frame_w, frame_h);

    let mut points: Vec<Landmark> = mesh
        .chunks_exact(3)
        .map(|p| {
            let (x, y) = to_frame(p[0], p[1]);
            Landmark::new(x, y, p[2] as f64 / s * roi.width)
        })
        .collect();

    if points.len() == MESH_LANDMARKS {
        attention_mesh::refine(&mut points, outputs, to_frame);
    }

    let available = points.len();
    if available < landmark_count {
        return Err(format!(
            "face mesh model produced {available} landmarks, expected {landmark_count}"
        ));
    }
    points.truncate(landmark_count);

    Ok(FaceLandmarks::new(points, presence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::{LOWER_LIP, NOSE_TIP, REFINED_MESH_LANDMARKS, UPPER_LIP};
    use approx::assert_relative_eq;

    fn centered_roi() -> FaceRoi {
        FaceRoi {
            x_center: 0.5,
            y_center: 0.5,
            width: 0.5,
            height: 0.5,
            rotation: 0.0,
        }
    }

    fn mesh_output(count: usize, x: f32, y: f32, z: f32) -> Vec<f32> {
        (0..count).flat_map(|_| [x, y, z]).collect()
    }

    #[test]
    fn test_crop_roi_shapes() {
        let frame = Frame::new(vec![0; 8 * 8 * 3], 8, 8, PixelFormat::Rgb24, 0);
        assert_eq!(crop_roi(&frame, &centered_roi(), 16, true).shape(), &[1, 3, 16, 16]);
        assert_eq!(crop_roi(&frame, &centered_roi(), 16, false).shape(), &[1, 16, 16, 3]);
    }

    #[test]
    fn test_crop_roi_scales_to_unit_range() {
        let frame = Frame::new(vec![255; 20 * 20 * 3], 20, 20, PixelFormat::Rgb24, 0);
        let tensor = crop_roi(&frame, &centered_roi(), 8, true);
        assert_relative_eq!(tensor[[0, 0, 4, 4]], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_crop_roi_outside_frame_is_black() {
        let frame = Frame::new(vec![255; 20 * 20 * 3], 20, 20, PixelFormat::Rgb24, 0);
        let roi = FaceRoi {
            x_center: 0.0,
            y_center: 0.0,
            width: 1.0,
            height: 1.0,
            rotation: 0.0,
        };
        let tensor = crop_roi(&frame, &roi, 8, false);
        // top-left quadrant of the crop lies above and left of the frame
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert_relative_eq!(tensor[[0, 6, 6, 1]], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_decode_projects_through_roi() {
        // crop center (96, 96) of a 192 input lands on the ROI center
        let outputs = vec![mesh_output(MESH_LANDMARKS, 96.0, 96.0, 19.2), vec![3.0]];
        let lm = decode(&outputs, MESH_LANDMARKS, &centered_roi(), 192, 640, 480).unwrap();
        assert_eq!(lm.len(), MESH_LANDMARKS);
        let p = lm.get(0).unwrap();
        assert_relative_eq!(p.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(p.y, 0.5, epsilon = 1e-9);
        assert_relative_eq!(p.z, 0.05, epsilon = 1e-6);
        assert_relative_eq!(lm.presence(), sigmoid(3.0, PRESENCE_CLIP) as f64);
    }

    #[test]
    fn test_decode_crop_corner_maps_to_roi_corner() {
        let outputs = vec![mesh_output(MESH_LANDMARKS, 0.0, 192.0, 0.0)];
        let lm = decode(&outputs, MESH_LANDMARKS, &centered_roi(), 192, 100, 100).unwrap();
        let p = lm.get(10).unwrap();
        assert_relative_eq!(p.x, 0.25, epsilon = 1e-9);
        assert_relative_eq!(p.y, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_truncates_refined_mesh() {
        let outputs = vec![vec![0.5], mesh_output(REFINED_MESH_LANDMARKS, 96.0, 96.0, 0.0)];
        let lm = decode(&outputs, MESH_LANDMARKS, &centered_roi(), 192, 100, 100).unwrap();
        assert_eq!(lm.len(), MESH_LANDMARKS);
    }

    #[test]
    fn test_decode_too_few_landmarks_is_error() {
        let outputs = vec![mesh_output(MESH_LANDMARKS, 96.0, 96.0, 0.0)];
        let err = decode(&outputs, REFINED_MESH_LANDMARKS, &centered_roi(), 192, 100, 100)
            .unwrap_err();
        assert!(err.contains("468"));
    }

    #[test]
    fn test_decode_takes_lip_points_from_lips_output() {
        // lips (80 x 2) and a 15-value side output come before the mesh
        let lips: Vec<f32> = (0..80).flat_map(|_| [0.0, 192.0]).collect();
        let outputs = vec![lips, vec![0.0; 15], mesh_output(MESH_LANDMARKS, 48.0, 48.0, 0.0)];
        let lm = decode(&outputs, MESH_LANDMARKS, &centered_roi(), 192, 100, 100).unwrap();

        let upper_lip = lm.get(UPPER_LIP).unwrap();
        assert_relative_eq!(upper_lip.x, 0.25, epsilon = 1e-9);
        assert_relative_eq!(upper_lip.y, 0.75, epsilon = 1e-9);
        assert_relative_eq!(lm.get(LOWER_LIP).unwrap().y, 0.75, epsilon = 1e-9);
        // the nose tip is not a lip point and keeps its mesh position
        assert_relative_eq!(lm.get(NOSE_TIP).unwrap().x, 0.375, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_appends_separate_iris_outputs() {
        let left: Vec<f32> = (0..5).flat_map(|_| [96.0, 96.0]).collect();
        let right: Vec<f32> = (0..5).flat_map(|_| [0.0, 0.0]).collect();
        let outputs = vec![
            mesh_output(MESH_LANDMARKS, 96.0, 96.0, 19.2),
            vec![0.0; 160],
            left,
            right,
            vec![2.0],
        ];
        let lm = decode(&outputs, REFINED_MESH_LANDMARKS, &centered_roi(), 192, 100, 100)
            .unwrap();

        assert_eq!(lm.len(), REFINED_MESH_LANDMARKS);
        let first_iris = lm.get(MESH_LANDMARKS).unwrap();
        assert_relative_eq!(first_iris.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(first_iris.z, 0.05, epsilon = 1e-6);
        let last = lm.get(REFINED_MESH_LANDMARKS - 1).unwrap();
        assert_relative_eq!(last.x, 0.25, epsilon = 1e-9);
        assert_relative_eq!(last.y, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_without_presence_output_is_present() {
        let outputs = vec![mesh_output(MESH_LANDMARKS, 96.0, 96.0, 0.0)];
        let lm = decode(&outputs, MESH_LANDMARKS, &centered_roi(), 192, 100, 100).unwrap();
        assert_relative_eq!(lm.presence(), 1.0);
    }

    #[test]
    fn test_decode_missing_mesh_is_error() {
        assert!(decode(&[vec![1.0]], MESH_LANDMARKS, &centered_roi(), 192, 100, 100).is_err());
    }
}
