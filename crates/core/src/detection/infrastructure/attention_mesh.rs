use crate::detection::domain::face_landmarks::Landmark;

/// Values in the lips refinement output: 80 points of `(x, y)`.
pub const LIPS_VALUES: usize = 160;
/// Values in each eye refinement output: 71 points of `(x, y)`.
pub const EYE_VALUES: usize = 142;
/// Values in each iris output: 5 points of `(x, y)`.
pub const IRIS_VALUES: usize = 10;

/// Mesh points overwritten by the lips output, in output order.
pub const LIPS_INDICES: [usize; 80] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 185, 40, 39, 37, 0, 267, 269, 270, 409, 78,
    95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 191, 80, 81, 82, 13, 312, 311, 310, 415, 76, 77,
    90, 180, 85, 16, 315, 404, 320, 307, 306, 184, 74, 73, 72, 11, 302, 303, 304, 408, 62, 96, 89,
    179, 86, 15, 316, 403, 319, 325, 292, 183, 42, 41, 38, 12, 268, 271, 272, 407,
];

/// Mesh points overwritten by the first eye output.
pub const LEFT_EYE_INDICES: [usize; 71] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 246, 161, 160, 159, 158, 157, 173, 130, 25, 110, 24,
    23, 22, 26, 112, 243, 247, 30, 29, 27, 28, 56, 190, 226, 31, 228, 229, 230, 231, 232, 233, 244,
    113, 225, 224, 223, 222, 221, 189, 35, 124, 46, 53, 52, 65, 143, 111, 117, 118, 119, 120, 121,
    128, 245, 156, 70, 63, 105, 66, 107, 55, 193,
];

/// Mesh points overwritten by the second eye output.
pub const RIGHT_EYE_INDICES: [usize; 71] = [
    263, 249, 390, 373, 374, 380, 381, 382, 362, 466, 388, 387, 386, 385, 384, 398, 359, 255, 339,
    254, 253, 252, 256, 341, 463, 467, 260, 259, 257, 258, 286, 414, 446, 261, 448, 449, 450, 451,
    452, 453, 464, 342, 445, 444, 443, 442, 441, 413, 265, 353, 276, 283, 282, 295, 372, 340, 346,
    347, 348, 349, 350, 357, 465, 383, 300, 293, 334, 296, 336, 285, 417,
];

/// Leading entries of each eye map that trace the eye contour. Their mean
/// depth becomes the depth of that eye's iris points.
const EYE_CONTOUR_LEN: usize = 16;

/// Merge the attention model's side outputs into a 468-point mesh.
///
/// Lips and eyes replace the `(x, y)` of the mesh points they cover and keep
/// the mesh depth. The two iris outputs are appended, each at the mean depth
/// of its eye contour. Outputs that are absent are skipped, so a plain mesh
/// passes through unchanged.
pub fn refine<F>(points: &mut Vec<Landmark>, outputs: &[Vec<f32>], to_frame: F)
where
    F: Fn(f32, f32) -> (f64, f64),
{
    let overwrite = |points: &mut Vec<Landmark>, values: &[f32], indices: &[usize]| {
        for (p, &idx) in values.chunks_exact(2).zip(indices) {
            if let Some(target) = points.get_mut(idx) {
                let (x, y) = to_frame(p[0], p[1]);
                target.x = x;
                target.y = y;
            }
        }
    };

    if let Some(lips) = outputs.iter().find(|o| o.len() == LIPS_VALUES) {
        overwrite(points, lips, &LIPS_INDICES);
    }

    let eyes: Vec<&Vec<f32>> = outputs.iter().filter(|o| o.len() == EYE_VALUES).collect();
    if let [left, right] = eyes.as_slice() {
        overwrite(points, left, &LEFT_EYE_INDICES);
        overwrite(points, right, &RIGHT_EYE_INDICES);
    }

    let irises: Vec<&Vec<f32>> = outputs.iter().filter(|o| o.len() == IRIS_VALUES).collect();
    if let [left, right] = irises.as_slice() {
        let left_depth = contour_depth(points, &LEFT_EYE_INDICES[..EYE_CONTOUR_LEN]);
        let right_depth = contour_depth(points, &RIGHT_EYE_INDICES[..EYE_CONTOUR_LEN]);
        for (iris, depth) in [(left, left_depth), (right, right_depth)] {
            for p in iris.chunks_exact(2) {
                let (x, y) = to_frame(p[0], p[1]);
                points.push(Landmark::new(x, y, depth));
            }
        }
    }
}

fn contour_depth(points: &[Landmark], indices: &[usize]) -> f64 {
    let depths: Vec<f64> = indices
        .iter()
        .filter_map(|&i| points.get(i))
        .map(|p| p.z)
        .collect();
    if depths.is_empty() {
        return 0.0;
    }
    depths.iter().sum::<f64>() / depths.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::{LOWER_LIP, MESH_LANDMARKS, UPPER_LIP};
    use approx::assert_relative_eq;

    fn identity(x: f32, y: f32) -> (f64, f64) {
        (x as f64, y as f64)
    }

    fn flat_mesh() -> Vec<Landmark> {
        vec![Landmark::new(0.0, 0.0, 1.0); MESH_LANDMARKS]
    }

    #[test]
    fn test_lip_points_come_from_lips_output() {
        let mut points = flat_mesh();
        let lips: Vec<f32> = (0..80).flat_map(|i| [i as f32, 100.0 + i as f32]).collect();
        refine(&mut points, &[lips], identity);

        // index 0 is the 16th lips point, index 17 the 6th
        assert_relative_eq!(points[UPPER_LIP].x, 15.0);
        assert_relative_eq!(points[UPPER_LIP].y, 115.0);
        assert_relative_eq!(points[LOWER_LIP].x, 5.0);
        assert_relative_eq!(points[UPPER_LIP].z, 1.0);
        assert_eq!(points.len(), MESH_LANDMARKS);
    }

    #[test]
    fn test_eye_outputs_overwrite_in_order() {
        let mut points = flat_mesh();
        let left = vec![7.0; EYE_VALUES];
        let right = vec![9.0; EYE_VALUES];
        refine(&mut points, &[left, right], identity);

        assert_relative_eq!(points[33].x, 7.0);
        assert_relative_eq!(points[263].x, 9.0);
        assert_relative_eq!(points[1].x, 0.0);
    }

    #[test]
    fn test_iris_depth_is_eye_contour_mean() {
        let mut points = flat_mesh();
        for &i in &LEFT_EYE_INDICES[..EYE_CONTOUR_LEN] {
            points[i].z = 4.0;
        }
        let outputs = vec![vec![1.0; IRIS_VALUES], vec![2.0; IRIS_VALUES]];
        refine(&mut points, &outputs, identity);

        assert_eq!(points.len(), MESH_LANDMARKS + 10);
        assert_relative_eq!(points[MESH_LANDMARKS].z, 4.0);
        assert_relative_eq!(points[MESH_LANDMARKS].x, 1.0);
        assert_relative_eq!(points[MESH_LANDMARKS + 9].z, 1.0);
        assert_relative_eq!(points[MESH_LANDMARKS + 9].x, 2.0);
    }

    #[test]
    fn test_plain_mesh_is_untouched() {
        let mut points = flat_mesh();
        refine(&mut points, &[vec![0.5]], identity);
        assert_eq!(points, flat_mesh());
    }
}
