//! Shared math utilities for detection infrastructure.

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy non-maximum suppression.
///
/// Sorts `items` by descending score and drops every item whose box
/// overlaps an already kept one by more than `iou_thresh`.
pub fn nms<T, B, S>(mut items: Vec<T>, iou_thresh: f64, bbox: B, score: S) -> Vec<T>
where
    B: Fn(&T) -> [f64; 4],
    S: Fn(&T) -> f64,
{
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<T> = Vec::new();
    for item in items {
        let b = bbox(&item);
        if keep.iter().all(|k| bbox_iou(&bbox(k), &b) <= iou_thresh) {
            keep.push(item);
        }
    }
    keep
}

/// Logistic function with the input clamped to `[-clamp, clamp]`.
pub fn sigmoid(x: f32, clamp: f32) -> f32 {
    let x = x.clamp(-clamp, clamp);
    1.0 / (1.0 + (-x).exp())
}

/// Bilinearly samples one channel of an `[H, W, C]` image at a pixel-center
/// coordinate. Samples outside the image read as zero.
pub fn sample_bilinear(
    src: &ndarray::ArrayView3<'_, u8>,
    x: f64,
    y: f64,
    channel: usize,
) -> f32 {
    let (h, w, _) = src.dim();
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = (fx - x0) as f32;
    let ty = (fy - y0) as f32;

    let at = |xi: f64, yi: f64| -> f32 {
        if xi < 0.0 || yi < 0.0 || xi >= w as f64 || yi >= h as f64 {
            0.0
        } else {
            src[[yi as usize, xi as usize, channel]] as f32
        }
    };

    let top = at(x0, y0) * (1.0 - tx) + at(x0 + 1.0, y0) * tx;
    let bottom = at(x0, y0 + 1.0) * (1.0 - tx) + at(x0 + 1.0, y0 + 1.0) * tx;
    top * (1.0 - ty) + bottom * ty
}
