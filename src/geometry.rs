//! Box encodings and overlap.
//!
//! Center form is `[cx, cy, w, h]`; corner form is `[x1, y1, x2, y2]`.

use crate::detection::Detection;
use crate::util::math::clamp_coord;

/// Converts `[cx, cy, w, h]` to `[x1, y1, x2, y2]`.
#[inline]
pub fn center_to_corners(b: [f32; 4]) -> [f32; 4] {
    let half_w = b[2] / 2.0;
    let half_h = b[3] / 2.0;
    [b[0] - half_w, b[1] - half_h, b[0] + half_w, b[1] + half_h]
}

/// Converts `[x1, y1, x2, y2]` to `[cx, cy, w, h]`.
#[inline]
pub fn corners_to_center(b: [f32; 4]) -> [f32; 4] {
    let w = b[2] - b[0];
    let h = b[3] - b[1];
    [b[0] + w / 2.0, b[1] + h / 2.0, w, h]
}

/// Intersection-over-union of two corner-form boxes.
///
/// Returns 0 when the boxes do not overlap or the union has no area.
pub fn iou_corners(a: [f32; 4], b: [f32; 4]) -> f32 {
    let left = a[0].max(b[0]);
    let right = a[2].min(b[2]);
    let top = a[1].max(b[1]);
    let bottom = a[3].min(b[3]);

    // Inverted intersection means no overlap; bail before touching areas.
    if left > right || top > bottom {
        return 0.0;
    }

    let inter = (right - left) * (bottom - top);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 || union.is_nan() {
        return 0.0;
    }
    clamp_coord(inter / union, 0.0, 1.0)
}

/// Intersection-over-union of two center-form boxes.
#[inline]
pub fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    iou_corners(center_to_corners(a), center_to_corners(b))
}

/// Clamps a corner-form box into `[0, width] x [0, height]`.
#[inline]
pub fn clamp_corners(b: [f32; 4], width: f32, height: f32) -> [f32; 4] {
    [
        clamp_coord(b[0], 0.0, width),
        clamp_coord(b[1], 0.0, height),
        clamp_coord(b[2], 0.0, width),
        clamp_coord(b[3], 0.0, height),
    ]
}

/// Rewrites every box from center form to corner form.
pub fn to_corners(dets: &mut [Detection]) {
    for det in dets {
        det.bbox = center_to_corners(det.bbox);
    }
}

/// Rewrites every box from corner form to center form.
pub fn to_center(dets: &mut [Detection]) {
    for det in dets {
        det.bbox = corners_to_center(det.bbox);
    }
}

#[cfg(test)]
mod tests {
    use super::{center_to_corners, clamp_corners, corners_to_center, iou, iou_corners};

    #[test]
    fn corners_of_known_box() {
        assert_eq!(
            center_to_corners([100.0, 100.0, 50.0, 50.0]),
            [75.0, 75.0, 125.0, 125.0]
        );
        assert_eq!(
            corners_to_center([75.0, 75.0, 125.0, 125.0]),
            [100.0, 100.0, 50.0, 50.0]
        );
    }

    #[test]
    fn half_overlap_has_one_third_iou() {
        let a = [0.0, 0.0, 2.0, 2.0];
        let b = [1.0, 0.0, 3.0, 2.0];
        assert!((iou_corners(a, b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn zero_area_boxes_do_not_divide_by_zero() {
        let point = [5.0, 5.0, 0.0, 0.0];
        assert_eq!(iou(point, point), 0.0);
        let line = [5.0, 5.0, 10.0, 0.0];
        assert_eq!(iou(line, [5.0, 5.0, 10.0, 10.0]), 0.0);
    }

    #[test]
    fn touching_edges_are_not_overlap() {
        let a = [0.0, 0.0, 1.0, 1.0];
        let b = [1.0, 0.0, 2.0, 1.0];
        assert_eq!(iou_corners(a, b), 0.0);
    }

    #[test]
    fn clamp_corners_limits_to_image() {
        assert_eq!(
            clamp_corners([-5.0, -1.0, 700.0, 20.0], 640.0, 10.0),
            [0.0, 0.0, 640.0, 10.0]
        );
    }
}
