//! Greedy class-wise non-maximum suppression.
//!
//! Candidates at or below `conf_thresh` are dropped, the rest are bucketed by
//! exact `class_id` and each bucket is reduced independently: the most
//! confident remaining box is kept and every box of the same class overlapping
//! it by more than `iou_thresh` is removed. Boxes are compared in center form,
//! in the coordinate space they were decoded in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::NmsConfig;
use crate::detection::{Detection, RawPredictions};
use crate::geometry::iou;
use crate::trace::{trace_event, trace_span};

fn conf_cmp_desc(a: &Detection, b: &Detection) -> Ordering {
    b.conf.total_cmp(&a.conf)
}

/// Sorts detections by descending confidence, keeping input order on ties.
pub(crate) fn sort_by_conf_desc(dets: &mut [Detection]) {
    dets.sort_by(conf_cmp_desc);
}

/// Bucket key with exact float equality; `-0.0` and `0.0` share a bucket.
fn class_key(class_id: f32) -> u32 {
    (class_id + 0.0).to_bits()
}

/// Reduces one class bucket, appending survivors to `kept`.
fn suppress_class(mut remaining: Vec<Detection>, iou_thresh: f32, kept: &mut Vec<Detection>) {
    sort_by_conf_desc(&mut remaining);
    while let Some((&best, rest)) = remaining.split_first() {
        kept.push(best);
        remaining = rest
            .iter()
            .copied()
            .filter(|det| iou(best.bbox, det.bbox) <= iou_thresh)
            .collect();
    }
}

/// Suppresses an already materialised candidate list.
pub fn nms_detections(dets: &[Detection], cfg: &NmsConfig) -> Vec<Detection> {
    let _span = trace_span!("nms", candidates = dets.len()).entered();

    let mut buckets: BTreeMap<u32, Vec<Detection>> = BTreeMap::new();
    for det in dets.iter().filter(|d| d.conf > cfg.conf_thresh) {
        buckets.entry(class_key(det.class_id)).or_default().push(*det);
    }

    let classes = buckets.len();
    let mut kept = Vec::new();
    for bucket in buckets.into_values() {
        suppress_class(bucket, cfg.iou_thresh, &mut kept);
    }

    trace_event!("nms_kept", classes = classes, kept = kept.len());
    kept
}

/// Suppresses the candidates of one decode pass.
pub fn nms(raw: &RawPredictions, cfg: &NmsConfig) -> Vec<Detection> {
    nms_detections(raw.as_slice(), cfg)
}
