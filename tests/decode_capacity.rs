mod common;

use common::{single_scale_config, SyntheticMaps};
use yolopost::lowlevel::{decode_into_flat, BoundedOutput};
use yolopost::{decode, Detection, RawPredictions, Yolov5BoxDecoder, YoloPostError};

#[test]
fn overflow_is_truncated_to_capacity() {
    // 25 x 20 cells x 3 anchors = 1500 passing candidates.
    let mut synth = SyntheticMaps::new(single_scale_config(25, 20, 1000));
    synth.fill_confident();
    let raw = decode(&synth.maps(), &synth.cfg, &Yolov5BoxDecoder).unwrap();
    assert_eq!(raw.len(), 1000);
    assert_eq!(raw.capacity(), 1000);
    assert!(raw.as_slice().iter().all(|d| d.conf > 0.45));
}

#[test]
fn count_never_exceeds_capacity() {
    for capacity in [1, 7, 64, 299, 300, 301] {
        let mut synth = SyntheticMaps::new(single_scale_config(10, 10, capacity));
        synth.fill_confident();
        let raw = decode(&synth.maps(), &synth.cfg, &Yolov5BoxDecoder).unwrap();
        assert_eq!(raw.len(), capacity.min(300));
    }
}

#[test]
fn quiet_maps_decode_to_nothing() {
    let synth = SyntheticMaps::new(single_scale_config(8, 4, 50));
    let raw = decode(&synth.maps(), &synth.cfg, &Yolov5BoxDecoder).unwrap();
    assert!(raw.is_empty());
}

#[test]
fn flat_output_carries_count_and_records() {
    let cfg = single_scale_config(4, 2, 5);
    let mut synth = SyntheticMaps::new(cfg.clone());
    synth.set_object(0, 2, 3, 1, [0.0; 4], 5.0, 4, 5.0);
    synth.set_object(0, 0, 0, 0, [0.0; 4], 5.0, 1, 5.0);

    let mut out = vec![f32::NAN; cfg.output_len()];
    let count = decode_into_flat(&synth.maps(), &cfg, &Yolov5BoxDecoder, &mut out).unwrap();
    assert_eq!(count, 2);
    assert_eq!(out[0], 2.0);

    let raw = RawPredictions::from_flat(&out, cfg.max_output_boxes).unwrap();
    let mut classes: Vec<usize> = raw.as_slice().iter().map(Detection::class_index).collect();
    classes.sort_unstable();
    assert_eq!(classes, vec![1, 4]);
    // Unused slots are zeroed.
    assert!(out[1 + 2 * 6..].iter().all(|&v| v == 0.0));
}

#[test]
fn flat_output_must_hold_every_slot() {
    let cfg = single_scale_config(4, 2, 5);
    let synth = SyntheticMaps::new(cfg.clone());
    let mut out = vec![0.0; cfg.output_len() - 1];
    let err = decode_into_flat(&synth.maps(), &cfg, &Yolov5BoxDecoder, &mut out).unwrap_err();
    assert_eq!(
        err,
        YoloPostError::BufferTooSmall {
            needed: cfg.output_len(),
            got: cfg.output_len() - 1,
        }
    );
}

#[test]
fn wrong_grid_is_a_shape_mismatch() {
    let cfg = single_scale_config(4, 2, 5);
    let other = SyntheticMaps::new(single_scale_config(4, 3, 5));
    let err = decode(&other.maps(), &cfg, &Yolov5BoxDecoder).unwrap_err();
    assert!(matches!(
        err,
        YoloPostError::ShapeMismatch {
            context: "grid height",
            ..
        }
    ));
}

#[test]
fn bounded_output_counts_rejections() {
    let out = BoundedOutput::with_capacity(2);
    let det = Detection::new([1.0, 1.0, 2.0, 2.0], 0.9, 0);
    assert!(out.try_push(det));
    assert!(out.try_push(det));
    assert!(!out.try_push(det));
    assert!(out.is_full());
    assert_eq!(out.dropped(), 1);
    assert_eq!(out.into_raw().len(), 2);
}
