mod common;

use common::{single_scale_config, SyntheticMaps};
use yolopost::{
    BoxFormat, Detection, Detector, InferenceEngine, NetworkConfig, NmsConfig, Postprocessor,
    RawPredictions, YoloPostError, YoloPostResult,
};

fn assert_box(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-3, "got {actual:?}, expected {expected:?}");
    }
}

fn flat(dets: &[Detection], capacity: usize) -> Vec<f32> {
    RawPredictions::new(dets.to_vec(), capacity).to_flat()
}

/// Replays a fixed raw-prediction buffer and records what it was fed.
struct ReplayEngine {
    input_len: usize,
    output: Vec<f32>,
    calls: usize,
    last_input_len: usize,
}

impl ReplayEngine {
    fn new(cfg: &NetworkConfig, dets: &[Detection]) -> Self {
        Self {
            input_len: cfg.input_len(),
            output: flat(dets, cfg.max_output_boxes),
            calls: 0,
            last_input_len: 0,
        }
    }
}

impl InferenceEngine for ReplayEngine {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output.len()
    }

    fn infer(&mut self, input: &[f32], output: &mut [f32]) -> YoloPostResult<()> {
        self.calls += 1;
        self.last_input_len = input.len();
        output[..self.output.len()].copy_from_slice(&self.output);
        Ok(())
    }
}

struct FailingEngine {
    input_len: usize,
    output_len: usize,
}

impl InferenceEngine for FailingEngine {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn infer(&mut self, _input: &[f32], _output: &mut [f32]) -> YoloPostResult<()> {
        Err(YoloPostError::Engine {
            reason: "device lost".to_string(),
        })
    }
}

#[test]
fn single_box_is_mapped_back_to_source_pixels() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let buf = flat(
        &[Detection::new([100.0, 100.0, 50.0, 50.0], 0.9, 2)],
        cfg.max_output_boxes,
    );
    // 1280 x 768 fits 640 x 384 at gain 0.5 with no padding.
    let dets = post.process_raw(&buf, 1280, 768).unwrap();
    assert_eq!(dets.len(), 1);
    assert_box(dets[0].bbox, [150.0, 150.0, 250.0, 250.0]);
    assert_eq!(dets[0].class_index(), 2);
    assert!((dets[0].conf - 0.9).abs() < 1e-6);
}

#[test]
fn center_format_is_recomputed_after_clamping() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone())
        .unwrap()
        .with_format(BoxFormat::Center);
    let buf = flat(
        &[
            Detection::new([100.0, 100.0, 50.0, 50.0], 0.9, 0),
            // Spills past the left edge: corners (-10, 10, 30, 50).
            Detection::new([10.0, 30.0, 40.0, 40.0], 0.8, 1),
        ],
        cfg.max_output_boxes,
    );
    let dets = post.process_raw(&buf, 1280, 768).unwrap();
    assert_eq!(dets.len(), 2);
    assert_box(dets[0].bbox, [200.0, 200.0, 100.0, 100.0]);
    // Source corners (0, 20, 60, 100) after clamping.
    assert_box(dets[1].bbox, [30.0, 60.0, 60.0, 80.0]);
}

#[test]
fn letterbox_padding_is_removed() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    // 1920 x 1080: gain 1/3, 12 px of padding above and below.
    let buf = flat(
        &[Detection::new([320.0, 192.0, 64.0, 32.0], 0.7, 5)],
        cfg.max_output_boxes,
    );
    let dets = post.process_raw(&buf, 1920, 1080).unwrap();
    assert_box(dets[0].bbox, [864.0, 492.0, 1056.0, 588.0]);
}

#[test]
fn suppression_happens_before_remapping() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone())
        .unwrap()
        .with_nms(NmsConfig {
            conf_thresh: 0.5,
            iou_thresh: 0.5,
        })
        .unwrap();
    let buf = flat(
        &[
            Detection::new([100.0, 100.0, 50.0, 50.0], 0.6, 0),
            Detection::new([102.0, 100.0, 50.0, 50.0], 0.9, 0),
            Detection::new([300.0, 200.0, 50.0, 50.0], 0.4, 0),
        ],
        cfg.max_output_boxes,
    );
    let dets = post.process_raw(&buf, 640, 384).unwrap();
    assert_eq!(dets.len(), 1);
    assert!((dets[0].conf - 0.9).abs() < 1e-6);
    assert_box(dets[0].bbox, [77.0, 75.0, 127.0, 125.0]);
}

#[test]
fn invalid_nms_thresholds_are_rejected() {
    let post = Postprocessor::new(NetworkConfig::default()).unwrap();
    let err = post
        .with_nms(NmsConfig {
            conf_thresh: 1.5,
            iou_thresh: 0.5,
        })
        .unwrap_err();
    assert!(matches!(err, YoloPostError::InvalidConfig { .. }));
}

#[test]
fn zero_sized_source_is_rejected() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let buf = flat(&[], cfg.max_output_boxes);
    let err = post.process_raw(&buf, 0, 720).unwrap_err();
    assert_eq!(
        err,
        YoloPostError::InvalidDimensions {
            width: 0,
            height: 720
        }
    );
}

#[test]
fn feature_maps_run_through_the_whole_pipeline() {
    let cfg = single_scale_config(4, 2, 16);
    let mut synth = SyntheticMaps::new(cfg.clone());
    // Anchor 0 (40 x 30) at cell (2, 1): centre (80, 48) with zero offsets.
    synth.set_object(0, 0, 2, 1, [0.0; 4], 6.0, 3, 6.0);
    let post = Postprocessor::new(cfg).unwrap();
    let dets = post.process_feature_maps(&synth.maps(), 256, 128).unwrap();
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].class_index(), 3);
    // Network corners (60, 33, 100, 63) at gain 0.5 and no padding.
    assert_box(dets[0].bbox, [120.0, 66.0, 200.0, 126.0]);
}

#[test]
fn detector_runs_engine_then_postprocesses() {
    let cfg = NetworkConfig::default();
    let engine = ReplayEngine::new(&cfg, &[Detection::new([100.0, 100.0, 50.0, 50.0], 0.9, 2)]);
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let mut detector = Detector::new(engine, post).unwrap();
    let input = vec![0.5f32; cfg.input_len()];

    let first = detector.detect(&input, 1280, 768).unwrap();
    let second = detector.detect(&input, 1280, 768).unwrap();
    assert_eq!(first, second);
    assert_box(first[0].bbox, [150.0, 150.0, 250.0, 250.0]);

    let engine = detector.into_engine();
    assert_eq!(engine.calls, 2);
    assert_eq!(engine.last_input_len, cfg.input_len());
}

#[test]
fn detector_rejects_wrong_input_length() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let engine = ReplayEngine::new(&cfg, &[]);
    let mut detector = Detector::new(engine, post).unwrap();
    let err = detector.detect(&[0.0; 12], 1280, 768).unwrap_err();
    assert_eq!(
        err,
        YoloPostError::ShapeMismatch {
            expected: cfg.input_len(),
            got: 12,
            context: "input tensor",
        }
    );
    assert_eq!(detector.into_engine().calls, 0);
}

#[test]
fn engine_errors_propagate() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let engine = FailingEngine {
        input_len: cfg.input_len(),
        output_len: cfg.output_len(),
    };
    let mut detector = Detector::new(engine, post).unwrap();
    let input = vec![0.0f32; cfg.input_len()];
    let err = detector.detect(&input, 1280, 768).unwrap_err();
    assert!(matches!(err, YoloPostError::Engine { .. }));
}

#[test]
fn detector_rejects_engine_with_other_layout() {
    let cfg = NetworkConfig::default();
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let engine = FailingEngine {
        input_len: cfg.input_len() / 2,
        output_len: cfg.output_len(),
    };
    let err = Detector::new(engine, post).err().unwrap();
    assert_eq!(
        err,
        YoloPostError::ShapeMismatch {
            expected: cfg.input_len(),
            got: cfg.input_len() / 2,
            context: "engine input length",
        }
    );

    // Engine built for a smaller candidate capacity.
    let small = NetworkConfig {
        max_output_boxes: 100,
        ..NetworkConfig::default()
    };
    let engine = ReplayEngine::new(&small, &[]);
    let post = Postprocessor::new(cfg.clone()).unwrap();
    let err = Detector::new(engine, post).err().unwrap();
    assert_eq!(
        err,
        YoloPostError::ShapeMismatch {
            expected: cfg.output_len(),
            got: small.output_len(),
            context: "engine output length",
        }
    );
}
