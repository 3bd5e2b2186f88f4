#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use yolopost::{AnchorSpec, Detection, FeatureMap, NetworkConfig, DETECTION_SIZE};

/// Logit used for channels that should never pass a threshold.
pub const QUIET: f32 = -10.0;

/// Planar per-scale tensors for a [`NetworkConfig`], all channels quiet.
pub struct SyntheticMaps {
    pub cfg: NetworkConfig,
    pub data: Vec<Vec<f32>>,
}

impl SyntheticMaps {
    pub fn new(cfg: NetworkConfig) -> Self {
        let channels = cfg.channels_per_scale();
        let data = cfg
            .anchors
            .iter()
            .map(|spec| vec![QUIET; channels * spec.cells()])
            .collect();
        Self { cfg, data }
    }

    fn index(&self, scale: usize, channel: usize, col: usize, row: usize) -> usize {
        let spec = &self.cfg.anchors[scale];
        (channel * spec.grid_height + row) * spec.grid_width + col
    }

    /// Marks one anchor cell as an object of `class` with the given logits.
    #[allow(clippy::too_many_arguments)]
    pub fn set_object(
        &mut self,
        scale: usize,
        anchor: usize,
        col: usize,
        row: usize,
        offsets: [f32; 4],
        obj_logit: f32,
        class: usize,
        class_logit: f32,
    ) {
        let base = anchor * self.cfg.fields_per_anchor();
        for (k, &v) in offsets.iter().enumerate() {
            let idx = self.index(scale, base + k, col, row);
            self.data[scale][idx] = v;
        }
        let idx = self.index(scale, base + 4, col, row);
        self.data[scale][idx] = obj_logit;
        let idx = self.index(scale, base + 5 + class, col, row);
        self.data[scale][idx] = class_logit;
    }

    /// Marks every anchor cell of every scale as a confident class-0 object.
    pub fn fill_confident(&mut self) {
        for scale in 0..self.cfg.anchors.len() {
            let spec = self.cfg.anchors[scale];
            for anchor in 0..spec.priors.len() {
                for row in 0..spec.grid_height {
                    for col in 0..spec.grid_width {
                        self.set_object(scale, anchor, col, row, [0.0; 4], 4.0, 0, 4.0);
                    }
                }
            }
        }
    }

    /// Scatters `count` confident objects with random offsets and classes.
    pub fn scatter(&mut self, count: usize, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..count {
            let scale = rng.random_range(0..self.cfg.anchors.len());
            let spec = self.cfg.anchors[scale];
            let offsets = [
                rng.random_range(-2.0..2.0),
                rng.random_range(-2.0..2.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ];
            self.set_object(
                scale,
                rng.random_range(0..spec.priors.len()),
                rng.random_range(0..spec.grid_width),
                rng.random_range(0..spec.grid_height),
                offsets,
                rng.random_range(1.0..6.0),
                rng.random_range(0..self.cfg.num_classes),
                rng.random_range(1.0..6.0),
            );
        }
    }

    pub fn maps(&self) -> Vec<FeatureMap<'_>> {
        let channels = self.cfg.channels_per_scale();
        self.cfg
            .anchors
            .iter()
            .zip(&self.data)
            .map(|(spec, data)| {
                FeatureMap::new(data, channels, spec.grid_width, spec.grid_height)
                    .expect("synthetic map shape")
            })
            .collect()
    }
}

/// One stride-32 scale of `grid_width * grid_height` cells.
pub fn single_scale_config(grid_width: usize, grid_height: usize, capacity: usize) -> NetworkConfig {
    let (w, h) = (grid_width * 32, grid_height * 32);
    NetworkConfig {
        input_width: w,
        input_height: h,
        num_classes: 6,
        max_output_boxes: capacity,
        ignore_thresh: 0.45,
        anchors: vec![AnchorSpec::for_stride(
            w,
            h,
            32,
            [(40.0, 30.0), (80.0, 60.0), (120.0, 200.0)],
        )],
    }
}

/// Bit patterns of each record, sorted, for order-insensitive comparison.
pub fn sorted_records(dets: &[Detection]) -> Vec<[u32; DETECTION_SIZE]> {
    let mut records: Vec<[u32; DETECTION_SIZE]> = dets
        .iter()
        .map(|d| d.to_record().map(f32::to_bits))
        .collect();
    records.sort();
    records
}
