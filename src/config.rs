//! Network and suppression configuration.
//!
//! [`NetworkConfig`] holds the constants shared with the inference engine:
//! input size, class count, output capacity, the decoder's coarse ignore
//! threshold and the per-scale anchor layout. [`NmsConfig`] holds the stricter
//! final-stage thresholds. Both are plain immutable values passed into each
//! stage; nothing here is process-global.

use crate::util::{YoloPostError, YoloPostResult};

/// Number of anchor priors per detection scale.
pub const ANCHORS_PER_SCALE: usize = 3;

/// Box offsets (4) plus objectness (1) preceding the class scores.
pub const BOX_FIELDS: usize = 5;

/// Grid and anchor priors for one detection scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorSpec {
    /// Number of grid cells along x.
    pub grid_width: usize,
    /// Number of grid cells along y.
    pub grid_height: usize,
    /// Anchor priors as `(width, height)` in network-input pixels.
    pub priors: [(f32, f32); ANCHORS_PER_SCALE],
}

impl AnchorSpec {
    /// Builds a spec whose grid is `input / stride` in both directions.
    pub fn for_stride(
        input_width: usize,
        input_height: usize,
        stride: usize,
        priors: [(f32, f32); ANCHORS_PER_SCALE],
    ) -> Self {
        Self {
            grid_width: input_width / stride.max(1),
            grid_height: input_height / stride.max(1),
            priors,
        }
    }

    /// Number of cells in the grid.
    pub fn cells(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Horizontal and vertical stride for a given network input size.
    pub fn stride(&self, input_width: usize, input_height: usize) -> (f32, f32) {
        (
            input_width as f32 / self.grid_width as f32,
            input_height as f32 / self.grid_height as f32,
        )
    }
}

/// Constants describing the network input and the raw output layout.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkConfig {
    /// Network input width in pixels.
    pub input_width: usize,
    /// Network input height in pixels.
    pub input_height: usize,
    /// Number of object classes.
    pub num_classes: usize,
    /// Capacity of the raw candidate buffer.
    pub max_output_boxes: usize,
    /// Coarse decoder-side cutoff on objectness and on the combined confidence.
    pub ignore_thresh: f32,
    /// Detection scales, finest first.
    pub anchors: Vec<AnchorSpec>,
}

impl Default for NetworkConfig {
    /// YOLOv5-P6 layout on a 640x384 input with six classes.
    fn default() -> Self {
        let (w, h) = (640, 384);
        Self {
            input_width: w,
            input_height: h,
            num_classes: 6,
            max_output_boxes: 1000,
            ignore_thresh: 0.45,
            anchors: vec![
                AnchorSpec::for_stride(w, h, 8, [(19.0, 27.0), (44.0, 40.0), (38.0, 94.0)]),
                AnchorSpec::for_stride(w, h, 16, [(96.0, 68.0), (86.0, 152.0), (180.0, 137.0)]),
                AnchorSpec::for_stride(w, h, 32, [(140.0, 301.0), (303.0, 264.0), (238.0, 542.0)]),
                AnchorSpec::for_stride(w, h, 64, [(436.0, 615.0), (739.0, 380.0), (925.0, 792.0)]),
            ],
        }
    }
}

impl NetworkConfig {
    /// Values per anchor in a feature map: box, objectness and class scores.
    pub fn fields_per_anchor(&self) -> usize {
        BOX_FIELDS + self.num_classes
    }

    /// Channel count of every per-scale feature map.
    pub fn channels_per_scale(&self) -> usize {
        ANCHORS_PER_SCALE * self.fields_per_anchor()
    }

    /// Length of the planar RGB input tensor.
    pub fn input_len(&self) -> usize {
        3 * self.input_width * self.input_height
    }

    /// Length of the flat raw output buffer (count slot plus all records).
    pub fn output_len(&self) -> usize {
        1 + self.max_output_boxes * crate::detection::DETECTION_SIZE
    }

    /// Checks that every value is usable by the decoder and the remapper.
    pub fn validate(&self) -> YoloPostResult<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(YoloPostError::InvalidDimensions {
                width: self.input_width,
                height: self.input_height,
            });
        }
        if self.input_width % 32 != 0 || self.input_height % 32 != 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "input dimensions must be multiples of 32",
            });
        }
        if self.num_classes == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "num_classes must be at least 1",
            });
        }
        if self.max_output_boxes == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "max_output_boxes must be at least 1",
            });
        }
        if !(0.0..1.0).contains(&self.ignore_thresh) {
            return Err(YoloPostError::InvalidConfig {
                reason: "ignore_thresh must be in [0, 1)",
            });
        }
        if self.anchors.is_empty() {
            return Err(YoloPostError::InvalidConfig {
                reason: "at least one anchor scale is required",
            });
        }
        for spec in &self.anchors {
            if spec.grid_width == 0 || spec.grid_height == 0 {
                return Err(YoloPostError::InvalidDimensions {
                    width: spec.grid_width,
                    height: spec.grid_height,
                });
            }
            if self.input_width % spec.grid_width != 0 || self.input_height % spec.grid_height != 0
            {
                return Err(YoloPostError::InvalidConfig {
                    reason: "grid size must divide the input size",
                });
            }
            let priors_ok = spec
                .priors
                .iter()
                .all(|&(w, h)| w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0);
            if !priors_ok {
                return Err(YoloPostError::InvalidConfig {
                    reason: "anchor priors must be finite and positive",
                });
            }
        }
        Ok(())
    }
}

/// Final-stage thresholds for the class-wise suppressor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsConfig {
    /// Candidates with `conf <= conf_thresh` are dropped.
    pub conf_thresh: f32,
    /// Same-class candidates with IoU above this are suppressed.
    pub iou_thresh: f32,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            conf_thresh: 0.45,
            iou_thresh: 0.5,
        }
    }
}

impl NmsConfig {
    /// Checks that both thresholds are finite and within `[0, 1]`.
    pub fn validate(&self) -> YoloPostResult<()> {
        if !(0.0..=1.0).contains(&self.conf_thresh) {
            return Err(YoloPostError::InvalidConfig {
                reason: "conf_thresh must be in [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.iou_thresh) {
            return Err(YoloPostError::InvalidConfig {
                reason: "iou_thresh must be in [0, 1]",
            });
        }
        Ok(())
    }
}
