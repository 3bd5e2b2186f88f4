//! Dense per-anchor prediction decoding.
//!
//! Each detection scale produces a planar feature map of shape
//! `(ANCHORS_PER_SCALE * (5 + num_classes), grid_h, grid_w)`. For anchor `a`
//! and field `k`, the value for cell `(x, y)` lives at
//! `((a * (5 + C) + k) * grid_h + y) * grid_w + x`. Fields 0..4 are box
//! offsets, field 4 is objectness and the rest are class logits.
//!
//! Every `(scale, anchor, cell)` is decoded independently; accepted
//! candidates go into a shared [`BoundedOutput`]. Anything past capacity is
//! dropped silently.

use crate::config::{AnchorSpec, NetworkConfig, BOX_FIELDS};
use crate::detection::{Detection, RawPredictions};
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::math::{argmax, logit, sigmoid};
use crate::util::{YoloPostError, YoloPostResult};

pub mod bounded;

#[cfg(feature = "rayon")]
pub mod rayon;

#[cfg(feature = "simd")]
pub(crate) mod simd;

pub use bounded::BoundedOutput;

/// Borrowed planar feature map for one detection scale.
#[derive(Clone, Copy, Debug)]
pub struct FeatureMap<'a> {
    data: &'a [f32],
    channels: usize,
    grid_width: usize,
    grid_height: usize,
}

impl<'a> FeatureMap<'a> {
    /// Wraps a `(channels, grid_height, grid_width)` tensor.
    pub fn new(
        data: &'a [f32],
        channels: usize,
        grid_width: usize,
        grid_height: usize,
    ) -> YoloPostResult<Self> {
        if grid_width == 0 || grid_height == 0 {
            return Err(YoloPostError::InvalidDimensions {
                width: grid_width,
                height: grid_height,
            });
        }
        let needed = channels
            .checked_mul(grid_width)
            .and_then(|v| v.checked_mul(grid_height))
            .ok_or(YoloPostError::InvalidDimensions {
                width: grid_width,
                height: grid_height,
            })?;
        if data.len() < needed {
            return Err(YoloPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            channels,
            grid_width,
            grid_height,
        })
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Grid width in cells.
    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    /// Grid height in cells.
    pub fn grid_height(&self) -> usize {
        self.grid_height
    }

    /// One row of one channel plane.
    #[inline]
    pub fn row(&self, channel: usize, y: usize) -> &'a [f32] {
        let start = (channel * self.grid_height + y) * self.grid_width;
        &self.data[start..start + self.grid_width]
    }

    /// Value at `(channel, x, y)`.
    #[inline]
    pub fn value(&self, channel: usize, x: usize, y: usize) -> f32 {
        self.data[(channel * self.grid_height + y) * self.grid_width + x]
    }
}

/// Converts raw network outputs into scores and boxes.
///
/// Box decoding differs between model generations, so it is kept behind this
/// trait. Implementations must be pure.
pub trait BoxDecoder {
    /// Maps a raw objectness or class value to a probability.
    fn score(&self, raw: f32) -> f32 {
        sigmoid(raw)
    }

    /// Raw value at or below which `score(raw) <= thresh`.
    ///
    /// Used to pre-screen rows. Decoders that override [`BoxDecoder::score`]
    /// must override this too, or return negative infinity to disable the
    /// screen.
    fn score_cut(&self, thresh: f32) -> f32 {
        logit(thresh)
    }

    /// Decodes raw offsets `[tx, ty, tw, th]` at grid cell `(col, row)` into a
    /// center-form box in network-input pixels.
    fn decode_box(
        &self,
        raw: [f32; 4],
        cell: (usize, usize),
        stride: (f32, f32),
        prior: (f32, f32),
    ) -> [f32; 4];
}

/// YOLOv5 convention: `(2σ(t) - 0.5 + cell) * stride` and `(2σ(t))² * prior`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Yolov5BoxDecoder;

impl BoxDecoder for Yolov5BoxDecoder {
    fn decode_box(
        &self,
        raw: [f32; 4],
        cell: (usize, usize),
        stride: (f32, f32),
        prior: (f32, f32),
    ) -> [f32; 4] {
        let cx = (sigmoid(raw[0]) * 2.0 - 0.5 + cell.0 as f32) * stride.0;
        let cy = (sigmoid(raw[1]) * 2.0 - 0.5 + cell.1 as f32) * stride.1;
        let w = (sigmoid(raw[2]) * 2.0).powi(2) * prior.0;
        let h = (sigmoid(raw[3]) * 2.0).powi(2) * prior.1;
        [cx, cy, w, h]
    }
}

/// YOLOv3 convention: `(σ(t) + cell) * stride` and `exp(t) * prior`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Yolov3BoxDecoder;

impl BoxDecoder for Yolov3BoxDecoder {
    fn decode_box(
        &self,
        raw: [f32; 4],
        cell: (usize, usize),
        stride: (f32, f32),
        prior: (f32, f32),
    ) -> [f32; 4] {
        let cx = (sigmoid(raw[0]) + cell.0 as f32) * stride.0;
        let cy = (sigmoid(raw[1]) + cell.1 as f32) * stride.1;
        let w = raw[2].exp() * prior.0;
        let h = raw[3].exp() * prior.1;
        [cx, cy, w, h]
    }
}

/// Per-scale state shared by every row worker of that scale.
pub(crate) struct ScaleScan<'a> {
    map: FeatureMap<'a>,
    spec: &'a AnchorSpec,
    stride: (f32, f32),
    fields: usize,
    num_classes: usize,
    ignore_thresh: f32,
    #[cfg_attr(not(feature = "simd"), allow(dead_code))]
    screen_cut: f32,
}

impl ScaleScan<'_> {
    pub(crate) fn grid_height(&self) -> usize {
        self.map.grid_height
    }
}

/// Checks map count and shapes against `cfg` and builds per-scale scan state.
pub(crate) fn prepare_scans<'a, D: BoxDecoder>(
    maps: &[FeatureMap<'a>],
    cfg: &'a NetworkConfig,
    decoder: &D,
) -> YoloPostResult<Vec<ScaleScan<'a>>> {
    if maps.len() != cfg.anchors.len() {
        return Err(YoloPostError::ShapeMismatch {
            expected: cfg.anchors.len(),
            got: maps.len(),
            context: "feature map count",
        });
    }
    let channels = cfg.channels_per_scale();
    let screen_cut = decoder.score_cut(cfg.ignore_thresh);

    maps.iter()
        .zip(&cfg.anchors)
        .map(|(map, spec)| {
            if map.channels != channels {
                return Err(YoloPostError::ShapeMismatch {
                    expected: channels,
                    got: map.channels,
                    context: "feature map channels",
                });
            }
            if map.grid_width != spec.grid_width {
                return Err(YoloPostError::ShapeMismatch {
                    expected: spec.grid_width,
                    got: map.grid_width,
                    context: "grid width",
                });
            }
            if map.grid_height != spec.grid_height {
                return Err(YoloPostError::ShapeMismatch {
                    expected: spec.grid_height,
                    got: map.grid_height,
                    context: "grid height",
                });
            }
            Ok(ScaleScan {
                map: *map,
                spec,
                stride: spec.stride(cfg.input_width, cfg.input_height),
                fields: cfg.fields_per_anchor(),
                num_classes: cfg.num_classes,
                ignore_thresh: cfg.ignore_thresh,
                screen_cut,
            })
        })
        .collect()
}

/// Decodes every cell of one anchor row into `out`.
pub(crate) fn scan_row<D: BoxDecoder>(
    scan: &ScaleScan<'_>,
    anchor: usize,
    row: usize,
    decoder: &D,
    out: &BoundedOutput,
) {
    // Rows skipped here are not counted in `out.dropped()`.
    if out.is_full() {
        return;
    }
    let obj_row = scan.map.row(anchor * scan.fields + 4, row);

    #[cfg(feature = "simd")]
    {
        let mut hits = Vec::new();
        simd::screen_row(obj_row, scan.screen_cut, &mut hits);
        for col in hits {
            decode_cell(scan, anchor, col, row, obj_row[col], decoder, out);
        }
    }

    #[cfg(not(feature = "simd"))]
    for (col, &obj_raw) in obj_row.iter().enumerate() {
        decode_cell(scan, anchor, col, row, obj_raw, decoder, out);
    }
}

fn decode_cell<D: BoxDecoder>(
    scan: &ScaleScan<'_>,
    anchor: usize,
    col: usize,
    row: usize,
    obj_raw: f32,
    decoder: &D,
    out: &BoundedOutput,
) {
    let objectness = decoder.score(obj_raw);
    if objectness.is_nan() || objectness <= scan.ignore_thresh {
        return;
    }

    let base = anchor * scan.fields;
    let class_logits =
        (0..scan.num_classes).map(|c| scan.map.value(base + BOX_FIELDS + c, col, row));
    let Some((class_idx, best_logit)) = argmax(class_logits) else {
        return;
    };
    let conf = objectness * decoder.score(best_logit);
    if conf.is_nan() || conf <= scan.ignore_thresh {
        return;
    }

    let raw = [
        scan.map.value(base, col, row),
        scan.map.value(base + 1, col, row),
        scan.map.value(base + 2, col, row),
        scan.map.value(base + 3, col, row),
    ];
    let bbox = decoder.decode_box(raw, (col, row), scan.stride, scan.spec.priors[anchor]);
    out.try_push(Detection::new(bbox, conf, class_idx));
}

/// Decodes all scales sequentially.
pub fn decode<D: BoxDecoder>(
    maps: &[FeatureMap<'_>],
    cfg: &NetworkConfig,
    decoder: &D,
) -> YoloPostResult<RawPredictions> {
    let _span = trace_span!("decode", scales = maps.len()).entered();
    let scans = prepare_scans(maps, cfg, decoder)?;
    let out = BoundedOutput::with_capacity(cfg.max_output_boxes);

    for scan in &scans {
        for anchor in 0..scan.spec.priors.len() {
            for row in 0..scan.grid_height() {
                scan_row(scan, anchor, row, decoder, &out);
            }
        }
    }

    finish(out)
}

pub(crate) fn finish(out: BoundedOutput) -> YoloPostResult<RawPredictions> {
    if out.dropped() > 0 {
        trace_debug!("decode_overflow", dropped_at_least = out.dropped());
    }
    let raw = out.into_raw();
    trace_event!("decode_candidates", count = raw.len());
    Ok(raw)
}

/// Decodes into the engine's flat layout, returning the committed count.
///
/// `out` must hold at least [`NetworkConfig::output_len`] floats.
pub fn decode_into_flat<D: BoxDecoder>(
    maps: &[FeatureMap<'_>],
    cfg: &NetworkConfig,
    decoder: &D,
    out: &mut [f32],
) -> YoloPostResult<usize> {
    let needed = cfg.output_len();
    if out.len() < needed {
        return Err(YoloPostError::BufferTooSmall {
            needed,
            got: out.len(),
        });
    }
    let raw = decode(maps, cfg, decoder)?;
    raw.write_flat(&mut out[..needed]);
    Ok(raw.len())
}
