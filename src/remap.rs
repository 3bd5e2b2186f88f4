//! Letterbox reversal from network-input space to source-image space.
//!
//! A source image is fitted into the network input by a uniform scale
//! (`gain`) and centred with symmetric padding. Reversing that maps corner
//! boxes back to source pixels, after which coordinates are clamped to the
//! source image.

use crate::config::NetworkConfig;
use crate::detection::Detection;
use crate::geometry::clamp_corners;
use crate::trace::trace_span;
use crate::util::{YoloPostError, YoloPostResult};

/// Uniform scale and padding of one letterboxed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    /// Network pixels per source pixel.
    pub gain: f32,
    /// Horizontal padding in network pixels, applied on both sides.
    pub pad_x: f32,
    /// Vertical padding in network pixels, applied on both sides.
    pub pad_y: f32,
}

impl Letterbox {
    /// Computes the transform fitting `source` into `input`.
    pub fn new(
        input_width: usize,
        input_height: usize,
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(YoloPostError::InvalidDimensions {
                width: source_width,
                height: source_height,
            });
        }
        if input_width == 0 || input_height == 0 {
            return Err(YoloPostError::InvalidDimensions {
                width: input_width,
                height: input_height,
            });
        }
        let (in_w, in_h) = (input_width as f32, input_height as f32);
        let (src_w, src_h) = (source_width as f32, source_height as f32);
        let gain = (in_w / src_w).min(in_h / src_h);
        Ok(Self {
            gain,
            pad_x: (in_w - src_w * gain) / 2.0,
            pad_y: (in_h - src_h * gain) / 2.0,
        })
    }

    /// Letterbox for a source image under `cfg`'s input size.
    pub fn for_network(
        cfg: &NetworkConfig,
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Self> {
        Self::new(cfg.input_width, cfg.input_height, source_width, source_height)
    }

    /// Size of the scaled image inside the network input, rounded to pixels.
    pub fn scaled_size(&self, source_width: usize, source_height: usize) -> (usize, usize) {
        (
            (source_width as f32 * self.gain).round() as usize,
            (source_height as f32 * self.gain).round() as usize,
        )
    }

    /// Maps a corner-form box from network space to source space (unclamped).
    pub fn to_source(&self, b: [f32; 4]) -> [f32; 4] {
        [
            (b[0] - self.pad_x) / self.gain,
            (b[1] - self.pad_y) / self.gain,
            (b[2] - self.pad_x) / self.gain,
            (b[3] - self.pad_y) / self.gain,
        ]
    }

    /// Maps a corner-form box from source space to network space.
    pub fn to_network(&self, b: [f32; 4]) -> [f32; 4] {
        [
            b[0] * self.gain + self.pad_x,
            b[1] * self.gain + self.pad_y,
            b[2] * self.gain + self.pad_x,
            b[3] * self.gain + self.pad_y,
        ]
    }
}

/// Maps corner-form detections into source pixels and clamps them.
///
/// Boxes must already be in corner form and must have been suppressed in
/// network space; remapping first would change IoU values.
pub fn remap_to_source(
    dets: &mut [Detection],
    cfg: &NetworkConfig,
    source_width: usize,
    source_height: usize,
) -> YoloPostResult<()> {
    let _span = trace_span!("remap", count = dets.len()).entered();
    let letterbox = Letterbox::for_network(cfg, source_width, source_height)?;
    let (w, h) = (source_width as f32, source_height as f32);
    for det in dets {
        det.bbox = clamp_corners(letterbox.to_source(det.bbox), w, h);
    }
    Ok(())
}
