//! Building blocks for custom post-processing pipelines.
//!
//! Most callers only need [`crate::Postprocessor`]. These items let a caller
//! run individual stages, share a [`BoundedOutput`] with its own producers or
//! plug in a different box decoder.

pub use crate::config::{ANCHORS_PER_SCALE, BOX_FIELDS};
pub use crate::decode::{decode_into_flat, BoundedOutput};
pub use crate::geometry::{clamp_corners, iou_corners, to_center, to_corners};
pub use crate::util::math::{clamp_coord, logit, sigmoid};
