//! yolopost turns raw anchor-based detector output into final detections.
//!
//! The pipeline is decode → suppress → remap: dense per-anchor predictions
//! are decoded into a capacity-bounded candidate list, overlapping boxes of the
//! same class are removed by greedy NMS, and the survivors are mapped from the
//! letterboxed network input back to source-image pixels. Decoding can run on
//! rayon (`rayon` feature) with a SIMD objectness screen (`simd` feature).
//! The neural network itself is an external [`InferenceEngine`].

pub mod config;
pub mod decode;
pub mod detection;
pub mod geometry;
#[cfg(feature = "image-io")]
pub mod io;
pub mod lowlevel;
pub mod nms;
pub mod pipeline;
pub mod remap;
mod trace;
pub mod util;

pub use config::{AnchorSpec, NetworkConfig, NmsConfig};
pub use decode::{decode, BoxDecoder, FeatureMap, Yolov3BoxDecoder, Yolov5BoxDecoder};
pub use detection::{Detection, RawPredictions, DETECTION_SIZE};
pub use geometry::{center_to_corners, corners_to_center, iou};
pub use nms::{nms, nms_detections};
pub use pipeline::{BoxFormat, Detector, InferenceEngine, Postprocessor};
pub use remap::{remap_to_source, Letterbox};
pub use util::{YoloPostError, YoloPostResult};

#[cfg(feature = "rayon")]
pub use decode::rayon::decode_par;
