//! Frame-level composition of decode, suppression and remapping.
//!
//! [`Postprocessor`] fixes the stage order: decode and suppress in
//! network-space center form, convert to corners, remap to the source image,
//! clamp. [`Detector`] adds an [`InferenceEngine`] in front of it.

use crate::config::{NetworkConfig, NmsConfig};
use crate::decode::{decode, BoxDecoder, FeatureMap, Yolov5BoxDecoder};
use crate::detection::{Detection, RawPredictions};
use crate::geometry::{to_center, to_corners};
use crate::nms::nms;
use crate::remap::remap_to_source;
use crate::trace::{trace_event, trace_span};
use crate::util::{YoloPostError, YoloPostResult};

/// Box encoding of the final detections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxFormat {
    /// `[x1, y1, x2, y2]`.
    #[default]
    Corners,
    /// `[cx, cy, w, h]`, recomputed after clamping.
    Center,
}

/// Post-processing for one network configuration.
#[derive(Clone, Debug)]
pub struct Postprocessor<D = Yolov5BoxDecoder> {
    network: NetworkConfig,
    nms: NmsConfig,
    format: BoxFormat,
    parallel: bool,
    decoder: D,
}

impl Postprocessor<Yolov5BoxDecoder> {
    /// Creates a post-processor with the YOLOv5 box decoder.
    pub fn new(network: NetworkConfig) -> YoloPostResult<Self> {
        Self::with_decoder(network, Yolov5BoxDecoder)
    }
}

impl<D: BoxDecoder + Sync> Postprocessor<D> {
    /// Creates a post-processor with a custom box decoder.
    pub fn with_decoder(network: NetworkConfig, decoder: D) -> YoloPostResult<Self> {
        network.validate()?;
        Ok(Self {
            network,
            nms: NmsConfig::default(),
            format: BoxFormat::default(),
            parallel: false,
            decoder,
        })
    }

    /// Replaces the suppression thresholds.
    pub fn with_nms(mut self, nms: NmsConfig) -> YoloPostResult<Self> {
        nms.validate()?;
        self.nms = nms;
        Ok(self)
    }

    /// Chooses the output box encoding.
    pub fn with_format(mut self, format: BoxFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables rayon decoding when the `rayon` feature is compiled in.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Network configuration in use.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Suppression thresholds in use.
    pub fn nms_config(&self) -> &NmsConfig {
        &self.nms
    }

    /// Output box encoding.
    pub fn format(&self) -> BoxFormat {
        self.format
    }

    /// Whether parallel decoding was requested.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Decodes feature maps into the bounded candidate list.
    pub fn decode(&self, maps: &[FeatureMap<'_>]) -> YoloPostResult<RawPredictions> {
        #[cfg(feature = "rayon")]
        if self.parallel {
            return crate::decode::rayon::decode_par(maps, &self.network, &self.decoder);
        }
        decode(maps, &self.network, &self.decoder)
    }

    /// Runs suppression and remapping on a decoded candidate list.
    pub fn finish(
        &self,
        raw: &RawPredictions,
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Vec<Detection>> {
        let _span = trace_span!("postprocess", candidates = raw.len()).entered();
        let mut dets = nms(raw, &self.nms);
        to_corners(&mut dets);
        remap_to_source(&mut dets, &self.network, source_width, source_height)?;
        if self.format == BoxFormat::Center {
            to_center(&mut dets);
        }
        trace_event!("detections", count = dets.len());
        Ok(dets)
    }

    /// Processes the engine's flat output buffer.
    pub fn process_raw(
        &self,
        output: &[f32],
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Vec<Detection>> {
        let raw = RawPredictions::from_flat(output, self.network.max_output_boxes)?;
        self.finish(&raw, source_width, source_height)
    }

    /// Decodes per-scale feature maps and processes the result.
    pub fn process_feature_maps(
        &self,
        maps: &[FeatureMap<'_>],
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Vec<Detection>> {
        let raw = self.decode(maps)?;
        self.finish(&raw, source_width, source_height)
    }
}

/// Black-box network runner.
///
/// `infer` receives a planar RGB tensor normalised to `[0, 1]` and fills the
/// flat raw-prediction buffer: count first, then fixed-size records.
pub trait InferenceEngine {
    /// Number of floats the engine expects as input.
    fn input_len(&self) -> usize;

    /// Number of floats the engine writes per frame.
    fn output_len(&self) -> usize;

    /// Runs one forward pass.
    fn infer(&mut self, input: &[f32], output: &mut [f32]) -> YoloPostResult<()>;
}

/// Engine plus post-processing, one frame at a time.
pub struct Detector<E, D = Yolov5BoxDecoder> {
    engine: E,
    post: Postprocessor<D>,
    output: Vec<f32>,
}

impl<E: InferenceEngine, D: BoxDecoder + Sync> Detector<E, D> {
    /// Pairs an engine with a post-processor.
    ///
    /// The engine's buffer sizes must match the post-processor's network
    /// layout.
    pub fn new(engine: E, post: Postprocessor<D>) -> YoloPostResult<Self> {
        let network = post.network();
        if engine.input_len() != network.input_len() {
            return Err(YoloPostError::ShapeMismatch {
                expected: network.input_len(),
                got: engine.input_len(),
                context: "engine input length",
            });
        }
        if engine.output_len() != network.output_len() {
            return Err(YoloPostError::ShapeMismatch {
                expected: network.output_len(),
                got: engine.output_len(),
                context: "engine output length",
            });
        }
        let output = vec![0.0; network.output_len()];
        Ok(Self {
            engine,
            post,
            output,
        })
    }

    /// The post-processor used for every frame.
    pub fn postprocessor(&self) -> &Postprocessor<D> {
        &self.post
    }

    /// Runs one frame and returns detections in source-image pixels.
    pub fn detect(
        &mut self,
        input: &[f32],
        source_width: usize,
        source_height: usize,
    ) -> YoloPostResult<Vec<Detection>> {
        let expected = self.post.network().input_len();
        if input.len() != expected {
            return Err(YoloPostError::ShapeMismatch {
                expected,
                got: input.len(),
                context: "input tensor",
            });
        }
        self.output.fill(0.0);
        self.engine.infer(input, &mut self.output)?;
        self.post
            .process_raw(&self.output, source_width, source_height)
    }

    /// Returns the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }
}
