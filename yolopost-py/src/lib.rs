//! Python bindings for the yolopost post-processing library.
//!
//! This module exposes configuration, the frame post-processor and the
//! standalone NMS and IoU helpers to Python via PyO3.

use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray3, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use yolopost::{
    AnchorSpec, BoxFormat, Detection as RustDetection, FeatureMap, NetworkConfig as RustNetworkConfig,
    NmsConfig as RustNmsConfig, Postprocessor as RustPostprocessor, RawPredictions, YoloPostError,
};

/// Convert a YoloPostError to a Python exception.
fn to_py_err(err: YoloPostError) -> PyErr {
    match err {
        YoloPostError::InvalidConfig { .. }
        | YoloPostError::InvalidDimensions { .. }
        | YoloPostError::ShapeMismatch { .. }
        | YoloPostError::BufferTooSmall { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_box_format(value: &str) -> PyResult<BoxFormat> {
    match value.to_lowercase().as_str() {
        "corners" | "xyxy" => Ok(BoxFormat::Corners),
        "center" | "xywh" => Ok(BoxFormat::Center),
        _ => Err(PyValueError::new_err(
            "box_format must be 'corners' or 'center'",
        )),
    }
}

/// One detection: box, confidence and class index.
#[pyclass]
#[derive(Clone)]
pub struct Detection {
    /// Box as [x1, y1, x2, y2] or [cx, cy, w, h], depending on the format.
    #[pyo3(get)]
    pub bbox: [f32; 4],
    /// Combined objectness and class probability.
    #[pyo3(get)]
    pub conf: f32,
    /// Class index.
    #[pyo3(get)]
    pub class_id: usize,
}

#[pymethods]
impl Detection {
    fn __repr__(&self) -> String {
        format!(
            "Detection(bbox=[{:.1}, {:.1}, {:.1}, {:.1}], conf={:.3}, class_id={})",
            self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3], self.conf, self.class_id
        )
    }
}

impl From<RustDetection> for Detection {
    fn from(d: RustDetection) -> Self {
        Self {
            bbox: d.bbox,
            conf: d.conf,
            class_id: d.class_index(),
        }
    }
}

/// Network input size, class count, output capacity and anchor layout.
#[pyclass]
#[derive(Clone)]
pub struct NetworkConfig {
    inner: RustNetworkConfig,
}

#[pymethods]
impl NetworkConfig {
    /// Create a new NetworkConfig.
    ///
    /// The default four-scale anchor layout (strides 8, 16, 32, 64) is
    /// rescaled to the requested input size.
    ///
    /// Args:
    ///     input_width: Network input width, multiple of 64 (default: 640)
    ///     input_height: Network input height, multiple of 64 (default: 384)
    ///     num_classes: Number of classes (default: 6)
    ///     max_output_boxes: Raw candidate capacity (default: 1000)
    ///     ignore_thresh: Decoder confidence floor (default: 0.45)
    #[new]
    #[pyo3(signature = (input_width=640, input_height=384, num_classes=6, max_output_boxes=1000, ignore_thresh=0.45))]
    fn new(
        input_width: usize,
        input_height: usize,
        num_classes: usize,
        max_output_boxes: usize,
        ignore_thresh: f32,
    ) -> PyResult<Self> {
        let defaults = RustNetworkConfig::default();
        let anchors = defaults
            .anchors
            .iter()
            .map(|spec| {
                let (stride, _) = spec.stride(defaults.input_width, defaults.input_height);
                AnchorSpec::for_stride(input_width, input_height, stride as usize, spec.priors)
            })
            .collect();
        let inner = RustNetworkConfig {
            input_width,
            input_height,
            num_classes,
            max_output_boxes,
            ignore_thresh,
            anchors,
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Validate the configuration.
    fn validate(&self) -> PyResult<()> {
        self.inner.validate().map_err(to_py_err)
    }

    /// Length of the planar RGB input tensor.
    #[getter]
    fn input_len(&self) -> usize {
        self.inner.input_len()
    }

    /// Length of the flat raw-prediction buffer.
    #[getter]
    fn output_len(&self) -> usize {
        self.inner.output_len()
    }

    /// Channel count of each per-scale feature map.
    #[getter]
    fn channels_per_scale(&self) -> usize {
        self.inner.channels_per_scale()
    }

    /// Grid size (height, width) of each scale.
    #[getter]
    fn grids(&self) -> Vec<(usize, usize)> {
        self.inner
            .anchors
            .iter()
            .map(|a| (a.grid_height, a.grid_width))
            .collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "NetworkConfig(input_width={}, input_height={}, num_classes={}, max_output_boxes={}, ignore_thresh={})",
            self.inner.input_width,
            self.inner.input_height,
            self.inner.num_classes,
            self.inner.max_output_boxes,
            self.inner.ignore_thresh
        )
    }
}

/// Final-stage confidence and IoU thresholds.
#[pyclass]
#[derive(Clone)]
pub struct NmsConfig {
    inner: RustNmsConfig,
}

#[pymethods]
impl NmsConfig {
    /// Create a new NmsConfig.
    ///
    /// Args:
    ///     conf_thresh: Candidates at or below this confidence are dropped (default: 0.45)
    ///     iou_thresh: Overlap above this suppresses the weaker box (default: 0.5)
    #[new]
    #[pyo3(signature = (conf_thresh=0.45, iou_thresh=0.5))]
    fn new(conf_thresh: f32, iou_thresh: f32) -> PyResult<Self> {
        let inner = RustNmsConfig {
            conf_thresh,
            iou_thresh,
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "NmsConfig(conf_thresh={}, iou_thresh={})",
            self.inner.conf_thresh, self.inner.iou_thresh
        )
    }
}

/// Decode, suppress and remap for one network configuration.
#[pyclass]
pub struct Postprocessor {
    inner: RustPostprocessor,
}

#[pymethods]
impl Postprocessor {
    /// Create a new Postprocessor.
    ///
    /// Args:
    ///     network: NetworkConfig (default: NetworkConfig())
    ///     nms: NmsConfig (default: NmsConfig())
    ///     box_format: "corners" or "center" (default: "corners")
    ///     parallel: Decode feature maps on all cores (default: False)
    #[new]
    #[pyo3(signature = (network = None, nms = None, box_format = "corners", parallel = false))]
    fn new(
        network: Option<NetworkConfig>,
        nms: Option<NmsConfig>,
        box_format: &str,
        parallel: bool,
    ) -> PyResult<Self> {
        let network = network.map(|n| n.inner).unwrap_or_default();
        let nms = nms.map(|n| n.inner).unwrap_or_default();
        let inner = RustPostprocessor::new(network)
            .and_then(|p| p.with_nms(nms))
            .map_err(to_py_err)?
            .with_format(parse_box_format(box_format)?)
            .with_parallel(parallel);
        Ok(Self { inner })
    }

    /// Post-process the engine's flat output buffer.
    ///
    /// Args:
    ///     output: 1D float32 array, count followed by 6-float records
    ///     source_width: Width of the original image in pixels
    ///     source_height: Height of the original image in pixels
    ///
    /// Returns:
    ///     List of Detection objects in source-image pixels
    fn process_raw(
        &self,
        output: PyReadonlyArray1<'_, f32>,
        source_width: usize,
        source_height: usize,
    ) -> PyResult<Vec<Detection>> {
        let data = output.as_slice()?;
        let dets = self
            .inner
            .process_raw(data, source_width, source_height)
            .map_err(to_py_err)?;
        Ok(dets.into_iter().map(Detection::from).collect())
    }

    /// Decode per-scale feature maps and post-process the result.
    ///
    /// Args:
    ///     maps: List of 3D float32 arrays (channels x grid_height x grid_width)
    ///     source_width: Width of the original image in pixels
    ///     source_height: Height of the original image in pixels
    ///
    /// Returns:
    ///     List of Detection objects in source-image pixels
    fn process_feature_maps(
        &self,
        maps: Vec<PyReadonlyArray3<'_, f32>>,
        source_width: usize,
        source_height: usize,
    ) -> PyResult<Vec<Detection>> {
        let mut views = Vec::with_capacity(maps.len());
        for map in &maps {
            let shape = map.shape();
            let view = FeatureMap::new(map.as_slice()?, shape[0], shape[2], shape[1])
                .map_err(to_py_err)?;
            views.push(view);
        }
        let dets = self
            .inner
            .process_feature_maps(&views, source_width, source_height)
            .map_err(to_py_err)?;
        Ok(dets.into_iter().map(Detection::from).collect())
    }

    /// Load an image and letterbox it into the planar network input.
    ///
    /// Args:
    ///     path: Path to an image file
    ///
    /// Returns:
    ///     (tensor, source_width, source_height)
    fn letterbox<'py>(
        &self,
        py: Python<'py>,
        path: &str,
    ) -> PyResult<(Bound<'py, PyArray1<f32>>, usize, usize)> {
        let img = yolopost::io::load_rgb_image(path).map_err(to_py_err)?;
        let tensor =
            yolopost::io::letterbox_image(&img, self.inner.network()).map_err(to_py_err)?;
        Ok((
            PyArray1::from_vec(py, tensor),
            img.width() as usize,
            img.height() as usize,
        ))
    }

    #[getter]
    fn network(&self) -> NetworkConfig {
        NetworkConfig {
            inner: self.inner.network().clone(),
        }
    }

    fn __repr__(&self) -> String {
        let format = match self.inner.format() {
            BoxFormat::Corners => "corners",
            BoxFormat::Center => "center",
        };
        format!(
            "Postprocessor(box_format='{}', parallel={})",
            format,
            self.inner.is_parallel()
        )
    }
}

/// Class-wise greedy NMS over a flat raw-prediction buffer.
///
/// Boxes stay in network-input center form; nothing is remapped.
///
/// Args:
///     raw: 1D float32 array, count followed by 6-float records
///     capacity: Maximum number of records to read (default: 1000)
///     conf_thresh: Confidence floor (default: 0.45)
///     iou_thresh: Suppression overlap (default: 0.5)
///
/// Returns:
///     List of surviving Detection objects
#[pyfunction]
#[pyo3(signature = (raw, capacity = 1000, conf_thresh = 0.45, iou_thresh = 0.5))]
fn nms(
    raw: PyReadonlyArray1<'_, f32>,
    capacity: usize,
    conf_thresh: f32,
    iou_thresh: f32,
) -> PyResult<Vec<Detection>> {
    let cfg = RustNmsConfig {
        conf_thresh,
        iou_thresh,
    };
    cfg.validate().map_err(to_py_err)?;
    let preds = RawPredictions::from_flat(raw.as_slice()?, capacity).map_err(to_py_err)?;
    Ok(yolopost::nms(&preds, &cfg)
        .into_iter()
        .map(Detection::from)
        .collect())
}

/// IoU of two center-form boxes [cx, cy, w, h].
#[pyfunction]
fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    yolopost::iou(a, b)
}

/// Python module for yolopost.
#[pymodule]
fn _yolopost(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Detection>()?;
    m.add_class::<NetworkConfig>()?;
    m.add_class::<NmsConfig>()?;
    m.add_class::<Postprocessor>()?;
    m.add_function(wrap_pyfunction!(nms, m)?)?;
    m.add_function(wrap_pyfunction!(iou, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
