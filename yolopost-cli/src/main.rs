use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yolopost::{AnchorSpec, BoxFormat, Detection, NetworkConfig, NmsConfig, Postprocessor};

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO post-processing CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BoxFormatConfig {
    #[default]
    Corners,
    Center,
}

impl From<BoxFormatConfig> for BoxFormat {
    fn from(value: BoxFormatConfig) -> Self {
        match value {
            BoxFormatConfig::Corners => BoxFormat::Corners,
            BoxFormatConfig::Center => BoxFormat::Center,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnchorJson {
    stride: usize,
    priors: [[f32; 2]; 3],
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NetworkConfigJson {
    input_width: usize,
    input_height: usize,
    num_classes: usize,
    max_output_boxes: usize,
    ignore_thresh: f32,
    /// Empty means the default anchor layout rescaled to the input size.
    anchors: Vec<AnchorJson>,
    parallel: bool,
}

impl Default for NetworkConfigJson {
    fn default() -> Self {
        let cfg = NetworkConfig::default();
        Self {
            input_width: cfg.input_width,
            input_height: cfg.input_height,
            num_classes: cfg.num_classes,
            max_output_boxes: cfg.max_output_boxes,
            ignore_thresh: cfg.ignore_thresh,
            anchors: Vec::new(),
            parallel: false,
        }
    }
}

impl NetworkConfigJson {
    fn to_config(&self) -> NetworkConfig {
        let defaults = NetworkConfig::default();
        let anchors = if self.anchors.is_empty() {
            defaults
                .anchors
                .iter()
                .map(|spec| {
                    let (stride, _) = spec.stride(defaults.input_width, defaults.input_height);
                    AnchorSpec::for_stride(
                        self.input_width,
                        self.input_height,
                        stride as usize,
                        spec.priors,
                    )
                })
                .collect()
        } else {
            self.anchors
                .iter()
                .map(|a| {
                    AnchorSpec::for_stride(
                        self.input_width,
                        self.input_height,
                        a.stride,
                        a.priors.map(|[w, h]| (w, h)),
                    )
                })
                .collect()
        };
        NetworkConfig {
            input_width: self.input_width,
            input_height: self.input_height,
            num_classes: self.num_classes,
            max_output_boxes: self.max_output_boxes,
            ignore_thresh: self.ignore_thresh,
            anchors,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NmsConfigJson {
    conf_thresh: f32,
    iou_thresh: f32,
}

impl Default for NmsConfigJson {
    fn default() -> Self {
        let cfg = NmsConfig::default();
        Self {
            conf_thresh: cfg.conf_thresh,
            iou_thresh: cfg.iou_thresh,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    raw_output_path: String,
    source_width: usize,
    source_height: usize,
    output_path: Option<String>,
    box_format: BoxFormatConfig,
    network: NetworkConfigJson,
    nms: NmsConfigJson,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    bbox: [f32; 4],
    conf: f32,
    class_id: usize,
}

impl From<Detection> for DetectionRecord {
    fn from(value: Detection) -> Self {
        Self {
            bbox: value.bbox,
            conf: value.conf,
            class_id: value.class_index(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    count: usize,
    detections: Vec<DetectionRecord>,
}

/// Reads a little-endian `f32` dump of the engine output.
fn read_f32_le(path: &str) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(format!("{path}: length {} is not a multiple of 4", bytes.len()).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("yolopost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.raw_output_path.is_empty() {
        return Err("raw_output_path must be set in the config".into());
    }
    if config.source_width == 0 || config.source_height == 0 {
        return Err("source_width and source_height must be positive".into());
    }

    let post = Postprocessor::new(config.network.to_config())?
        .with_nms(NmsConfig {
            conf_thresh: config.nms.conf_thresh,
            iou_thresh: config.nms.iou_thresh,
        })?
        .with_format(config.box_format.into())
        .with_parallel(config.network.parallel);

    let raw = read_f32_le(&config.raw_output_path)?;
    let expected = post.network().output_len();
    if raw.len() != expected {
        info!(expected, got = raw.len(), "raw output length differs from layout");
    }
    let detections = post.process_raw(&raw, config.source_width, config.source_height)?;

    let output = Output {
        count: detections.len(),
        detections: detections.into_iter().map(DetectionRecord::from).collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
