//! Image loading and letterbox preprocessing via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::config::NetworkConfig;
use crate::remap::Letterbox;
use crate::util::{YoloPostError, YoloPostResult};

/// Grey level used for the letterbox border.
pub const PAD_VALUE: u8 = 128;

/// Loads an image from disk as 8-bit RGB.
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> YoloPostResult<RgbImage> {
    let img = image::open(path).map_err(|err| YoloPostError::ImageIo {
        reason: err.to_string(),
    })?;
    Ok(img.to_rgb8())
}

/// Letterboxes `img` into the network input and returns the planar tensor.
///
/// The image is resized with its aspect ratio kept, centred on a grey canvas
/// of the input size and emitted as `R`, `G`, `B` planes scaled to `[0, 1]`.
pub fn letterbox_image(img: &RgbImage, cfg: &NetworkConfig) -> YoloPostResult<Vec<f32>> {
    let (src_w, src_h) = (img.width() as usize, img.height() as usize);
    let letterbox = Letterbox::for_network(cfg, src_w, src_h)?;
    let (scaled_w, scaled_h) = letterbox.scaled_size(src_w, src_h);
    let scaled_w = scaled_w.clamp(1, cfg.input_width);
    let scaled_h = scaled_h.clamp(1, cfg.input_height);

    let resized = imageops::resize(img, scaled_w as u32, scaled_h as u32, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(
        cfg.input_width as u32,
        cfg.input_height as u32,
        Rgb([PAD_VALUE; 3]),
    );
    let x = (cfg.input_width - scaled_w) / 2;
    let y = (cfg.input_height - scaled_h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    let plane = cfg.input_width * cfg.input_height;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (idx, pixel) in canvas.pixels().enumerate() {
        tensor[idx] = pixel[0] as f32 / 255.0;
        tensor[plane + idx] = pixel[1] as f32 / 255.0;
        tensor[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }
    Ok(tensor)
}
