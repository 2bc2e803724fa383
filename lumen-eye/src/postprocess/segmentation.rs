//! Per-pixel class scores to colour-coded label images

use super::colormap::{cityscapes_label_id, label_palette};
use crate::error::VisionError;
use crate::tensor::Tensor;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Winning class per pixel, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u8>,
}

/// Argmax over the class axis of a `[1,] K × h × w` score map; ties go to the lower class
pub fn argmax_labels(scores: &Tensor) -> Result<LabelMap, VisionError> {
    let (classes, height, width) = scores.as_chw()?;
    if classes == 0 || classes > 256 {
        return Err(VisionError::Processing(format!(
            "Cannot colour {} classes with an 8-bit palette",
            classes
        )));
    }
    let plane = height * width;
    let data = scores.data();
    let labels = (0..plane)
        .map(|p| {
            let mut best = 0usize;
            let mut best_score = data[p];
            for k in 1..classes {
                let v = data[k * plane + p];
                if v > best_score {
                    best = k;
                    best_score = v;
                }
            }
            best as u8
        })
        .collect();
    Ok(LabelMap { width, height, labels })
}

/// Bilinearly resample a `[1,] K × h × w` score map to `out_height × out_width`
/// using half-pixel centres
pub fn smooth_scores(scores: &Tensor, out_height: usize, out_width: usize) -> Result<Tensor, VisionError> {
    let (classes, height, width) = scores.as_chw()?;
    if height == 0 || width == 0 || out_height == 0 || out_width == 0 {
        return Err(VisionError::Processing("Cannot resample an empty score map".to_string()));
    }

    let axis = |out: usize, size: usize, scale: f32| -> (usize, usize, f32) {
        let src = ((out as f32 + 0.5) * scale - 0.5).max(0.0);
        let lo = (src.floor() as usize).min(size - 1);
        let hi = (lo + 1).min(size - 1);
        (lo, hi, src - lo as f32)
    };
    let scale_y = height as f32 / out_height as f32;
    let scale_x = width as f32 / out_width as f32;
    let rows: Vec<_> = (0..out_height).map(|y| axis(y, height, scale_y)).collect();
    let cols: Vec<_> = (0..out_width).map(|x| axis(x, width, scale_x)).collect();

    let data = scores.data();
    let plane = height * width;
    let mut out = Vec::with_capacity(classes * out_height * out_width);
    for k in 0..classes {
        let channel = &data[k * plane..(k + 1) * plane];
        for &(y0, y1, fy) in &rows {
            for &(x0, x1, fx) in &cols {
                let top = channel[y0 * width + x0] * (1.0 - fx) + channel[y0 * width + x1] * fx;
                let bottom = channel[y1 * width + x0] * (1.0 - fx) + channel[y1 * width + x1] * fx;
                out.push(top * (1.0 - fy) + bottom * fy);
            }
        }
    }
    Tensor::new(vec![1, classes, out_height, out_width], out)
}

/// Paint each pixel with the palette colour of its Cityscapes label id
pub fn colorize(map: &LabelMap) -> RgbImage {
    let palette = label_palette();
    RgbImage::from_fn(map.width as u32, map.height as u32, |x, y| {
        let train_id = map.labels[y as usize * map.width + x as usize];
        palette[cityscapes_label_id(train_id) as usize]
    })
}

/// Full segmentation rendering at `width × height`; with `smooth` the scores are
/// upsampled before the argmax instead of upscaling the coloured labels
pub fn render_prediction(
    scores: &Tensor,
    width: u32,
    height: u32,
    smooth: bool,
) -> Result<RgbImage, VisionError> {
    let map = if smooth {
        argmax_labels(&smooth_scores(scores, height as usize, width as usize)?)?
    } else {
        argmax_labels(scores)?
    };
    let coloured = colorize(&map);
    if coloured.dimensions() == (width, height) {
        return Ok(coloured);
    }
    Ok(imageops::resize(&coloured, width, height, FilterType::Nearest))
}
