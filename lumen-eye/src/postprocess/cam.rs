//! Class activation maps rendered over the input image

use super::colormap::jet;
use crate::error::VisionError;
use crate::tensor::Tensor;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Side of the square canvas the raw map is upsampled to
pub const CAM_CANVAS: u32 = 256;
pub const HEAT_WEIGHT: f32 = 0.4;
pub const IMAGE_WEIGHT: f32 = 0.5;

/// Project `class_weights` (one per channel) onto `C × h × w` feature maps and
/// rescale the result to a `CAM_CANVAS` square of 8-bit intensities
pub fn class_activation_map(features: &Tensor, class_weights: &[f32]) -> Result<GrayImage, VisionError> {
    let (channels, height, width) = features.as_chw()?;
    if class_weights.len() != channels {
        return Err(VisionError::Processing(format!(
            "{} class weights for {} feature channels",
            class_weights.len(),
            channels
        )));
    }
    if height == 0 || width == 0 {
        return Err(VisionError::Processing("Empty feature map".to_string()));
    }

    let plane = height * width;
    let mut cam = vec![0.0f32; plane];
    for (weight, channel) in class_weights.iter().zip(features.data().chunks_exact(plane)) {
        for (acc, &v) in cam.iter_mut().zip(channel) {
            *acc += weight * v;
        }
    }

    let min = cam.iter().copied().fold(f32::INFINITY, f32::min);
    for v in cam.iter_mut() {
        *v -= min;
    }
    let max = cam.iter().copied().fold(0.0f32, f32::max);

    let raw = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let v = cam[y as usize * width + x as usize];
        let scaled = if max > 0.0 { 255.0 * v / max } else { 0.0 };
        Luma([scaled.clamp(0.0, 255.0) as u8])
    });
    Ok(imageops::resize(&raw, CAM_CANVAS, CAM_CANVAS, FilterType::Triangle))
}

/// Colour the map, stretch it over `image`, and blend `heat·0.4 + image·0.5`
pub fn render_overlay(cam: &GrayImage, image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let stretched = imageops::resize(cam, width, height, FilterType::Triangle);
    RgbImage::from_fn(width, height, |x, y| {
        let heat = jet(stretched.get_pixel(x, y)[0]);
        let base = image.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = heat[c] as f32 * HEAT_WEIGHT + base[c] as f32 * IMAGE_WEIGHT;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Tensor {
        // two channels over a 2x2 grid
        Tensor::new(vec![1, 2, 2, 2], vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap()
    }

    #[test]
    fn test_cam_peaks_where_weighted_channel_fires() {
        let cam = class_activation_map(&features(), &[1.0, 0.0]).unwrap();
        assert_eq!(cam.dimensions(), (CAM_CANVAS, CAM_CANVAS));
        assert!(cam.get_pixel(0, 0)[0] > cam.get_pixel(CAM_CANVAS - 1, CAM_CANVAS - 1)[0]);

        let cam = class_activation_map(&features(), &[0.0, 1.0]).unwrap();
        assert!(cam.get_pixel(CAM_CANVAS - 1, CAM_CANVAS - 1)[0] > cam.get_pixel(0, 0)[0]);
    }

    #[test]
    fn test_cam_flat_map_is_zero() {
        let flat = Tensor::new(vec![1, 1, 2, 2], vec![3.0; 4]).unwrap();
        let cam = class_activation_map(&flat, &[2.0]).unwrap();
        assert!(cam.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_cam_weight_count_mismatch() {
        assert!(class_activation_map(&features(), &[1.0]).is_err());
    }

    #[test]
    fn test_render_overlay_blend() {
        let cam = GrayImage::from_pixel(CAM_CANVAS, CAM_CANVAS, Luma([0]));
        let image = RgbImage::from_pixel(10, 6, Rgb([200, 100, 0]));
        let out = render_overlay(&cam, &image);
        assert_eq!(out.dimensions(), (10, 6));
        // jet(0) = (0, 0, 128)
        assert_eq!(out.get_pixel(3, 3), &Rgb([100, 50, 51]));
    }
}
