//! Image to tensor conversion: canonicalize, resize, crop, normalize

use crate::error::VisionError;
use crate::tensor::Tensor;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Deterministic preprocessing steps for one model family
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessRecipe {
    /// Resize target (width, height); aspect ratio is not preserved
    pub resize: (u32, u32),
    /// Square centre crop applied after resizing
    pub center_crop: Option<u32>,
    /// Pixel scale applied before mean/std
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl PreprocessRecipe {
    /// Resize to 256×256, crop the centre 224×224, ImageNet normalization
    pub fn places365_center_crop() -> Self {
        Self {
            resize: (256, 256),
            center_crop: Some(224),
            scale: 1.0 / 255.0,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Resize straight to 224×224, ImageNet normalization
    pub fn places365_direct() -> Self {
        Self {
            resize: (224, 224),
            center_crop: None,
            scale: 1.0 / 255.0,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Resize to 1024×512 and scale to [0, 1]
    pub fn hrnet() -> Self {
        Self {
            resize: (1024, 512),
            center_crop: None,
            scale: 1.0 / 255.0,
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }

    /// Final (width, height) of the tensor produced by this recipe
    pub fn output_size(&self) -> (u32, u32) {
        match self.center_crop {
            Some(crop) => (crop, crop),
            None => self.resize,
        }
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        let (width, height) = self.resize;
        if width == 0 || height == 0 {
            return Err(VisionError::Processing("Resize dimensions cannot be zero".to_string()));
        }
        if let Some(crop) = self.center_crop {
            if crop == 0 || crop > width || crop > height {
                return Err(VisionError::Processing(format!(
                    "Crop size {} does not fit in {}x{}",
                    crop, width, height
                )));
            }
        }
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(VisionError::Processing("Scale must be greater than 0".to_string()));
        }
        for (i, &s) in self.std.iter().enumerate() {
            if !(s > 0.0) {
                return Err(VisionError::Processing(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }
        Ok(())
    }

    /// Run the full recipe on one image
    pub fn apply(&self, image: &DynamicImage) -> Result<Tensor, VisionError> {
        self.validate()?;
        let rgb = canonicalize(image)?;
        let (width, height) = self.resize;
        let mut resized = imageops::resize(&rgb, width, height, FilterType::Triangle);
        if let Some(crop) = self.center_crop {
            resized = center_crop(&resized, crop)?;
        }
        self.normalize(&resized)
    }

    /// HWC `u8` pixels to a normalized `[1, 3, H, W]` tensor
    pub fn normalize(&self, image: &RgbImage) -> Result<Tensor, VisionError> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let plane = w * h;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in image.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                let value = pixel[c] as f32 * self.scale;
                data[c * plane + offset] = (value - self.mean[c]) / self.std[c];
            }
        }
        Tensor::new(vec![1, 3, h, w], data)
    }
}

/// Bring grayscale, RGBA and 16-bit images to 8-bit RGB
pub fn canonicalize(image: &DynamicImage) -> Result<RgbImage, VisionError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::Processing("Invalid image dimensions".to_string()));
    }
    Ok(match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    })
}

/// Square crop from the centre, offsets rounded like `round((size - crop) / 2)`
pub fn center_crop(image: &RgbImage, size: u32) -> Result<RgbImage, VisionError> {
    let (width, height) = image.dimensions();
    if size == 0 || size > width || size > height {
        return Err(VisionError::Processing(format!(
            "Cannot crop {}x{} from {}x{}",
            size, size, width, height
        )));
    }
    let left = ((width - size) as f32 / 2.0).round() as u32;
    let top = ((height - size) as f32 / 2.0).round() as u32;
    Ok(imageops::crop_imm(image, left, top, size, size).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};

    #[test]
    fn test_center_crop_offsets() {
        let mut img = RgbImage::new(256, 256);
        img.put_pixel(16, 16, Rgb([255, 0, 0]));
        let cropped = center_crop(&img, 224).unwrap();
        assert_eq!(cropped.dimensions(), (224, 224));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_center_crop_too_large() {
        let img = RgbImage::new(100, 300);
        assert!(center_crop(&img, 224).is_err());
    }

    #[test]
    fn test_normalize_values() {
        let recipe = PreprocessRecipe::places365_direct();
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 128]));
        let tensor = recipe.normalize(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        let red = tensor.data()[0];
        let green = tensor.data()[4];
        assert!((red - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((green - (-0.456 / 0.224)).abs() < 1e-5);
    }

    #[test]
    fn test_hrnet_recipe_scales_only() {
        let recipe = PreprocessRecipe::hrnet();
        let img = RgbImage::from_pixel(1, 1, Rgb([51, 102, 255]));
        let tensor = recipe.normalize(&img).unwrap();
        for (got, want) in tensor.data().iter().zip([0.2f32, 0.4, 1.0]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_apply_channel_variants() {
        let recipe = PreprocessRecipe::places365_center_crop();
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 200, Luma([10])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 480, Rgba([1, 2, 3, 4])));
        for img in [gray, rgba] {
            let tensor = recipe.apply(&img).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        }
    }

    #[test]
    fn test_grayscale_replicated_across_channels() {
        let recipe = PreprocessRecipe::hrnet();
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255])));
        let tensor = recipe.apply(&gray).unwrap();
        assert!(tensor.data().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_apply_is_deterministic() {
        let recipe = PreprocessRecipe::places365_center_crop();
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(97, 53, |x, y| {
            Rgb([(x * 3) as u8, (y * 5) as u8, ((x + y) % 256) as u8])
        }));
        assert_eq!(recipe.apply(&img).unwrap(), recipe.apply(&img).unwrap());
    }

    #[test]
    fn test_empty_image_rejected() {
        let recipe = PreprocessRecipe::hrnet();
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(recipe.apply(&img).is_err());
    }

    #[test]
    fn test_recipe_validation() {
        let mut recipe = PreprocessRecipe::places365_center_crop();
        recipe.center_crop = Some(300);
        assert!(recipe.validate().is_err());

        let mut recipe = PreprocessRecipe::hrnet();
        recipe.std = [1.0, 0.0, 1.0];
        assert!(recipe.validate().is_err());
    }
}
