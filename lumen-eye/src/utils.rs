//! Conversions between OpenCV matrices and `image` buffers

use crate::error::VisionError;
use image::RgbImage;
use opencv::{
    core::{Mat, Scalar, CV_8U, CV_8UC3},
    imgproc,
    prelude::*,
};

/// 8-bit GRAY, BGR or BGRA matrix to an RGB image
pub fn mat_to_image(mat: &Mat) -> Result<RgbImage, VisionError> {
    if mat.empty() {
        return Err(VisionError::Processing("Empty frame".to_string()));
    }
    if mat.depth() != CV_8U {
        return Err(VisionError::Processing(format!("Unsupported frame depth: {}", mat.depth())));
    }

    let code = match mat.channels() {
        1 => imgproc::COLOR_GRAY2RGB,
        3 => imgproc::COLOR_BGR2RGB,
        4 => imgproc::COLOR_BGRA2RGB,
        n => return Err(VisionError::Processing(format!("Invalid channel count: {}", n))),
    };
    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, code, 0)?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
        VisionError::Processing(format!("Frame buffer does not match {}x{}", width, height))
    })
}

/// RGB image to an 8-bit BGR matrix for display
pub fn image_to_mat(image: &RgbImage) -> Result<Mat, VisionError> {
    let (width, height) = image.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))?;
    let dst = mat.data_bytes_mut()?;
    for (out, px) in dst.chunks_exact_mut(3).zip(image.pixels()) {
        out[0] = px[2];
        out[1] = px[1];
        out[2] = px[0];
    }
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_round_trip_swaps_channels() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(1, 1, Rgb([10, 20, 30]));

        let mat = image_to_mat(&img).unwrap();
        assert_eq!((mat.cols(), mat.rows(), mat.channels()), (3, 2, 3));
        let bytes = mat.data_bytes().unwrap();
        let offset = (1 * 3 + 1) * 3;
        assert_eq!(&bytes[offset..offset + 3], &[30, 20, 10]);

        assert_eq!(mat_to_image(&mat).unwrap(), img);
    }

    #[test]
    fn test_empty_mat_rejected() {
        assert!(mat_to_image(&Mat::default()).is_err());
    }
}
