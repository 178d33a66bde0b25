//! Image preprocessing: decode, grayscale, resize, normalize, batch.

use crate::profile::{ModelProfile, TensorLayout};
use image::{GrayImage, ImageBuffer, Luma};
use ndarray::Array4;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero size")]
    EmptyImage,
}

/// ITU-R BT.601 luma in 16.16 fixed point, matching PIL's `convert("L")`.
#[inline]
pub fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Decode an encoded image (PNG, JPEG, ...) into a grayscale buffer.
pub fn decode_grayscale(bytes: &[u8]) -> Result<GrayImage, PreprocessError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage);
    }

    let gray: Vec<u8> = rgb
        .pixels()
        .map(|p| luma_bt601(p[0], p[1], p[2]))
        .collect();

    ImageBuffer::<Luma<u8>, _>::from_raw(width, height, gray).ok_or(PreprocessError::EmptyImage)
}

/// Resize a grayscale image to the profile's input size and lay it out as
/// a single-item float batch.
pub fn to_tensor(gray: &GrayImage, profile: &ModelProfile) -> Array4<f32> {
    let (w, h) = (profile.input_width, profile.input_height);
    let resized = if gray.dimensions() == (w, h) {
        gray.clone()
    } else {
        image::imageops::resize(gray, w, h, profile.filter.into())
    };

    let mut tensor = Array4::<f32>::zeros(profile.input_shape());
    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = pixel[0] as f32 / profile.pixel_divisor;
        let (x, y) = (x as usize, y as usize);
        match profile.layout {
            TensorLayout::Nhwc => tensor[[0, y, x, 0]] = value,
            TensorLayout::Nchw => tensor[[0, 0, y, x]] = value,
        }
    }

    tensor
}

/// Full preprocessing of an encoded image for the given profile.
pub fn preprocess(bytes: &[u8], profile: &ModelProfile) -> Result<Array4<f32>, PreprocessError> {
    let gray = decode_grayscale(bytes)?;
    tracing::debug!(
        width = gray.width(),
        height = gray.height(),
        target_width = profile.input_width,
        target_height = profile.input_height,
        "decoded upload"
    );
    Ok(to_tensor(&gray, profile))
}

/// Read an image file from disk and preprocess it.
pub fn preprocess_file(path: &Path, profile: &ModelProfile) -> Result<Array4<f32>, PreprocessError> {
    let bytes = std::fs::read(path)?;
    preprocess(&bytes, profile)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::profile::builtin;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Encode a solid-colour RGB image as PNG.
    pub(crate) fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma_bt601(0, 0, 0), 0);
        assert_eq!(luma_bt601(255, 255, 255), 255);
    }

    #[test]
    fn test_luma_weights() {
        // 0.299 * 255 ≈ 76, 0.587 * 255 ≈ 150, 0.114 * 255 ≈ 29
        assert_eq!(luma_bt601(255, 0, 0), 76);
        assert_eq!(luma_bt601(0, 255, 0), 150);
        assert_eq!(luma_bt601(0, 0, 255), 29);
    }

    #[test]
    fn test_decode_grayscale_dimensions() {
        let gray = decode_grayscale(&png_bytes(20, 10, [10, 20, 30])).unwrap();
        assert_eq!(gray.dimensions(), (20, 10));
        let expected = luma_bt601(10, 20, 30);
        assert!(gray.pixels().all(|p| p[0] == expected));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_grayscale(b"definitely not an image");
        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn test_preprocess_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = preprocess_file(&dir.path().join("absent.png"), &ModelProfile::default());
        assert!(matches!(result, Err(PreprocessError::Io(_))));
    }

    #[test]
    fn test_preprocess_nhwc_shape_and_range() {
        let profile = ModelProfile::default();
        let tensor = preprocess(&png_bytes(100, 80, [255, 255, 255]), &profile).unwrap();
        assert_eq!(tensor.shape(), &[1, 48, 48, 1]);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_unit_interval() {
        let profile = ModelProfile::default();
        let tensor = preprocess(&png_bytes(64, 64, [128, 128, 128]), &profile).unwrap();
        let expected = 128.0 / 255.0;
        assert!(tensor.iter().all(|&v| (v - expected).abs() < 1e-6));
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_nchw_raw_pixels() {
        let profile = builtin("ferplus").unwrap();
        let tensor = preprocess(&png_bytes(64, 64, [200, 200, 200]), profile).unwrap();
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
        assert!(tensor.iter().all(|&v| (v - 200.0).abs() < 1e-3));
    }

    #[test]
    fn test_to_tensor_preserves_layout() {
        // Left half black, right half white at the target size: no resampling.
        let gray = GrayImage::from_fn(48, 48, |x, _| Luma([if x < 24 { 0 } else { 255 }]));
        let tensor = to_tensor(&gray, &ModelProfile::default());
        assert_eq!(tensor[[0, 10, 0, 0]], 0.0);
        assert_eq!(tensor[[0, 10, 47, 0]], 1.0);
    }
}
