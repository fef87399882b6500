// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Utility functions for the inference library

use image::DynamicImage;
use ndarray::Array3;

use crate::error::{InferenceError, Result};

/// Tolerance used when checking whether a score vector already sums to one.
const PROB_SUM_TOLERANCE: f32 = 1e-3;

/// Numerically stable softmax over a slice of logits.
///
/// Returns an empty vector for empty input.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|v| v / sum).collect()
    } else {
        exps
    }
}

/// Whether the values already form a probability distribution.
#[must_use]
pub fn is_probability_distribution(values: &[f32]) -> bool {
    let sum: f32 = values.iter().sum();
    (sum - 1.0).abs() <= PROB_SUM_TOLERANCE && values.iter().all(|&v| (0.0..=1.0).contains(&v))
}

/// Convert an HWC u8 array to a `DynamicImage`.
///
/// # Arguments
///
/// * `arr` - Input array with shape (H, W, 3).
///
/// # Returns
///
/// * A `DynamicImage` containing the image data.
///
/// # Errors
///
/// Returns an error if dimensions are invalid or conversion fails.
pub fn array_to_image(arr: &Array3<u8>) -> Result<DynamicImage> {
    let shape = arr.shape();
    if shape[2] != 3 {
        return Err(InferenceError::ImageError(format!(
            "Expected 3 channels, got {}",
            shape[2]
        )));
    }
    let height = u32::try_from(shape[0])
        .map_err(|_| InferenceError::ImageError("Image height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| InferenceError::ImageError("Image width exceeds u32::MAX".to_string()))?;

    // Standard layout lets us skip the per-pixel copy
    let rgb_data = arr
        .as_slice()
        .map_or_else(|| arr.iter().copied().collect(), <[u8]>::to_vec);

    let img_buffer = image::RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
        InferenceError::ImageError("Failed to create image from array".to_string())
    })?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}

/// Convert a `DynamicImage` to an HWC RGB ndarray.
///
/// # Errors
///
/// Returns an error if the pixel buffer does not match the image dimensions.
pub fn image_to_array(image: &DynamicImage) -> Result<Array3<u8>> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.into_raw();

    Array3::from_shape_vec((height as usize, width as usize, 3), pixels)
        .map_err(|e| InferenceError::ImageError(format!("Failed to create array from image: {e}")))
}
