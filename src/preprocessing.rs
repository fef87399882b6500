// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for orientation classification.
//!
//! Brings a decoded image to the network input: RGB conversion, resize
//! (short side or fixed), center crop, per-channel normalization and
//! conversion to an NCHW `f32` tensor.

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array4, ArrayViewMut3, Axis};

use crate::error::{InferenceError, Result};
use crate::metadata::ModelMetadata;
use crate::task::ResizeMode;

/// Result of preprocessing a single image.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Preprocessed image tensor in NCHW format with a batch of one.
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
}

/// Preprocess one image for classification.
///
/// # Errors
///
/// Returns an error if resizing fails or the crop does not fit the resized image.
pub fn preprocess_image(image: &DynamicImage, metadata: &ModelMetadata) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    let prepared = resize_and_crop(image, metadata)?;
    let (w, h) = prepared.dimensions();

    let mut tensor = Array4::zeros((1, 3, h as usize, w as usize));
    write_normalized(&prepared, metadata, tensor.index_axis_mut(Axis(0), 0));

    Ok(PreprocessResult {
        tensor,
        orig_shape: (orig_height, orig_width),
    })
}

/// Preprocess several images into one stacked NCHW tensor.
///
/// # Errors
///
/// Returns an error if `images` is empty, if any image fails to preprocess,
/// or if the images end up with different sizes (short-side resize without a crop).
pub fn preprocess_batch(images: &[DynamicImage], metadata: &ModelMetadata) -> Result<Array4<f32>> {
    let prepared = images
        .iter()
        .map(|img| resize_and_crop(img, metadata))
        .collect::<Result<Vec<_>>>()?;

    let Some(first) = prepared.first() else {
        return Err(InferenceError::ImageError(
            "Cannot preprocess an empty batch".to_string(),
        ));
    };
    let (w, h) = first.dimensions();

    let mut tensor = Array4::zeros((prepared.len(), 3, h as usize, w as usize));
    for (i, rgb) in prepared.iter().enumerate() {
        if rgb.dimensions() != (w, h) {
            return Err(InferenceError::ImageError(format!(
                "Batch images must share one input size: {}x{} vs {w}x{h}",
                rgb.width(),
                rgb.height()
            )));
        }
        write_normalized(rgb, metadata, tensor.index_axis_mut(Axis(0), i));
    }

    Ok(tensor)
}

/// Apply the resize and crop steps, producing the network-sized RGB image.
fn resize_and_crop(image: &DynamicImage, metadata: &ModelMetadata) -> Result<RgbImage> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(InferenceError::ImageError(format!(
            "Image has zero size: {src_w}x{src_h}"
        )));
    }

    let (new_w, new_h) = resized_dims(src_w, src_h, metadata.resize);
    let resized = resize_rgb(&image.to_rgb8(), new_w, new_h)?;

    match metadata.crop {
        Some((crop_w, crop_h)) => center_crop(&resized, crop_w, crop_h),
        None => Ok(resized),
    }
}

/// Compute the output (width, height) of the resize step.
///
/// Short-side resizing keeps the aspect ratio and rounds half to even.
/// Both dimensions are clamped to at least one pixel.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resized_dims(src_w: u32, src_h: u32, mode: ResizeMode) -> (u32, u32) {
    match mode {
        ResizeMode::Fixed(w, h) => (w.max(1), h.max(1)),
        ResizeMode::ShortSide(target) => {
            let short = src_w.min(src_h).max(1) as f32;
            let scale = target as f32 / short;
            let new_w = bankers_round(src_w as f32 * scale) as u32;
            let new_h = bankers_round(src_h as f32 * scale) as u32;
            (new_w.max(1), new_h.max(1))
        }
    }
}

/// Bilinear resize of an RGB image.
fn resize_rgb(src: &RgbImage, dst_w: u32, dst_h: u32) -> Result<RgbImage> {
    let (src_w, src_h) = src.dimensions();
    if (src_w, src_h) == (dst_w, dst_h) {
        return Ok(src.clone());
    }

    let src_image = Image::from_vec_u8(src_w, src_h, src.as_raw().clone(), PixelType::U8x3)
        .map_err(|e| InferenceError::ImageError(format!("Failed to wrap source image: {e}")))?;
    let mut dst_image = Image::new(dst_w, dst_h, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| InferenceError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(dst_w, dst_h, dst_image.into_vec()).ok_or_else(|| {
        InferenceError::ImageError("Failed to create resized buffer".to_string())
    })
}

/// Crop the centre `crop_w` x `crop_h` region.
///
/// # Errors
///
/// Returns an error if the crop is larger than the image in either dimension.
pub fn center_crop(image: &RgbImage, crop_w: u32, crop_h: u32) -> Result<RgbImage> {
    let (w, h) = image.dimensions();
    if crop_w > w || crop_h > h {
        return Err(InferenceError::ImageError(format!(
            "Crop {crop_w}x{crop_h} is larger than resized image {w}x{h}"
        )));
    }
    let x = (w - crop_w) / 2;
    let y = (h - crop_h) / 2;
    Ok(image::imageops::crop_imm(image, x, y, crop_w, crop_h).to_image())
}

/// Write `(px * scale - mean) / std` for each channel into a CHW view.
fn write_normalized(rgb: &RgbImage, metadata: &ModelMetadata, mut out: ArrayViewMut3<f32>) {
    let width = rgb.width() as usize;
    let factors: [(f32, f32); 3] = std::array::from_fn(|c| {
        let inv_std = if metadata.std[c] == 0.0 {
            1.0
        } else {
            1.0 / metadata.std[c]
        };
        (metadata.scale * inv_std, metadata.mean[c] * inv_std)
    });

    for (i, px) in rgb.as_raw().chunks_exact(3).enumerate() {
        let (y, x) = (i / width, i % width);
        for (c, &(mul, offset)) in factors.iter().enumerate() {
            out[[c, y, x]] = f32::from(px[c]).mul_add(mul, -offset);
        }
    }
}

/// Round float to nearest integer, rounding half to even (Banker's Rounding).
fn bankers_round(v: f32) -> f32 {
    let n = v.floor();
    let d = v - n;
    if (d - 0.5).abs() < 1e-6 {
        if n % 2.0 == 0.0 { n } else { n + 1.0 }
    } else {
        v.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn test_resized_dims_short_side() {
        assert_eq!(resized_dims(512, 1024, ResizeMode::ShortSide(256)), (256, 512));
        assert_eq!(resized_dims(1000, 500, ResizeMode::ShortSide(256)), (512, 256));
        assert_eq!(resized_dims(10, 10, ResizeMode::Fixed(160, 80)), (160, 80));
        assert_eq!(resized_dims(1, 10_000, ResizeMode::ShortSide(1)), (1, 10_000));
    }

    #[test]
    fn test_resized_dims_clamps_to_one() {
        assert_eq!(resized_dims(10_000, 1, ResizeMode::ShortSide(1)).1, 1);
        assert_eq!(resized_dims(5, 5, ResizeMode::Fixed(0, 0)), (1, 1));
    }

    #[test]
    fn test_bankers_round() {
        assert!((bankers_round(2.5) - 2.0).abs() < f32::EPSILON);
        assert!((bankers_round(3.5) - 4.0).abs() < f32::EPSILON);
        assert!((bankers_round(3.2) - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_doc_orientation_tensor_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(300, 400));
        let metadata = ModelMetadata::for_task(Task::DocOrientation);
        let result = preprocess_image(&img, &metadata).unwrap();
        assert_eq!(result.tensor.shape(), &[1, 3, 224, 224]);
        assert_eq!(result.orig_shape, (400, 300));
    }

    #[test]
    fn test_textline_tensor_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(37, 11));
        let metadata = ModelMetadata::for_task(Task::TextlineOrientation);
        let result = preprocess_image(&img, &metadata).unwrap();
        assert_eq!(result.tensor.shape(), &[1, 3, 80, 160]);
    }

    #[test]
    fn test_normalization_values() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 128])));
        let mut metadata = ModelMetadata::for_task(Task::DocOrientation);
        metadata.resize = ResizeMode::Fixed(8, 8);
        metadata.crop = None;

        let tensor = preprocess_image(&img, &metadata).unwrap().tensor;
        let red = (1.0 - 0.485) / 0.229;
        let green = (0.0 - 0.456) / 0.224;
        let blue = (128.0 / 255.0 - 0.406) / 0.225;
        assert!((tensor[[0, 0, 3, 3]] - red).abs() < 1e-4);
        assert!((tensor[[0, 1, 0, 7]] - green).abs() < 1e-4);
        assert!((tensor[[0, 2, 7, 0]] - blue).abs() < 1e-4);
    }

    #[test]
    fn test_center_crop_offsets_and_errors() {
        let mut img = RgbImage::new(6, 4);
        img.put_pixel(1, 1, image::Rgb([9, 9, 9]));
        let cropped = center_crop(&img, 4, 2).unwrap();
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(cropped.get_pixel(0, 0).0, [9, 9, 9]);
        assert!(center_crop(&img, 7, 2).is_err());
    }

    #[test]
    fn test_batch_stacks_images() {
        let metadata = ModelMetadata::for_task(Task::DocOrientation);
        let images = vec![
            DynamicImage::ImageRgb8(RgbImage::new(300, 300)),
            DynamicImage::ImageRgb8(RgbImage::new(640, 480)),
        ];
        let tensor = preprocess_batch(&images, &metadata).unwrap();
        assert_eq!(tensor.shape(), &[2, 3, 224, 224]);
        assert!(preprocess_batch(&[], &metadata).is_err());
    }

    #[test]
    fn test_batch_rejects_mixed_sizes_without_crop() {
        let mut metadata = ModelMetadata::for_task(Task::DocOrientation);
        metadata.crop = None;
        let images = vec![
            DynamicImage::ImageRgb8(RgbImage::new(300, 300)),
            DynamicImage::ImageRgb8(RgbImage::new(600, 300)),
        ];
        assert!(preprocess_batch(&images, &metadata).is_err());
    }
}
