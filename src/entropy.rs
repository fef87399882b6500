// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Shannon entropy of an image's grayscale histogram.
//!
//! Useful as a cheap "is there anything on this page" signal before running
//! the classifier. Values range from 0 (a single gray level) to 8 bits.

use image::RgbImage;

/// Integer grayscale approximation of `0.299 r + 0.587 g + 0.114 b`.
#[must_use]
pub fn gray_level(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * 76 + u32::from(g) * 150 + u32::from(b) * 30;
    // 76 + 150 + 30 == 256, so the shifted value always fits
    u8::try_from(weighted >> 8).unwrap_or(u8::MAX)
}

/// Entropy in bits over every pixel of `image`.
#[must_use]
pub fn image_entropy(image: &RgbImage) -> f64 {
    image_entropy_downsampled(image, 1)
}

/// Entropy in bits over a grid that keeps every `sample_rate`-th pixel in
/// both directions. `sample_rate <= 1` uses all pixels.
#[must_use]
pub fn image_entropy_downsampled(image: &RgbImage, sample_rate: u32) -> f64 {
    let step = sample_rate.max(1) as usize;
    let mut histogram = [0u64; 256];
    let mut samples = 0u64;

    for y in (0..image.height()).step_by(step) {
        for x in (0..image.width()).step_by(step) {
            let [r, g, b] = image.get_pixel(x, y).0;
            histogram[usize::from(gray_level(r, g, b))] += 1;
            samples += 1;
        }
    }

    histogram_entropy(&histogram, samples)
}

#[allow(clippy::cast_precision_loss)]
fn histogram_entropy(histogram: &[u64; 256], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_gray_level_bounds() {
        assert_eq!(gray_level(0, 0, 0), 0);
        assert_eq!(gray_level(255, 255, 255), 255);
        assert_eq!(gray_level(255, 0, 0), 75);
    }

    #[test]
    fn test_uniform_image_has_zero_entropy() {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 30, 200]));
        assert!(image_entropy(&img).abs() < 1e-12);
    }

    #[test]
    fn test_two_level_image_has_one_bit() {
        let img = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        assert!((image_entropy(&img) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_downsampling_skips_pixels() {
        // Odd columns are white, even columns black; stepping by 2 sees only black
        let img = RgbImage::from_fn(8, 8, |x, _| {
            if x % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        assert!((image_entropy_downsampled(&img, 0) - 1.0).abs() < 1e-12);
        assert!(image_entropy_downsampled(&img, 2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_image() {
        assert!(image_entropy(&RgbImage::new(0, 0)).abs() < f64::EPSILON);
    }
}
