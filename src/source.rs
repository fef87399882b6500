// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input source handling.
//!
//! A [`Source`] names where images come from: a single file, a directory,
//! a simple glob, an explicit list or an in-memory image. [`SourceIterator`]
//! decodes them one at a time.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array3;

use crate::error::{InferenceError, Result};
use crate::utils::array_to_image;

/// File extensions recognised as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// Represents different input sources for inference.
#[derive(Debug, Clone)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// In-memory image.
    ImageBuffer(DynamicImage),
    /// Raw HWC u8 array.
    Array(Array3<u8>),
    /// List of image paths.
    ImageList(Vec<PathBuf>),
    /// Directory containing images.
    Directory(PathBuf),
    /// Glob pattern for images.
    Glob(String),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_) | Self::ImageBuffer(_) | Self::Array(_))
    }

    /// Check if this source is a directory, glob pattern or list.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(
            self,
            Self::Directory(_) | Self::Glob(_) | Self::ImageList(_)
        )
    }

    /// Get the path if this source has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Image(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            return Self::Directory(path);
        }

        Self::Image(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<Vec<PathBuf>> for Source {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::ImageList(paths)
    }
}

impl From<DynamicImage> for Source {
    fn from(img: DynamicImage) -> Self {
        Self::ImageBuffer(img)
    }
}

impl From<Array3<u8>> for Source {
    fn from(arr: Array3<u8>) -> Self {
        Self::Array(arr)
    }
}

/// Metadata about a source image.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Position of the image within the source.
    pub index: usize,
    /// Number of images in the source.
    pub total: usize,
    /// Source path; empty for in-memory images.
    pub path: String,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            index: 0,
            total: 1,
            path: String::new(),
        }
    }
}

/// Load an image from disk.
///
/// JPEG files are decoded with `jpeg-decoder` first, falling back to the
/// `image` crate for everything else or when that decoder fails.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_lowercase().as_str(), "jpg" | "jpeg"));

    if is_jpeg && let Some(img) = decode_jpeg(path) {
        return Ok(img);
    }

    image::open(path)
        .map_err(|e| InferenceError::ImageError(format!("Failed to load {}: {e}", path.display())))
}

fn decode_jpeg(path: &Path) -> Option<DynamicImage> {
    let file = File::open(path).ok()?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    let pixels = decoder.decode().ok()?;
    let info = decoder.info()?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));

    match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => {
            image::RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        jpeg_decoder::PixelFormat::L8 => {
            image::GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}

/// Check if a path is an image file based on extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Iterator over images from a source.
pub struct SourceIterator {
    source: Source,
    current: usize,
    image_paths: Vec<PathBuf>,
}

impl SourceIterator {
    /// Create a new source iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or glob cannot be listed.
    pub fn new(source: Source) -> Result<Self> {
        let image_paths = match &source {
            Source::Directory(path) => collect_images_from_dir(path)?,
            Source::Glob(pattern) => collect_images_from_glob(pattern)?,
            Source::Image(path) => vec![path.clone()],
            Source::ImageList(paths) => paths.clone(),
            Source::ImageBuffer(_) | Source::Array(_) => Vec::new(),
        };

        Ok(Self {
            source,
            current: 0,
            image_paths,
        })
    }

    /// Number of images this iterator yields in total.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.source {
            Source::ImageBuffer(_) | Source::Array(_) => 1,
            _ => self.image_paths.len(),
        }
    }

    /// Whether the source holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_path(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let path = self.image_paths.get(self.current)?;
        let meta = SourceMeta {
            index: self.current,
            total: self.image_paths.len(),
            path: path.to_string_lossy().to_string(),
        };
        self.current += 1;

        Some(load_image(path).map(|img| (img, meta)))
    }

    fn next_in_memory(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        if self.current > 0 {
            return None;
        }
        self.current = 1;

        let img = match &self.source {
            Source::ImageBuffer(img) => Ok(img.clone()),
            Source::Array(arr) => array_to_image(arr),
            _ => return None,
        };
        Some(img.map(|img| (img, SourceMeta::default())))
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.source {
            Source::ImageBuffer(_) | Source::Array(_) => self.next_in_memory(),
            _ => self.next_path(),
        }
    }
}

/// Collect image paths from a directory, sorted by name.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InferenceError::ImageError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Collect image paths from a glob pattern.
///
/// A single `*` in the file name is supported (`dir/*.png`, `dir/page-*`,
/// `scan*.jpg`); the directory part is taken literally.
fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some(star_pos) = pattern.find('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };

    let (dir, name_pattern) = match pattern[..star_pos].rfind(['/', '\\']) {
        Some(0) => (Path::new("/"), &pattern[1..]),
        Some(sep) => (Path::new(&pattern[..sep]), &pattern[sep + 1..]),
        None => (Path::new("."), pattern),
    };
    let (prefix, suffix) = name_pattern.split_once('*').unwrap_or((name_pattern, ""));
    let suffix = suffix.to_lowercase();

    if !dir.is_dir() {
        return Err(InferenceError::ImageError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name().is_some_and(|name| {
                let name = name.to_string_lossy();
                name.len() >= prefix.len() + suffix.len()
                    && name.starts_with(prefix)
                    && name.to_lowercase().ends_with(&suffix)
            }) && is_image_file(path)
        })
        .collect();

    paths.sort();
    Ok(paths)
}
