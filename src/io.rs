// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! I/O utilities for saving results.

use std::path::{Path, PathBuf};

use crate::error::{InferenceError, Result};

/// Image extensions accepted as explicit output file names.
pub const IMAGE_SAVE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Kind of artefact a result is saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Annotated image.
    Image,
    /// JSON record.
    Json,
}

impl SaveKind {
    /// Extension used when a file name has to be generated.
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Json => "json",
        }
    }

    fn accepts(self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        match self {
            Self::Image => IMAGE_SAVE_EXTENSIONS.contains(&ext.as_str()),
            Self::Json => ext == "json",
        }
    }
}

/// Decide where a result should be written.
///
/// A `path` whose extension fits `kind` is used as is. Anything else is
/// treated as a directory, and the file inside it is named after the
/// input: `<input stem>_res.<ext>`.
///
/// # Arguments
///
/// * `path` - Path requested by the caller.
/// * `input_path` - Path of the image the result belongs to.
/// * `kind` - Whether an image or a JSON file is being saved.
#[must_use]
pub fn resolve_save_path(path: &str, input_path: &str, kind: SaveKind) -> PathBuf {
    let requested = Path::new(path);
    let is_file = requested
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| kind.accepts(ext));

    if is_file {
        return requested.to_path_buf();
    }

    let stem = Path::new(input_path)
        .file_stem()
        .map_or_else(|| "result".to_string(), |s| s.to_string_lossy().to_string());
    requested.join(format!("{stem}_res.{}", kind.default_extension()))
}

/// Create the parent directory of `path` if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            InferenceError::IoError(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file_paths_are_kept() {
        assert_eq!(
            resolve_save_path("./output/demo.png", "a/b.jpg", SaveKind::Image),
            PathBuf::from("./output/demo.png")
        );
        assert_eq!(
            resolve_save_path("./output/res.json", "a/b.jpg", SaveKind::Json),
            PathBuf::from("./output/res.json")
        );
        assert_eq!(
            resolve_save_path("out/X.JPG", "b.jpg", SaveKind::Image),
            PathBuf::from("out/X.JPG")
        );
    }

    #[test]
    fn test_directory_paths_get_generated_names() {
        assert_eq!(
            resolve_save_path("./output", "imgs/180-2.png", SaveKind::Image),
            PathBuf::from("./output/180-2_res.png")
        );
        assert_eq!(
            resolve_save_path("./output/", "imgs/180-2.png", SaveKind::Json),
            PathBuf::from("./output/180-2_res.json")
        );
        // Wrong extension for the kind is treated as a directory name
        assert_eq!(
            resolve_save_path("out.png", "page.jpg", SaveKind::Json),
            PathBuf::from("out.png/page_res.json")
        );
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("res.json");
        ensure_parent_dir(&target).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
        ensure_parent_dir(Path::new("bare.json")).unwrap();
    }
}
