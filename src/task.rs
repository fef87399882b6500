// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Task definitions for orientation classifiers.
//!
//! Each task fixes the label set and the default preprocessing pipeline a
//! PP-LCNet orientation model was exported with.

use std::fmt;
use std::str::FromStr;

/// How an input image is brought to the network input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Scale so the shorter side equals the given length, keeping aspect ratio.
    ShortSide(u32),
    /// Resize to exactly (width, height), ignoring aspect ratio.
    Fixed(u32, u32),
}

/// Orientation classification tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Task {
    /// Whole-page orientation: 0, 90, 180 or 270 degrees.
    #[default]
    DocOrientation,
    /// Single text line orientation: upright or flipped.
    TextlineOrientation,
}

impl Task {
    /// Returns the string representation of the task.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DocOrientation => "doc_orientation",
            Self::TextlineOrientation => "textline_orientation",
        }
    }

    /// Default class labels in output index order.
    #[must_use]
    pub const fn default_labels(&self) -> &'static [&'static str] {
        match self {
            Self::DocOrientation => &["0", "90", "180", "270"],
            Self::TextlineOrientation => &["0_degree", "180_degree"],
        }
    }

    /// Default resize step.
    #[must_use]
    pub const fn default_resize(&self) -> ResizeMode {
        match self {
            Self::DocOrientation => ResizeMode::ShortSide(256),
            Self::TextlineOrientation => ResizeMode::Fixed(160, 80),
        }
    }

    /// Default center crop as (width, height), if the task crops.
    #[must_use]
    pub const fn default_crop(&self) -> Option<(u32, u32)> {
        match self {
            Self::DocOrientation => Some((224, 224)),
            Self::TextlineOrientation => None,
        }
    }

    /// Guess the task from a model identifier or file stem.
    ///
    /// Textline models carry `textline` in their name; everything else is
    /// treated as a whole-document classifier.
    #[must_use]
    pub fn from_model_name(name: &str) -> Self {
        if name.to_lowercase().contains("textline") {
            Self::TextlineOrientation
        } else {
            Self::DocOrientation
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Task {
    type Err = TaskParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "doc_orientation" | "doc_ori" | "document" => Ok(Self::DocOrientation),
            "textline_orientation" | "textline_ori" | "textline" => Ok(Self::TextlineOrientation),
            _ => Err(TaskParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid task string.
#[derive(Debug, Clone)]
pub struct TaskParseError(String);

impl fmt::Display for TaskParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid task '{}', expected one of: doc_orientation, textline_orientation",
            self.0
        )
    }
}

impl std::error::Error for TaskParseError {}
