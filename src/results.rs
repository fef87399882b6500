// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Result records for orientation inference.
//!
//! A [`Results`] holds one image's class probabilities together with the
//! source image, and knows how to print itself, draw itself onto the image
//! and serialize itself as JSON.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};
use crate::io::{SaveKind, ensure_parent_dir, resolve_save_path};

/// Timing information for inference operations (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    ///
    /// # Arguments
    ///
    /// * `preprocess` - Time in milliseconds.
    /// * `inference` - Time in milliseconds.
    /// * `postprocess` - Time in milliseconds.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Get total inference time in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// Class probabilities of one image.
#[derive(Debug, Clone)]
pub struct Probs {
    /// Probability data with shape (`num_classes`,).
    pub data: Array1<f32>,
}

impl Probs {
    /// Create a new Probs instance.
    #[must_use]
    pub const fn new(data: Array1<f32>) -> Self {
        Self { data }
    }

    /// Get the index of the top-1 class.
    #[must_use]
    pub fn top1(&self) -> usize {
        self.top_k(1).first().copied().unwrap_or(0)
    }

    /// Get the indices of the top-k classes, highest probability first.
    ///
    /// Ties keep the lower class index first. `k` larger than the number of
    /// classes returns every class.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.data.len()).collect();
        indices.sort_by(|&a, &b| self.data[b].total_cmp(&self.data[a]));
        indices.truncate(k);
        indices
    }

    /// Get the confidence of the top-1 class.
    #[must_use]
    pub fn top1conf(&self) -> f32 {
        self.data.get(self.top1()).copied().unwrap_or(0.0)
    }

    /// Get the confidences of the top-k classes.
    #[must_use]
    pub fn top_k_conf(&self, k: usize) -> Vec<f32> {
        self.top_k(k).iter().map(|&i| self.data[i]).collect()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no class scores.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Serializable body of a result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Path of the input image.
    pub input_path: String,
    /// Page index for multi-page inputs; `None` for still images.
    pub page_index: Option<usize>,
    /// Top-k class IDs, highest score first.
    pub class_ids: Vec<usize>,
    /// Scores matching `class_ids`.
    pub scores: Vec<f32>,
    /// Labels matching `class_ids`.
    pub label_names: Vec<String>,
}

/// JSON document written by [`Results::save_to_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The record body.
    pub res: ResultPayload,
}

/// Orientation classification result for a single image.
#[derive(Debug, Clone)]
pub struct Results {
    /// Original image as HWC array (height, width, channels).
    pub orig_img: Array3<u8>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Path of the input image.
    pub input_path: String,
    /// Page index for multi-page inputs.
    pub page_index: Option<usize>,
    /// Class probabilities.
    pub probs: Probs,
    /// Number of classes reported.
    pub topk: usize,
    /// Class ID to label mapping.
    pub names: HashMap<usize, String>,
    /// Inference timing information.
    pub speed: Speed,
}

impl Results {
    /// Create a new Results instance.
    ///
    /// # Arguments
    ///
    /// * `orig_img` - Original image as HWC array.
    /// * `input_path` - Path of the source image.
    /// * `probs` - Class probabilities.
    /// * `names` - Map of class IDs to labels.
    /// * `topk` - Number of classes to report.
    /// * `speed` - Timing information.
    #[must_use]
    pub fn new(
        orig_img: Array3<u8>,
        input_path: String,
        probs: Probs,
        names: HashMap<usize, String>,
        topk: usize,
        speed: Speed,
    ) -> Self {
        let shape = orig_img.shape();
        #[allow(clippy::cast_possible_truncation)]
        let orig_shape = (shape[0] as u32, shape[1] as u32);

        Self {
            orig_img,
            orig_shape,
            input_path,
            page_index: None,
            probs,
            topk,
            names,
            speed,
        }
    }

    /// Top-k class IDs, highest score first.
    #[must_use]
    pub fn class_ids(&self) -> Vec<usize> {
        self.probs.top_k(self.topk)
    }

    /// Scores of [`Self::class_ids`].
    #[must_use]
    pub fn scores(&self) -> Vec<f32> {
        self.probs.top_k_conf(self.topk)
    }

    /// Labels of [`Self::class_ids`]. Unknown IDs fall back to their number.
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        self.class_ids()
            .iter()
            .map(|&i| self.label(i))
            .collect()
    }

    fn label(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    /// Short log string, e.g. `"180 0.98, "`.
    #[must_use]
    pub fn verbose(&self) -> String {
        if self.probs.is_empty() {
            return "(no prediction), ".to_string();
        }
        let parts: Vec<String> = self
            .label_names()
            .iter()
            .zip(self.scores())
            .map(|(label, score)| format!("{label} {score:.2}"))
            .collect();
        format!("{}, ", parts.join(", "))
    }

    /// Serializable form of this result.
    #[must_use]
    pub fn to_record(&self) -> ResultRecord {
        ResultRecord {
            res: ResultPayload {
                input_path: self.input_path.clone(),
                page_index: self.page_index,
                class_ids: self.class_ids(),
                scores: self.scores(),
                label_names: self.label_names(),
            },
        }
    }

    /// Text written by [`Self::print`].
    ///
    /// `json_format = true` renders the pretty JSON record; otherwise one
    /// `key: value` line per field.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, json_format: bool) -> Result<String> {
        let record = self.to_record();
        if json_format {
            return Ok(serde_json::to_string_pretty(&record)?);
        }

        let res = record.res;
        let page_index = res
            .page_index
            .map_or_else(|| "None".to_string(), |i| i.to_string());
        let scores: Vec<String> = res.scores.iter().map(|s| format!("{s:.4}")).collect();
        Ok(format!(
            "input_path: {}\npage_index: {page_index}\nclass_ids: {:?}\nscores: [{}]\nlabel_names: {:?}",
            res.input_path,
            res.class_ids,
            scores.join(", "),
            res.label_names
        ))
    }

    /// Print the result to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing to stdout fails.
    pub fn print(&self, json_format: bool) -> Result<()> {
        let text = self.render(json_format)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")?;
        Ok(())
    }

    /// Write the JSON record.
    ///
    /// `path` is resolved with [`resolve_save_path`]: a `.json` path is used
    /// as is, anything else is treated as a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_json(&self, path: &str) -> Result<PathBuf> {
        let target = resolve_save_path(path, &self.input_path, SaveKind::Json);
        ensure_parent_dir(&target)?;

        let file = File::create(&target).map_err(|e| {
            InferenceError::IoError(format!("Failed to create {}: {e}", target.display()))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.to_record())?;
        writer.flush()?;
        Ok(target)
    }

    /// Write the annotated image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or written.
    #[cfg(feature = "annotate")]
    pub fn save_to_img(&self, path: &str) -> Result<PathBuf> {
        let target = resolve_save_path(path, &self.input_path, SaveKind::Image);
        ensure_parent_dir(&target)?;

        let img = crate::utils::array_to_image(&self.orig_img)?;
        let annotated = crate::annotate::annotate_image(&img, self);
        annotated.save(&target).map_err(|e| {
            InferenceError::ImageError(format!("Failed to save {}: {e}", target.display()))
        })?;
        Ok(target)
    }

    /// Write the annotated image.
    ///
    /// # Errors
    ///
    /// Always fails: drawing requires the `annotate` feature.
    #[cfg(not(feature = "annotate"))]
    pub fn save_to_img(&self, path: &str) -> Result<PathBuf> {
        Err(InferenceError::FeatureNotEnabled(format!(
            "saving an annotated image to '{path}' requires the 'annotate' feature"
        )))
    }
}
