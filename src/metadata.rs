// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model configuration parsing.
//!
//! PP-LCNet orientation models are exported together with an `inference.yml`
//! describing the preprocessing pipeline and the label list. This module reads
//! that file when it is present and falls back to the task defaults otherwise.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{InferenceError, Result};
use crate::task::{ResizeMode, Task};

/// ImageNet channel means (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// File names probed next to a model for its configuration.
const CONFIG_FILE_NAMES: [&str; 2] = ["inference.yml", "inference.yaml"];

/// Preprocessing and label configuration of an orientation model.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model name (e.g., `PP-LCNet_x1_0_doc_ori`).
    pub model_name: String,
    /// The task this model performs.
    pub task: Task,
    /// Resize step applied before cropping.
    pub resize: ResizeMode,
    /// Center crop as (width, height), if any.
    pub crop: Option<(u32, u32)>,
    /// Multiplier applied to raw `u8` pixel values.
    pub scale: f32,
    /// Per-channel mean subtracted after scaling.
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided after mean subtraction.
    pub std: [f32; 3],
    /// Number of predictions the model was configured to report.
    pub topk: usize,
    /// Class ID to label mapping.
    pub names: HashMap<usize, String>,
}

impl ModelMetadata {
    /// Default metadata for a task.
    #[must_use]
    pub fn for_task(task: Task) -> Self {
        let names = task
            .default_labels()
            .iter()
            .enumerate()
            .map(|(i, label)| (i, (*label).to_string()))
            .collect();

        Self {
            model_name: String::new(),
            task,
            resize: task.default_resize(),
            crop: task.default_crop(),
            scale: 1.0 / 255.0,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            topk: 1,
            names,
        }
    }

    /// Load metadata for a model file.
    ///
    /// A `<stem>.yml` (or `.yaml`) sibling always wins. A shared
    /// `inference.yml` in the model's directory is used only for the nested
    /// layout (`<name>/inference.onnx`) or when its `Global.model_name`
    /// equals the file stem. Otherwise the task defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be read or parsed.
    pub fn load_for_model(model_path: &Path, task: Option<Task>) -> Result<Self> {
        let stem = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Some(yaml) = Self::read_config_file(model_path, &stem)? {
            let mut metadata = Self::from_yaml_str(&yaml, task)?;
            if metadata.model_name.is_empty() {
                metadata.model_name = stem;
            }
            return Ok(metadata);
        }

        let mut metadata = Self::for_task(task.unwrap_or_else(|| Task::from_model_name(&stem)));
        metadata.model_name = stem;
        Ok(metadata)
    }

    /// Read the configuration file belonging to a model file, if any.
    fn read_config_file(model_path: &Path, stem: &str) -> Result<Option<String>> {
        for ext in ["yml", "yaml"] {
            let own = model_path.with_extension(ext);
            if own.is_file() {
                return read_config(&own).map(Some);
            }
        }

        let Some(dir) = model_path.parent() else {
            return Ok(None);
        };
        for name in CONFIG_FILE_NAMES {
            let shared = dir.join(name);
            if !shared.is_file() {
                continue;
            }
            let yaml = read_config(&shared)?;
            if stem == "inference" || find_model_name(&yaml).as_deref() == Some(stem) {
                return Ok(Some(yaml));
            }
            crate::verbose!(
                "Ignoring {}: it describes another model than '{stem}'",
                shared.display()
            );
        }
        Ok(None)
    }

    /// Parse metadata from an `inference.yml` string.
    ///
    /// The file is read line by line; only the keys that influence
    /// preprocessing and labelling are interpreted.
    ///
    /// # Arguments
    ///
    /// * `yaml_str` - The YAML-formatted configuration.
    /// * `task` - Task to assume. When `None` it is guessed from `Global.model_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognised key carries a malformed value.
    pub fn from_yaml_str(yaml_str: &str, task: Option<Task>) -> Result<Self> {
        let model_name = find_model_name(yaml_str).unwrap_or_default();
        let mut metadata =
            Self::for_task(task.unwrap_or_else(|| Task::from_model_name(&model_name)));
        metadata.model_name = model_name;

        let lines: Vec<&str> = yaml_str.lines().collect();
        let mut section = String::new();
        let mut op = String::new();
        let mut i = 0;

        while i < lines.len() {
            let raw = strip_comment(lines[i]);
            i += 1;

            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let indent = raw.len() - raw.trim_start().len();
            if indent == 0 {
                section = trimmed
                    .split_once(':')
                    .map_or(trimmed, |(key, _)| key)
                    .trim()
                    .to_string();
                op.clear();
                continue;
            }

            // "- ResizeImage:" opens a preprocessing operator
            let (body, is_item) = trimmed
                .strip_prefix("- ")
                .map_or((trimmed, false), |rest| (rest.trim(), true));

            let Some((key, value)) = body.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if is_item {
                op = key.to_string();
                continue;
            }

            if value.is_empty() {
                if next_is_list_item(&lines, i) {
                    let (items, next) = collect_list(&lines, i);
                    i = next;
                    metadata.apply(&section, &op, key, &items)?;
                } else {
                    // Mapping header such as "Topk:"
                    op = key.to_string();
                }
                continue;
            }

            metadata.apply(&section, &op, key, &parse_values(value))?;
        }

        Ok(metadata)
    }

    /// Apply one key/value pair found under `section` and operator `op`.
    fn apply(&mut self, section: &str, op: &str, key: &str, values: &[String]) -> Result<()> {
        match (section, op, key) {
            ("PreProcess", "ResizeImage", "resize_short") => {
                self.resize = ResizeMode::ShortSide(parse_u32(key, values)?);
            }
            ("PreProcess", "ResizeImage", "size") => {
                let (w, h) = parse_size(key, values)?;
                self.resize = ResizeMode::Fixed(w, h);
            }
            ("PreProcess", "CropImage", "size") => {
                self.crop = Some(parse_size(key, values)?);
            }
            ("PreProcess", "NormalizeImage", "scale") => {
                self.scale = parse_f32(key, first(key, values)?)?;
            }
            ("PreProcess", "NormalizeImage", "mean") => {
                self.mean = parse_triplet(key, values)?;
            }
            ("PreProcess", "NormalizeImage", "std") => {
                self.std = parse_triplet(key, values)?;
            }
            ("PostProcess", _, "topk") => {
                self.topk = parse_u32(key, values)? as usize;
            }
            ("PostProcess", _, "label_list") => {
                self.names = values.iter().cloned().enumerate().collect();
            }
            _ => {}
        }
        Ok(())
    }

    /// Network input size as (height, width) after resize and crop.
    #[must_use]
    pub const fn input_size(&self) -> (usize, usize) {
        match (self.crop, self.resize) {
            (Some((w, h)), _) | (None, ResizeMode::Fixed(w, h)) => (h as usize, w as usize),
            (None, ResizeMode::ShortSide(s)) => (s as usize, s as usize),
        }
    }

    /// Get the number of classes in this model.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Get a class label by ID.
    #[must_use]
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::for_task(Task::default())
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        InferenceError::MetadataError(format!("Failed to read {}: {e}", path.display()))
    })
}

/// Drop a trailing `# comment` that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match (c, in_quote) {
            ('\'' | '"', None) => in_quote = Some(c),
            (q, Some(open)) if q == open => in_quote = None,
            ('#', None) => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Find `model_name:` anywhere in the document.
fn find_model_name(yaml_str: &str) -> Option<String> {
    yaml_str.lines().find_map(|line| {
        let (key, value) = strip_comment(line).trim().split_once(':')?;
        (key.trim() == "model_name").then(|| unquote(value.trim()).to_string())
    })
}

/// Whether the next non-empty line is a plain list item (`- value`).
fn next_is_list_item(lines: &[&str], start: usize) -> bool {
    lines[start..]
        .iter()
        .map(|l| strip_comment(l).trim())
        .find(|l| !l.is_empty())
        .and_then(|l| l.strip_prefix('-'))
        .is_some_and(|rest| !rest.contains(':'))
}

/// Collect consecutive `- value` lines, returning the values and the index after them.
fn collect_list(lines: &[&str], start: usize) -> (Vec<String>, usize) {
    let mut items = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let trimmed = strip_comment(lines[i]).trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        match trimmed.strip_prefix('-') {
            Some(rest) if !rest.contains(':') => {
                items.push(unquote(rest.trim()).to_string());
                i += 1;
            }
            _ => break,
        }
    }
    (items, i)
}

/// Split a scalar or inline list (`[a, b]`) into unquoted items.
fn parse_values(value: &str) -> Vec<String> {
    value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .map_or_else(
            || vec![unquote(value).to_string()],
            |inner| {
                inner
                    .split(',')
                    .map(|s| unquote(s.trim()).to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            },
        )
}

fn unquote(s: &str) -> &str {
    s.trim_matches('\'').trim_matches('"')
}

fn first<'a>(key: &str, values: &'a [String]) -> Result<&'a str> {
    values
        .first()
        .map(String::as_str)
        .ok_or_else(|| InferenceError::MetadataError(format!("Missing value for '{key}'")))
}

/// Parse a float, accepting fractions such as `1./255.`.
fn parse_f32(key: &str, value: &str) -> Result<f32> {
    let invalid = || InferenceError::MetadataError(format!("Invalid {key} value: {value}"));
    if let Some((num, den)) = value.split_once('/') {
        let num: f32 = num.trim().parse().map_err(|_| invalid())?;
        let den: f32 = den.trim().parse().map_err(|_| invalid())?;
        if den == 0.0 {
            return Err(invalid());
        }
        return Ok(num / den);
    }
    value.parse().map_err(|_| invalid())
}

fn parse_u32(key: &str, values: &[String]) -> Result<u32> {
    let value = first(key, values)?;
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(InferenceError::MetadataError(format!(
            "Invalid {key} value: {value}"
        ))),
    }
}

/// Parse `size: N` or `size: [W, H]` into (width, height).
fn parse_size(key: &str, values: &[String]) -> Result<(u32, u32)> {
    match values {
        [single] => {
            let v = parse_u32(key, std::slice::from_ref(single))?;
            Ok((v, v))
        }
        [w, h] => Ok((
            parse_u32(key, std::slice::from_ref(w))?,
            parse_u32(key, std::slice::from_ref(h))?,
        )),
        _ => Err(InferenceError::MetadataError(format!(
            "Invalid {key} value: expected 1 or 2 integers, got {values:?}"
        ))),
    }
}

fn parse_triplet(key: &str, values: &[String]) -> Result<[f32; 3]> {
    if values.len() != 3 {
        return Err(InferenceError::MetadataError(format!(
            "Invalid {key} value: expected 3 numbers, got {}",
            values.len()
        )));
    }
    Ok([
        parse_f32(key, &values[0])?,
        parse_f32(key, &values[1])?,
        parse_f32(key, &values[2])?,
    ])
}
