// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Orientation model loading and inference.
//!
//! This module provides [`OrientationModel`], which wraps an ONNX Runtime
//! session for a PP-LCNet orientation classifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "directml")]
use ort::execution_providers::DirectMLExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;

use crate::batch::{BatchRunner, PredictionIter};
use crate::device::Device;
use crate::error::{InferenceError, Result};
use crate::inference::InferenceConfig;
use crate::metadata::ModelMetadata;
use crate::postprocessing::postprocess;
use crate::preprocessing::{preprocess_batch, preprocess_image};
use crate::results::{Results, Speed};
use crate::source::{Source, SourceIterator, load_image};
use crate::task::Task;
use crate::utils::image_to_array;

/// Document / text line orientation classifier.
///
/// # Example
///
/// ```no_run
/// use docori_inference::OrientationModel;
///
/// let mut model = OrientationModel::load("models/PP-LCNet_x1_0_doc_ori.onnx")?;
/// let result = model.predict("page.png")?;
/// println!("{}", result.verbose());
/// # Ok::<(), docori_inference::InferenceError>(())
/// ```
pub struct OrientationModel {
    /// ONNX Runtime session.
    session: Session,
    /// Preprocessing and label configuration.
    metadata: ModelMetadata,
    /// Input tensor name.
    input_name: String,
    /// Output tensor names.
    output_names: Vec<String>,
    /// Inference configuration.
    config: InferenceConfig,
    /// File the session was loaded from.
    model_path: PathBuf,
    /// Whether model has been warmed up.
    warmed_up: bool,
}

impl OrientationModel {
    /// Load a model from an ONNX file with default configuration.
    ///
    /// Preprocessing settings and labels come from an `inference.yml` next to
    /// the file when present, otherwise from the task guessed from the file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file doesn't exist or can't be loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, InferenceConfig::default())
    }

    /// Load a model with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file doesn't exist or can't be loaded.
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let metadata = ModelMetadata::load_for_model(path, None)?;
        Self::from_parts(path, metadata, config)
    }

    /// Load a model whose identifier is known, e.g. from the registry.
    ///
    /// The identifier decides the task and becomes the reported model name,
    /// so files laid out as `<name>/inference.onnx` are classified correctly.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file doesn't exist or can't be loaded.
    pub fn load_named<P: AsRef<Path>>(name: &str, path: P, config: InferenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut metadata = ModelMetadata::load_for_model(path, Some(Task::from_model_name(name)))?;
        metadata.model_name = name.to_string();
        Self::from_parts(path, metadata, config)
    }

    fn from_parts(path: &Path, metadata: ModelMetadata, config: InferenceConfig) -> Result<Self> {
        if !path.exists() {
            return Err(InferenceError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let builder = Session::builder().map_err(|e| {
            InferenceError::ModelLoadError(format!("Failed to create session builder: {e}"))
        })?;
        let builder = register_device(builder, config.device.as_ref().unwrap_or(&Device::Cpu))?;

        let session = builder
            // Level3 enables all graph optimizations
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                InferenceError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(config.num_threads)
            .map_err(|e| {
                InferenceError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| {
                InferenceError::ModelLoadError(format!(
                    "Failed to load model {}: {e}",
                    path.display()
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "x".to_string(), |i| i.name.clone());
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(InferenceError::ModelLoadError(format!(
                "Model {} has no outputs",
                path.display()
            )));
        }

        Ok(Self {
            session,
            metadata,
            input_name,
            output_names,
            config,
            model_path: path.to_path_buf(),
            warmed_up: false,
        })
    }

    /// Warm up the model by running inference with a dummy input.
    ///
    /// Called automatically before the first prediction.
    ///
    /// # Errors
    ///
    /// Returns an error if the dummy inference fails.
    pub fn warmup(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }

        let (h, w) = self.metadata.input_size();
        let dummy_input = Array4::<f32>::zeros((1, 3, h, w));
        let _ = self.run_inference(&dummy_input)?;

        self.warmed_up = true;
        Ok(())
    }

    /// Classify one image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the image can't be loaded or inference fails.
    pub fn predict<P: AsRef<Path>>(&mut self, path: P) -> Result<Results> {
        let path = path.as_ref();
        let img = load_image(path)?;
        self.predict_image(&img, path.to_string_lossy().to_string())
    }

    /// Classify a decoded image.
    ///
    /// # Arguments
    ///
    /// * `image` - The image to classify.
    /// * `path` - Path or identifier recorded in the result.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn predict_image(&mut self, image: &DynamicImage, path: String) -> Result<Results> {
        if !self.warmed_up {
            self.warmup()?;
        }

        let start_preprocess = Instant::now();
        let preprocessed = preprocess_image(image, &self.metadata)?;
        let orig_img = image_to_array(image)?;
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let start_inference = Instant::now();
        let (output_data, output_shape) = self.run_inference(&preprocessed.tensor)?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let probs = postprocess(&output_data, &output_shape, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                InferenceError::PostProcessingError("Model produced no scores".to_string())
            })?;
        let postprocess_time = start_postprocess.elapsed().as_secs_f64() * 1000.0;

        Ok(Results::new(
            orig_img,
            path,
            probs,
            self.metadata.names.clone(),
            self.topk(),
            Speed::new(preprocess_time, inference_time, postprocess_time),
        ))
    }

    /// Classify several images in one forward pass.
    ///
    /// # Arguments
    ///
    /// * `images` - Images to classify.
    /// * `paths` - One path or identifier per image.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs don't line up, preprocessing fails or
    /// the session rejects the batch (e.g. a model exported with batch 1).
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_batch(&mut self, images: &[DynamicImage], paths: &[String]) -> Result<Vec<Results>> {
        if images.len() != paths.len() {
            return Err(InferenceError::ConfigError(format!(
                "Got {} images but {} paths",
                images.len(),
                paths.len()
            )));
        }
        if images.is_empty() {
            return Ok(Vec::new());
        }
        if !self.warmed_up {
            self.warmup()?;
        }

        let n = images.len();
        let start_preprocess = Instant::now();
        let tensor = preprocess_batch(images, &self.metadata)?;
        let orig_imgs = images
            .iter()
            .map(image_to_array)
            .collect::<Result<Vec<_>>>()?;
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let start_inference = Instant::now();
        let (output_data, output_shape) = self.run_inference(&tensor)?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let probs = postprocess(&output_data, &output_shape, n)?;
        let postprocess_time = start_postprocess.elapsed().as_secs_f64() * 1000.0;

        let per_image = n as f64;
        let speed = Speed::new(
            preprocess_time / per_image,
            inference_time / per_image,
            postprocess_time / per_image,
        );
        let topk = self.topk();

        Ok(orig_imgs
            .into_iter()
            .zip(paths)
            .zip(probs)
            .map(|((orig_img, path), probs)| {
                Results::new(
                    orig_img,
                    path.clone(),
                    probs,
                    self.metadata.names.clone(),
                    topk,
                    speed.clone(),
                )
            })
            .collect())
    }

    /// Lazily classify every image of a source in groups of `batch_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size` is 0 or the source cannot be opened.
    pub fn predict_source(&mut self, source: Source, batch_size: usize) -> Result<PredictionIter<'_, Self>> {
        if batch_size == 0 {
            return Err(InferenceError::ConfigError(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let iter = SourceIterator::new(source)?;
        Ok(PredictionIter::new(self, iter, batch_size))
    }

    /// Run the ONNX model inference.
    fn run_inference(&mut self, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input_contiguous = input.as_standard_layout();

        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            InferenceError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| InferenceError::InferenceError(format!("Inference failed: {e}")))?;

        let output_name = self.output_names[0].as_str();
        let output = outputs.get(output_name).ok_or_else(|| {
            InferenceError::InferenceError(format!("Output '{output_name}' not found"))
        })?;

        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
            InferenceError::InferenceError(format!("Failed to extract output: {e}"))
        })?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let shape_vec: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        Ok((data.to_vec(), shape_vec))
    }

    /// Number of classes each result reports.
    #[must_use]
    pub fn topk(&self) -> usize {
        self.config.topk.unwrap_or(self.metadata.topk).max(1)
    }

    /// Get the model's task type.
    #[must_use]
    pub const fn task(&self) -> Task {
        self.metadata.task
    }

    /// Get the model's class labels.
    #[must_use]
    pub const fn names(&self) -> &HashMap<usize, String> {
        &self.metadata.names
    }

    /// Get the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.metadata.num_classes()
    }

    /// Network input size as (height, width).
    #[must_use]
    pub const fn input_size(&self) -> (usize, usize) {
        self.metadata.input_size()
    }

    /// Get the model metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Get the inference configuration.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Model identifier, e.g. `PP-LCNet_x1_0_doc_ori`.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.metadata.model_name
    }

    /// File the model was loaded from.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl BatchRunner for OrientationModel {
    fn run_batch(&mut self, images: &[DynamicImage], paths: &[String]) -> Result<Vec<Results>> {
        self.predict_batch(images, paths)
    }

    fn run_single(&mut self, image: &DynamicImage, path: &str) -> Result<Results> {
        self.predict_image(image, path.to_string())
    }
}

impl std::fmt::Debug for OrientationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrientationModel")
            .field("model_name", &self.metadata.model_name)
            .field("task", &self.metadata.task)
            .field("num_classes", &self.metadata.num_classes())
            .field("input_size", &self.metadata.input_size())
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

/// Register the execution provider for `device` on a session builder.
fn register_device(builder: SessionBuilder, device: &Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        #[cfg(feature = "cuda")]
        Device::Cuda(id) => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(device_id(*id)?)
                .build()])
            .map_err(|e| ep_error(device, e)),
        #[cfg(feature = "tensorrt")]
        Device::TensorRt(id) => builder
            .with_execution_providers([TensorRTExecutionProvider::default()
                .with_device_id(device_id(*id)?)
                .build()])
            .map_err(|e| ep_error(device, e)),
        #[cfg(feature = "coreml")]
        Device::CoreMl => builder
            .with_execution_providers([CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .build()])
            .map_err(|e| ep_error(device, e)),
        #[cfg(feature = "directml")]
        Device::DirectMl(id) => builder
            .with_execution_providers([DirectMLExecutionProvider::default()
                .with_device_id(device_id(*id)?)
                .build()])
            .map_err(|e| ep_error(device, e)),
        #[allow(unreachable_patterns)]
        other => {
            Err(InferenceError::FeatureNotEnabled(format!(
                "device '{other}' requires building with the '{}' feature",
                other.feature().unwrap_or("cpu")
            )))
        }
    }
}

#[cfg(any(
    feature = "cuda",
    feature = "tensorrt",
    feature = "coreml",
    feature = "directml"
))]
fn ep_error(device: &Device, e: impl std::fmt::Display) -> InferenceError {
    InferenceError::ModelLoadError(format!("Failed to register {device}: {e}"))
}

#[cfg(any(feature = "cuda", feature = "tensorrt", feature = "directml"))]
fn device_id(index: usize) -> Result<i32> {
    i32::try_from(index)
        .map_err(|_| InferenceError::ConfigError(format!("Device index {index} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = OrientationModel::load("nonexistent.onnx");
        assert!(matches!(result.unwrap_err(), InferenceError::ModelLoadError(_)));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_without_feature_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        let config = InferenceConfig::new().with_device(Device::Cuda(0));
        let result = OrientationModel::load_with_config(&path, config);
        assert!(matches!(result.unwrap_err(), InferenceError::FeatureNotEnabled(_)));
    }

    #[test]
    #[ignore = "requires models/PP-LCNet_x1_0_doc_ori.onnx"]
    fn test_predict_real_model() {
        let mut model = OrientationModel::load_named(
            "PP-LCNet_x1_0_doc_ori",
            "models/PP-LCNet_x1_0_doc_ori.onnx",
            InferenceConfig::default(),
        )
        .unwrap();
        let img = DynamicImage::new_rgb8(600, 800);
        let result = model.predict_image(&img, "blank.png".to_string()).unwrap();
        assert_eq!(result.class_ids().len(), 1);
        assert_eq!(model.num_classes(), 4);
    }
}
