// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Document Orientation Inference
//!
//! Classifies whether a scanned page or text line is upright, using the
//! PaddleX `PP-LCNet` orientation models exported to ONNX and run through
//! ONNX Runtime.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use docori_inference::{ModelLoader, ModelRegistry, Source};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Finds PP-LCNet_x1_0_doc_ori.onnx (and its inference.yml) in the model directory
//!     let mut model = ModelRegistry::new().create_model("PP-LCNet_x1_0_doc_ori")?;
//!
//!     for result in model.predict_source(Source::from("scan.png"), 1)? {
//!         let result = result?;
//!         result.print(false)?;
//!         result.save_to_img("./output/demo.png")?;
//!         result.save_to_json("./output/res.json")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The same sequence is available as [`run_driver`], which the CLI uses.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Classify the bundled sample page with the default model
//! docori-inference predict
//!
//! # A directory of scans, four pages per forward pass
//! docori-inference predict --input scans/ --batch-size 4 --save-img out/ --save-json out/
//!
//! # Where each known model would be loaded from
//! docori-inference models
//!
//! # Grayscale entropy of a page
//! docori-inference entropy scan.png --sample-rate 4
//! ```
//!
//! ## Models
//!
//! | Identifier | Labels | Input |
//! |------------|--------|-------|
//! | `PP-LCNet_x1_0_doc_ori` | `0`, `90`, `180`, `270` | short side 256, center crop 224 |
//! | `PP-LCNet_x0_25_textline_ori` | `0_degree`, `180_degree` | 160×80 |
//! | `PP-LCNet_x1_0_textline_ori` | `0_degree`, `180_degree` | 160×80 |
//!
//! Model files are looked up in `DOCORI_MODEL_DIR`, then the user cache
//! directory. Set `DOCORI_MODEL_BASE_URL` to download missing ones.
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`driver`] | Load, predict, print and save sequence ([`run_driver`]) |
//! | [`registry`] | Known model identifiers and their files ([`ModelRegistry`]) |
//! | [`model`] | [`OrientationModel`] wrapping the ONNX Runtime session |
//! | [`results`] | [`Results`], [`Probs`] and the JSON record |
//! | [`metadata`] | Preprocessing and labels from `inference.yml` |
//! | [`source`] | Input images, directories and globs |
//! | [`entropy`] | Grayscale entropy of an image |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Annotated image output (default) |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `tensorrt` | NVIDIA `TensorRT` optimization |
//! | `coreml` | Apple `CoreML` (macOS/iOS) |
//! | `directml` | `DirectML` on Windows |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod batch;
pub mod cli;
pub mod device;
pub mod download;
pub mod driver;
pub mod entropy;
pub mod error;
pub mod inference;
pub mod io;
pub mod metadata;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod registry;
pub mod results;
pub mod source;
pub mod task;
pub mod utils;

// Re-export main types for convenience
pub use device::Device;
pub use driver::{DriverConfig, ModelLoader, PredictionRecord, Predictor, run_driver};
pub use error::{InferenceError, Result};
pub use inference::InferenceConfig;
pub use model::OrientationModel;
pub use registry::ModelRegistry;
pub use results::{Probs, ResultPayload, ResultRecord, Results, Speed};
pub use source::{Source, SourceIterator, SourceMeta};
pub use task::Task;

// Re-export metadata for advanced use
pub use metadata::ModelMetadata;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "docori-inference");
    }
}
