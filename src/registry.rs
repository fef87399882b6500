// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Known models and where to find them on disk.

use std::path::{Path, PathBuf};

use crate::download::{base_url_from_env, download_model};
use crate::driver::ModelLoader;
use crate::error::{InferenceError, Result};
use crate::inference::InferenceConfig;
use crate::model::OrientationModel;
use crate::task::Task;

/// Environment variable overriding the model directory.
pub const MODEL_DIR_ENV: &str = "DOCORI_MODEL_DIR";

/// A model the registry knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Model identifier.
    pub name: &'static str,
    /// Task the model performs.
    pub task: Task,
}

/// Every model identifier accepted by [`ModelRegistry`].
pub const KNOWN_MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "PP-LCNet_x1_0_doc_ori",
        task: Task::DocOrientation,
    },
    ModelSpec {
        name: "PP-LCNet_x0_25_textline_ori",
        task: Task::TextlineOrientation,
    },
    ModelSpec {
        name: "PP-LCNet_x1_0_textline_ori",
        task: Task::TextlineOrientation,
    },
];

/// Look up a model by identifier.
#[must_use]
pub fn find_spec(name: &str) -> Option<&'static ModelSpec> {
    KNOWN_MODELS.iter().find(|spec| spec.name == name)
}

/// Default model directory.
///
/// `DOCORI_MODEL_DIR`, then `<cache dir>/docori/models`, then `./models`.
#[must_use]
pub fn default_model_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(MODEL_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir().map_or_else(
        || PathBuf::from("models"),
        |cache| cache.join("docori").join("models"),
    )
}

/// Resolves model identifiers to loaded [`OrientationModel`]s.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    model_dir: PathBuf,
    base_url: Option<String>,
    config: InferenceConfig,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Registry using the default model directory and `DOCORI_MODEL_BASE_URL`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_dir: default_model_dir(),
            base_url: base_url_from_env(),
            config: InferenceConfig::default(),
        }
    }

    /// Use `dir` instead of the default model directory.
    #[must_use]
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    /// Download missing models from `base_url`. `None` disables downloading.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Configuration applied to every loaded model.
    #[must_use]
    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Directory models are looked up in.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Paths searched for a model, in order.
    #[must_use]
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        vec![
            self.model_dir.join(format!("{name}.onnx")),
            self.model_dir.join(name).join("inference.onnx"),
        ]
    }

    /// First existing candidate path for `name`.
    #[must_use]
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.candidates(name).into_iter().find(|p| p.is_file())
    }

    /// Find or download the `.onnx` file for an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::UnknownModel`] for identifiers outside the
    /// registry, and a load error when the file is missing and cannot be
    /// downloaded.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let Some(spec) = find_spec(name) else {
            let known: Vec<&str> = KNOWN_MODELS.iter().map(|s| s.name).collect();
            return Err(InferenceError::UnknownModel(format!(
                "'{name}', expected one of: {} or a path to an .onnx file",
                known.join(", ")
            )));
        };

        if let Some(path) = self.locate(spec.name) {
            return Ok(path);
        }

        if let Some(base_url) = &self.base_url {
            return download_model(base_url, spec.name, &self.model_dir);
        }

        let searched: Vec<String> = self
            .candidates(spec.name)
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Err(InferenceError::ModelLoadError(format!(
            "Model '{name}' not found (searched {}). Place the exported .onnx file there, \
             pass --model-dir, or set {} to download it",
            searched.join(", "),
            crate::download::MODEL_BASE_URL_ENV
        )))
    }
}

impl ModelLoader for ModelRegistry {
    type Model = OrientationModel;

    fn create_model(&self, name: &str) -> Result<OrientationModel> {
        let is_file = Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        if is_file {
            return OrientationModel::load_with_config(name, self.config.clone());
        }

        let path = self.resolve(name)?;
        crate::verbose!("Loading {name} from {}", path.display());
        OrientationModel::load_named(name, path, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &Path) -> ModelRegistry {
        ModelRegistry::new()
            .with_model_dir(dir)
            .with_base_url(None)
    }

    #[test]
    fn test_find_spec() {
        assert_eq!(
            find_spec("PP-LCNet_x1_0_doc_ori").map(|s| s.task),
            Some(Task::DocOrientation)
        );
        assert_eq!(
            find_spec("PP-LCNet_x0_25_textline_ori").map(|s| s.task),
            Some(Task::TextlineOrientation)
        );
        assert!(find_spec("PP-OCRv4_mobile_det").is_none());
    }

    #[test]
    fn test_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(dir.path()).resolve("PP-Foo").unwrap_err();
        assert!(matches!(err, InferenceError::UnknownModel(_)));
        assert!(err.to_string().contains("PP-LCNet_x1_0_doc_ori"));
    }

    #[test]
    fn test_missing_model_lists_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(dir.path())
            .resolve("PP-LCNet_x1_0_doc_ori")
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));
        assert!(err.to_string().contains("inference.onnx"));
    }

    #[test]
    fn test_locate_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());

        let nested = dir.path().join("PP-LCNet_x1_0_doc_ori");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("inference.onnx"), b"").unwrap();
        assert_eq!(
            reg.resolve("PP-LCNet_x1_0_doc_ori").unwrap(),
            nested.join("inference.onnx")
        );

        let flat = dir.path().join("PP-LCNet_x1_0_doc_ori.onnx");
        std::fs::write(&flat, b"").unwrap();
        assert_eq!(reg.resolve("PP-LCNet_x1_0_doc_ori").unwrap(), flat);
    }

    #[test]
    fn test_create_model_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(dir.path()).create_model("not-a-model").unwrap_err();
        assert!(matches!(err, InferenceError::UnknownModel(_)));
    }

    #[test]
    fn test_create_model_missing_onnx_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry(dir.path())
            .create_model("does/not/exist.onnx")
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));
    }
}
