// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end prediction run.
//!
//! [`run_driver`] loads a model by identifier, predicts once over the input
//! and, for every result, prints it and writes the annotated image and the
//! JSON record. The three traits below are the seams between the run and
//! the concrete model so the sequence can be exercised without ONNX Runtime.

use std::path::PathBuf;

use crate::error::Result;
use crate::model::OrientationModel;
use crate::results::Results;
use crate::source::Source;

/// Model used when none is given.
pub const DEFAULT_MODEL_NAME: &str = "PP-LCNet_x1_0_doc_ori";

/// Image classified when no input is given.
pub const DEFAULT_INPUT: &str = "experiments/onnx-demo/180-2.png";

/// Images per forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Where the annotated image is written.
pub const DEFAULT_IMG_OUTPUT: &str = "./output/demo.png";

/// Where the JSON record is written.
pub const DEFAULT_JSON_OUTPUT: &str = "./output/res.json";

/// One prediction result as seen by the driver.
pub trait PredictionRecord {
    /// Print the record to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    fn print(&self, json_format: bool) -> Result<()>;

    /// Write the annotated image to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be written.
    fn save_to_img(&self, path: &str) -> Result<()>;

    /// Write the JSON record to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save_to_json(&self, path: &str) -> Result<()>;
}

/// A loaded model that turns an input into a lazy sequence of records.
pub trait Predictor {
    /// Record type produced per image.
    type Record: PredictionRecord;

    /// Predict over `input` in groups of `batch_size` images.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be opened or `batch_size` is invalid.
    fn predict(
        &mut self,
        input: &str,
        batch_size: usize,
    ) -> Result<impl Iterator<Item = Result<Self::Record>> + '_>;
}

/// Resolves a model identifier to a ready predictor.
pub trait ModelLoader {
    /// Predictor type this loader produces.
    type Model: Predictor;

    /// Load the model named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is unknown or the model fails to load.
    fn create_model(&self, name: &str) -> Result<Self::Model>;
}

/// Settings of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Model identifier or `.onnx` path.
    pub model_name: String,
    /// Input image, directory or glob.
    pub input: String,
    /// Images per forward pass.
    pub batch_size: usize,
    /// Annotated image destination.
    pub img_output: String,
    /// JSON record destination.
    pub json_output: String,
    /// Print records as JSON instead of plain text.
    pub json_format: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            input: DEFAULT_INPUT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            img_output: DEFAULT_IMG_OUTPUT.to_string(),
            json_output: DEFAULT_JSON_OUTPUT.to_string(),
            json_format: false,
        }
    }
}

/// Run the load, predict, print and save sequence.
///
/// `predict` is called exactly once. Each record is printed, saved as an
/// image and saved as JSON, in that order, before the next record is
/// requested. The first error stops the run and is returned unchanged.
///
/// Returns the number of records handled.
///
/// # Errors
///
/// Returns the first error raised by the loader, the predictor or a record.
pub fn run_driver<L: ModelLoader>(loader: &L, config: &DriverConfig) -> Result<usize> {
    let mut model = loader.create_model(&config.model_name)?;
    let mut handled = 0;

    for record in model.predict(&config.input, config.batch_size)? {
        let record = record?;
        record.print(config.json_format)?;
        record.save_to_img(&config.img_output)?;
        record.save_to_json(&config.json_output)?;
        handled += 1;
    }

    Ok(handled)
}

impl PredictionRecord for Results {
    fn print(&self, json_format: bool) -> Result<()> {
        Self::print(self, json_format)
    }

    fn save_to_img(&self, path: &str) -> Result<()> {
        let written: PathBuf = Self::save_to_img(self, path)?;
        crate::verbose!("Annotated image saved to {}", written.display());
        Ok(())
    }

    fn save_to_json(&self, path: &str) -> Result<()> {
        let written: PathBuf = Self::save_to_json(self, path)?;
        crate::verbose!("JSON record saved to {}", written.display());
        Ok(())
    }
}

impl Predictor for OrientationModel {
    type Record = Results;

    fn predict(
        &mut self,
        input: &str,
        batch_size: usize,
    ) -> Result<impl Iterator<Item = Result<Results>> + '_> {
        self.predict_source(Source::from(input), batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct StubRecord {
        id: usize,
        log: Log,
        fail_json: bool,
    }

    impl PredictionRecord for StubRecord {
        fn print(&self, json_format: bool) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("print:{}:{json_format}", self.id));
            Ok(())
        }

        fn save_to_img(&self, path: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("img:{}:{path}", self.id));
            Ok(())
        }

        fn save_to_json(&self, path: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("json:{}:{path}", self.id));
            if self.fail_json {
                return Err(InferenceError::IoError("disk full".to_string()));
            }
            Ok(())
        }
    }

    struct StubPredictor {
        records: usize,
        fail_json: bool,
        log: Log,
    }

    impl Predictor for StubPredictor {
        type Record = StubRecord;

        fn predict(
            &mut self,
            input: &str,
            batch_size: usize,
        ) -> Result<impl Iterator<Item = Result<StubRecord>> + '_> {
            self.log
                .borrow_mut()
                .push(format!("predict:{input}:{batch_size}"));
            let log = Rc::clone(&self.log);
            let fail_json = self.fail_json;
            Ok((0..self.records).map(move |id| {
                log.borrow_mut().push(format!("yield:{id}"));
                Ok::<_, InferenceError>(StubRecord {
                    id,
                    log: Rc::clone(&log),
                    fail_json,
                })
            }))
        }
    }

    struct StubLoader {
        records: usize,
        fail_json: bool,
        log: Log,
    }

    impl StubLoader {
        fn new(records: usize) -> Self {
            Self {
                records,
                fail_json: false,
                log: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    impl ModelLoader for StubLoader {
        type Model = StubPredictor;

        fn create_model(&self, name: &str) -> Result<StubPredictor> {
            self.log.borrow_mut().push(format!("load:{name}"));
            if name != DEFAULT_MODEL_NAME {
                return Err(InferenceError::UnknownModel(name.to_string()));
            }
            Ok(StubPredictor {
                records: self.records,
                fail_json: self.fail_json,
                log: Rc::clone(&self.log),
            })
        }
    }

    #[test]
    fn test_zero_records_is_success() {
        let loader = StubLoader::new(0);
        let handled = run_driver(&loader, &DriverConfig::default()).unwrap();
        assert_eq!(handled, 0);
        assert_eq!(
            loader.calls(),
            vec![
                "load:PP-LCNet_x1_0_doc_ori",
                "predict:experiments/onnx-demo/180-2.png:1"
            ]
        );
    }

    #[test]
    fn test_each_record_is_printed_then_saved() {
        let loader = StubLoader::new(2);
        let handled = run_driver(&loader, &DriverConfig::default()).unwrap();
        assert_eq!(handled, 2);

        let calls = loader.calls();
        assert_eq!(
            &calls[2..],
            &[
                "yield:0",
                "print:0:false",
                "img:0:./output/demo.png",
                "json:0:./output/res.json",
                "yield:1",
                "print:1:false",
                "img:1:./output/demo.png",
                "json:1:./output/res.json",
            ]
        );
    }

    #[test]
    fn test_predict_called_once_with_literals() {
        let loader = StubLoader::new(3);
        run_driver(&loader, &DriverConfig::default()).unwrap();
        let predicts: Vec<String> = loader
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("predict:"))
            .collect();
        assert_eq!(predicts, vec!["predict:experiments/onnx-demo/180-2.png:1"]);
    }

    #[test]
    fn test_unknown_model_propagates() {
        let loader = StubLoader::new(1);
        let config = DriverConfig {
            model_name: "PP-Unknown".to_string(),
            ..DriverConfig::default()
        };
        let err = run_driver(&loader, &config).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownModel(_)));
        assert_eq!(loader.calls(), vec!["load:PP-Unknown"]);
    }

    #[test]
    fn test_save_failure_stops_the_run() {
        let mut loader = StubLoader::new(3);
        loader.fail_json = true;
        let err = run_driver(&loader, &DriverConfig::default()).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(!loader.calls().iter().any(|c| c == "yield:1"));
    }

    #[test]
    fn test_default_config_uses_literals() {
        let config = DriverConfig::default();
        assert_eq!(config.model_name, "PP-LCNet_x1_0_doc_ori");
        assert_eq!(config.input, "experiments/onnx-demo/180-2.png");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.img_output, "./output/demo.png");
        assert_eq!(config.json_output, "./output/res.json");
        assert!(!config.json_format);
    }
}
