// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Batch processing module.
//!
//! [`PredictionIter`] pulls images from a [`SourceIterator`] in groups of
//! `batch_size`, runs one forward pass per group and hands the results out
//! one at a time. Nothing is decoded or inferred before the caller asks for
//! the next result.

use std::collections::VecDeque;

use image::DynamicImage;

use crate::error::Result;
use crate::results::Results;
use crate::source::SourceIterator;

/// Something that can classify a group of images.
pub trait BatchRunner {
    /// Classify all `images` in one pass. `paths` holds one entry per image.
    ///
    /// # Errors
    ///
    /// Returns an error if the batched run fails.
    fn run_batch(&mut self, images: &[DynamicImage], paths: &[String]) -> Result<Vec<Results>>;

    /// Classify a single image.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn run_single(&mut self, image: &DynamicImage, path: &str) -> Result<Results>;
}

/// Lazy iterator over prediction results.
///
/// # Example
///
/// ```no_run
/// use docori_inference::{OrientationModel, Source};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut model = OrientationModel::load("PP-LCNet_x1_0_doc_ori.onnx")?;
///     for result in model.predict_source(Source::from("pages/"), 4)? {
///         println!("{}", result?.verbose());
///     }
///     Ok(())
/// }
/// ```
pub struct PredictionIter<'a, R: BatchRunner> {
    runner: &'a mut R,
    source: SourceIterator,
    batch_size: usize,
    pending: VecDeque<Result<Results>>,
    exhausted: bool,
}

impl<'a, R: BatchRunner> PredictionIter<'a, R> {
    /// Create a new iterator. `batch_size` is clamped to at least 1.
    pub fn new(runner: &'a mut R, source: SourceIterator, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            runner,
            source,
            batch_size,
            pending: VecDeque::with_capacity(batch_size),
            exhausted: false,
        }
    }

    /// Decode up to `batch_size` images and queue their results.
    fn fill(&mut self) {
        let mut images = Vec::with_capacity(self.batch_size);
        let mut paths = Vec::with_capacity(self.batch_size);
        let mut load_error = None;

        while images.len() < self.batch_size {
            match self.source.next() {
                Some(Ok((img, meta))) => {
                    images.push(img);
                    paths.push(meta.path);
                }
                Some(Err(e)) => {
                    load_error = Some(e);
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if !images.is_empty() {
            self.run(&images, &paths);
        }
        if let Some(e) = load_error {
            self.pending.push_back(Err(e));
        }
    }

    fn run(&mut self, images: &[DynamicImage], paths: &[String]) {
        if images.len() == 1 {
            self.pending
                .push_back(self.runner.run_single(&images[0], &paths[0]));
            return;
        }

        match self.runner.run_batch(images, paths) {
            Ok(results) => self.pending.extend(results.into_iter().map(Ok)),
            Err(e) => {
                crate::warn!(
                    "Batch inference failed ({e}). Falling back to single-image inference..."
                );
                for (img, path) in images.iter().zip(paths) {
                    self.pending.push_back(self.runner.run_single(img, path));
                }
            }
        }
    }
}

impl<R: BatchRunner> Iterator for PredictionIter<'_, R> {
    type Item = Result<Results>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() && !self.exhausted {
            self.fill();
        }
        self.pending.pop_front()
    }
}
