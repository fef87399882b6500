// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing of classifier output.
//!
//! Turns the raw `[N, C]` output tensor into one [`Probs`] per image:
//! NaN scores are zeroed and logits are passed through softmax when the
//! row is not already a probability distribution.

use ndarray::Array1;

use crate::error::{InferenceError, Result};
use crate::results::Probs;
use crate::utils::{is_probability_distribution, softmax};

/// Split a flat classifier output into per-image probability rows.
///
/// # Arguments
///
/// * `output` - Flat output data as returned by ONNX Runtime.
/// * `output_shape` - Shape of the output tensor, usually `[N, C]`.
/// * `batch` - Number of images that were fed into the session.
///
/// # Errors
///
/// Returns an error if the output size does not divide into `batch` rows.
pub fn postprocess(output: &[f32], output_shape: &[usize], batch: usize) -> Result<Vec<Probs>> {
    if batch == 0 {
        return Ok(Vec::new());
    }

    let num_classes = match output_shape {
        [n, rest @ ..] if !rest.is_empty() && *n == batch => rest.iter().product(),
        _ => output.len() / batch,
    };

    if num_classes == 0 || num_classes * batch != output.len() {
        return Err(InferenceError::PostProcessingError(format!(
            "Output of shape {output_shape:?} ({} values) cannot be split into {batch} rows",
            output.len()
        )));
    }

    Ok(output
        .chunks_exact(num_classes)
        .map(|row| Probs::new(Array1::from_vec(normalize_scores(row))))
        .collect())
}

/// Zero NaN values and apply softmax when the row holds logits.
#[must_use]
pub fn normalize_scores(raw: &[f32]) -> Vec<f32> {
    let scores: Vec<f32> = raw
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v })
        .collect();

    if is_probability_distribution(&scores) {
        scores
    } else {
        softmax(&scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postprocess_single_row_probabilities() {
        let output = [0.05, 0.05, 0.85, 0.05];
        let probs = postprocess(&output, &[1, 4], 1).unwrap();
        assert_eq!(probs.len(), 1);
        assert_eq!(probs[0].top1(), 2);
        assert!((probs[0].top1conf() - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_applies_softmax_to_logits() {
        let output = [2.0, 0.5, -1.0, 4.0];
        let probs = postprocess(&output, &[1, 4], 1).unwrap();
        let sum: f32 = probs[0].data.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(probs[0].top1(), 3);
    }

    #[test]
    fn test_postprocess_splits_batch_rows() {
        let output = [0.7, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.7];
        let probs = postprocess(&output, &[2, 4], 2).unwrap();
        assert_eq!(probs.len(), 2);
        assert_eq!(probs[0].top1(), 0);
        assert_eq!(probs[1].top1(), 3);
    }

    #[test]
    fn test_postprocess_accepts_trailing_unit_dims() {
        let output = [0.1, 0.9];
        let probs = postprocess(&output, &[1, 2, 1, 1], 1).unwrap();
        assert_eq!(probs[0].data.len(), 2);
    }

    #[test]
    fn test_postprocess_rejects_bad_shape() {
        let output = [0.1, 0.2, 0.7];
        assert!(postprocess(&output, &[3], 2).is_err());
        assert!(postprocess(&[], &[1, 0], 1).is_err());
        assert!(postprocess(&output, &[1, 3], 0).unwrap().is_empty());
    }

    #[test]
    fn test_nan_scores_handled() {
        let scores = normalize_scores(&[f32::NAN, 0.5, 0.5]);
        assert!(scores.iter().all(|v| v.is_finite()));
        assert!((scores[0]).abs() < 1e-6);
    }
}
