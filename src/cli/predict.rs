// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::Path;
use std::time::Instant;

use crate::cli::args::{EntropyArgs, ModelsArgs, PredictArgs};
use crate::driver::{DriverConfig, run_driver};
use crate::entropy::image_entropy_downsampled;
use crate::error::{InferenceError, Result};
use crate::registry::{KNOWN_MODELS, ModelRegistry};
use crate::source::load_image;
use crate::{Device, InferenceConfig, VERSION};
use crate::{section, success, verbose};

/// Classify the orientation of every image in the input and save the results.
///
/// # Errors
///
/// Returns the first error from argument validation, model loading,
/// inference or writing the outputs.
pub fn run_prediction(args: &PredictArgs) -> Result<()> {
    let config = inference_config(args)?;
    let device = config.device.clone().unwrap_or_default();
    let registry = registry_for(args.model_dir.as_deref()).with_config(config);
    let driver_config = driver_config(args);

    println!("docori-inference {VERSION} 🚀 Rust ONNX FP32 {device}");
    verbose!(
        "model={} input={} batch_size={}",
        driver_config.model_name,
        driver_config.input,
        driver_config.batch_size
    );

    let start = Instant::now();
    let handled = run_driver(&registry, &driver_config)?;
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;

    section!("Summary");
    success!(
        "{handled} {} in {elapsed:.1}ms",
        if handled == 1 { "result" } else { "results" }
    );
    Ok(())
}

/// List every known model and where it would be loaded from.
///
/// # Errors
///
/// Never fails today; returns `Result` to match the other commands.
pub fn run_models(args: &ModelsArgs) -> Result<()> {
    let registry = registry_for(args.model_dir.as_deref());
    verbose!("Model directory: {}", registry.model_dir().display());
    for line in model_listing(&registry) {
        println!("{line}");
    }
    Ok(())
}

/// Print the grayscale entropy of one image.
///
/// # Errors
///
/// Returns an error if the image cannot be read.
pub fn run_entropy(args: &EntropyArgs) -> Result<()> {
    let image = load_image(&args.image)?.to_rgb8();
    let bits = image_entropy_downsampled(&image, args.sample_rate);
    println!("{}", format_entropy(&args.image, bits, args.sample_rate));
    Ok(())
}

fn registry_for(model_dir: Option<&Path>) -> ModelRegistry {
    let registry = ModelRegistry::new();
    match model_dir {
        Some(dir) => registry.with_model_dir(dir),
        None => registry,
    }
}

fn inference_config(args: &PredictArgs) -> Result<InferenceConfig> {
    if args.batch_size == 0 {
        return Err(InferenceError::ConfigError(
            "--batch-size must be at least 1".to_string(),
        ));
    }

    let mut config = InferenceConfig::new().with_threads(args.threads);

    if let Some(k) = args.topk {
        if k == 0 {
            return Err(InferenceError::ConfigError(
                "--topk must be at least 1".to_string(),
            ));
        }
        config = config.with_topk(k);
    }

    if let Some(d) = &args.device {
        let device: Device = d.parse().map_err(InferenceError::ConfigError)?;
        config = config.with_device(device);
    }

    Ok(config)
}

fn driver_config(args: &PredictArgs) -> DriverConfig {
    DriverConfig {
        model_name: args.model.clone(),
        input: args.input.clone(),
        batch_size: args.batch_size,
        img_output: args.save_img.clone(),
        json_output: args.save_json.clone(),
        json_format: args.json_format,
    }
}

/// One line per known model: name, task and location.
fn model_listing(registry: &ModelRegistry) -> Vec<String> {
    KNOWN_MODELS
        .iter()
        .map(|spec| {
            let location = registry.locate(spec.name).map_or_else(
                || {
                    let searched: Vec<String> = registry
                        .candidates(spec.name)
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect();
                    format!("not found (searched {})", searched.join(", "))
                },
                |path| path.display().to_string(),
            );
            format!("{:<30} {:<22} {location}", spec.name, spec.task.to_string())
        })
        .collect()
}

fn format_entropy(path: &Path, bits: f64, sample_rate: u32) -> String {
    if sample_rate > 1 {
        format!(
            "{}: {bits:.4} bits (sample rate {sample_rate})",
            path.display()
        )
    } else {
        format!("{}: {bits:.4} bits", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn predict_args(extra: &[&str]) -> PredictArgs {
        let mut argv = vec!["app", "predict"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Predict(args) => args,
            other => panic!("expected predict, got {other:?}"),
        }
    }

    #[test]
    fn test_default_args_reproduce_driver_defaults() {
        let args = predict_args(&[]);
        assert_eq!(driver_config(&args), DriverConfig::default());
    }

    #[test]
    fn test_batch_size_goes_to_the_driver() {
        let args = predict_args(&["--batch-size", "4", "-i", "scans/"]);
        let config = driver_config(&args);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.input, "scans/");
        assert!(inference_config(&args).is_ok());
    }

    #[test]
    fn test_inference_config_from_args() {
        let args = predict_args(&["--topk", "2", "--threads", "3", "--device", "cuda:1"]);
        let config = inference_config(&args).unwrap();
        assert_eq!(config.topk, Some(2));
        assert_eq!(config.num_threads, 3);
        assert_eq!(config.device, Some(Device::Cuda(1)));
    }

    #[test]
    fn test_invalid_args_are_config_errors() {
        for extra in [
            &["--batch-size", "0"][..],
            &["--topk", "0"][..],
            &["--device", "tpu"][..],
        ] {
            let err = inference_config(&predict_args(extra)).unwrap_err();
            assert!(matches!(err, InferenceError::ConfigError(_)), "{extra:?}");
        }
    }

    #[test]
    fn test_model_listing_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("PP-LCNet_x1_0_doc_ori.onnx"), b"").unwrap();
        let registry = ModelRegistry::new()
            .with_model_dir(dir.path())
            .with_base_url(None);

        let lines = model_listing(&registry);
        assert_eq!(lines.len(), KNOWN_MODELS.len());
        assert!(lines[0].starts_with("PP-LCNet_x1_0_doc_ori"));
        assert!(lines[0].ends_with("PP-LCNet_x1_0_doc_ori.onnx"));
        assert!(lines[1].contains("not found"));
    }

    #[test]
    fn test_format_entropy() {
        let path = Path::new("page.png");
        assert_eq!(format_entropy(path, 1.0, 1), "page.png: 1.0000 bits");
        assert_eq!(
            format_entropy(path, 0.5, 4),
            "page.png: 0.5000 bits (sample rate 4)"
        );
    }
}
