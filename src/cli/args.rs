// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use crate::driver::{
    DEFAULT_BATCH_SIZE, DEFAULT_IMG_OUTPUT, DEFAULT_INPUT, DEFAULT_JSON_OUTPUT, DEFAULT_MODEL_NAME,
};
use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Predict Options:
    --model, -m <MODEL>        Model identifier or .onnx path [default: PP-LCNet_x1_0_doc_ori]
    --input, -i <INPUT>        Image, directory or quoted glob such as 'scans/page-*.png'
                               [default: experiments/onnx-demo/180-2.png]
    --batch-size <N>           Images per forward pass [default: 1]
    --save-img <PATH>          Annotated image destination [default: ./output/demo.png]
    --save-json <PATH>         JSON record destination [default: ./output/res.json]
    --json-format              Print results as JSON
    --topk <K>                 Classes reported per image
    --device <DEVICE>          Device (cpu, cuda:0, tensorrt:0, coreml, directml:0)
    --model-dir <DIR>          Directory searched for model files
    --verbose <BOOL>           Show verbose output [default: true]

Examples:
    docori-inference predict
    docori-inference predict --input scans/page-1.jpg
    docori-inference predict -m models/doc_ori.onnx -i scans/ --batch-size 4
    docori-inference predict -m PP-LCNet_x0_25_textline_ori -i 'lines/*.png' --topk 2
    docori-inference models
    docori-inference entropy scans/page-1.jpg --sample-rate 4"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the orientation of document images
    Predict(PredictArgs),
    /// List known models and where they are loaded from
    Models(ModelsArgs),
    /// Print the grayscale entropy of an image
    Entropy(EntropyArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model identifier or path to an ONNX model file
    #[arg(short, long, default_value = DEFAULT_MODEL_NAME)]
    pub model: String,

    /// Input image, directory or glob pattern
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    pub input: String,

    /// Images per forward pass
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Where the annotated image is written (file or directory)
    #[arg(long, default_value = DEFAULT_IMG_OUTPUT)]
    pub save_img: String,

    /// Where the JSON record is written (file or directory)
    #[arg(long, default_value = DEFAULT_JSON_OUTPUT)]
    pub save_json: String,

    /// Print results as JSON instead of plain text
    #[arg(long, default_value_t = false)]
    pub json_format: bool,

    /// Number of classes reported per image
    #[arg(long)]
    pub topk: Option<usize>,

    /// Device to use (cpu, cuda:0, tensorrt:0, coreml, directml:0)
    #[arg(long)]
    pub device: Option<String>,

    /// Intra-op threads for ONNX Runtime (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Directory searched for model files
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the models command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Directory searched for model files
    #[arg(long)]
    pub model_dir: Option<PathBuf>,
}

/// Arguments for the entropy command.
#[derive(Args, Debug)]
pub struct EntropyArgs {
    /// Image to measure
    pub image: PathBuf,

    /// Use every N-th pixel in both directions (1 uses all pixels)
    #[arg(long, default_value_t = 1)]
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_args_defaults() {
        let args = Cli::parse_from(["app", "predict"]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, "PP-LCNet_x1_0_doc_ori");
                assert_eq!(predict_args.input, "experiments/onnx-demo/180-2.png");
                assert_eq!(predict_args.batch_size, 1);
                assert_eq!(predict_args.save_img, "./output/demo.png");
                assert_eq!(predict_args.save_json, "./output/res.json");
                assert!(!predict_args.json_format);
                assert!(predict_args.topk.is_none());
                assert!(predict_args.device.is_none());
                assert_eq!(predict_args.threads, 0);
                assert!(predict_args.verbose);
            }
            other => panic!("expected predict, got {other:?}"),
        }
    }

    #[test]
    fn test_predict_args_custom() {
        let args = Cli::parse_from([
            "app",
            "predict",
            "--model",
            "custom.onnx",
            "-i",
            "scans/",
            "--batch-size",
            "4",
            "--json-format",
            "--topk",
            "2",
            "--verbose",
            "false",
        ]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, "custom.onnx");
                assert_eq!(predict_args.input, "scans/");
                assert_eq!(predict_args.batch_size, 4);
                assert!(predict_args.json_format);
                assert_eq!(predict_args.topk, Some(2));
                assert!(!predict_args.verbose);
            }
            other => panic!("expected predict, got {other:?}"),
        }
    }

    #[test]
    fn test_entropy_args() {
        let args = Cli::parse_from(["app", "entropy", "page.png", "--sample-rate", "4"]);
        match args.command {
            Commands::Entropy(entropy_args) => {
                assert_eq!(entropy_args.image, PathBuf::from("page.png"));
                assert_eq!(entropy_args.sample_rate, 4);
            }
            other => panic!("expected entropy, got {other:?}"),
        }
    }
}
