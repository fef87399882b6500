// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;
use docori_inference::cli::args::{Cli, Commands};
use docori_inference::cli::logging::set_verbose;
use docori_inference::cli::predict::{run_entropy, run_models, run_prediction};
use docori_inference::error;

fn main() {
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Predict(args) => {
            set_verbose(args.verbose);
            run_prediction(args)
        }
        Commands::Models(args) => run_models(args),
        Commands::Entropy(args) => run_entropy(args),
    };

    if let Err(e) = outcome {
        error!("{e}");
        process::exit(1);
    }
}
