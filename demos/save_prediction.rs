// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Example script demonstrating how to classify pages and save the results.
//!
//! This example covers:
//! 1. Running the default load, predict, print and save sequence.
//! 2. Predicting over a directory with an explicit model handle and
//!    writing one output pair per page.

use std::path::Path;

use docori_inference::{
    DriverConfig, ModelLoader, ModelRegistry, Result, Source, run_driver,
};

fn main() -> Result<()> {
    let registry = ModelRegistry::new();

    // 1. Default run: PP-LCNet_x1_0_doc_ori on the sample page
    let config = DriverConfig::default();
    if Path::new(&config.input).exists() {
        let handled = run_driver(&registry, &config)?;
        println!("Handled {handled} result(s); see {} and {}", config.img_output, config.json_output);
    } else {
        println!("Skipping default run: '{}' not found.", config.input);
    }

    // 2. A directory of scans, one annotated image and JSON file per page
    let scans = "scans";
    if Path::new(scans).is_dir() {
        let mut model = registry.create_model("PP-LCNet_x1_0_doc_ori")?;
        for result in model.predict_source(Source::from(scans), 4)? {
            let result = result?;
            println!("{}: {}", result.input_path, result.verbose());
            result.save_to_img("runs/pages/")?;
            result.save_to_json("runs/pages/")?;
        }
        println!("Saved per-page outputs to runs/pages/");
    } else {
        println!("Skipping directory run: '{scans}' not found.");
    }

    Ok(())
}
