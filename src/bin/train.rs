//! train - fit and persist the violence classifier.
//!
//! Uses a labeled video corpus when one is given (or configured), synthetic
//! feature data otherwise. With `--force` the stored artifacts are deleted
//! and the model is retrained even if a valid one exists. The training
//! report is printed as JSON; the exit status is non-zero unless both
//! artifacts were written.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use violence_detector::ui;
use violence_detector::{DetectorConfig, ModelStore, ViolenceDetector};

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the violence classifier and store its artifacts")]
struct Args {
    /// Dataset root with class folders such as violence/ and non-violence/
    #[arg(value_name = "DATASET")]
    dataset: Option<PathBuf>,

    /// Directory holding the model artifacts
    #[arg(long, value_name = "DIR", env = "VIOLENCE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Delete existing artifacts before training
    #[arg(long)]
    force: bool,

    /// Seed for synthetic training data
    #[arg(long)]
    seed: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut config = DetectorConfig::load()?;
    if let Some(dir) = args.model_dir {
        config.model_dir = dir;
    }
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    if let Some(dataset) = args.dataset {
        config.training.dataset_path = Some(dataset);
    }
    let store = ModelStore::new(&config.model_dir);
    if args.force {
        store.clear()?;
    }

    let report = if store.exists() {
        let detector = {
            let _stage = ui.stage("load model");
            ViolenceDetector::initialize(config)?
        };
        let _stage = ui.stage("train model");
        let dataset = detector.config().training.dataset_path.clone();
        detector.try_train(dataset.as_deref())?
    } else {
        let _stage = ui.stage("train model");
        ViolenceDetector::train_fresh(config)?.1
    };

    log::info!("model stored in {}", store.dir().display());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
