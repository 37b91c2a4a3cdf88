//! analyze - classify a video clip and print the report as JSON.
//!
//! The path may be a container file (requires the video-ffmpeg feature) or
//! a directory of still frames. Exit status is 2 when the clip is judged
//! violent, so the tool can gate scripts.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use violence_detector::ui;
use violence_detector::{open_video, DetectorConfig, VideoError, ViolenceDetector};

#[derive(Parser, Debug)]
#[command(name = "analyze", about = "Detect violence in a video clip")]
struct Args {
    /// Video file or directory of frames
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Directory holding the model artifacts
    #[arg(long, value_name = "DIR", env = "VIOLENCE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Analyze every Nth frame
    #[arg(long, value_name = "N")]
    stride: Option<u64>,

    /// Compact single-line JSON
    #[arg(long)]
    compact: bool,

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
    if let Some(stride) = args.stride {
        config.video.sample_stride = stride;
    }

    let detector = {
        let _stage = ui.stage("load model");
        ViolenceDetector::initialize(config)?
    };

    let mut source = match open_video(&args.path, detector.config().video.sequence_fps) {
        Ok(source) => source,
        Err(err) => {
            if let Some(video_err) = err.downcast_ref::<VideoError>() {
                eprintln!("analyze: {video_err}");
                std::process::exit(1);
            }
            return Err(err);
        }
    };
    let report = {
        let progress = ui.frames("analyze video", source.frame_count_hint());
        detector.detect_in_source_with_progress(&mut *source, |decoded| progress.set(decoded))?
    };
    log::info!(
        "{}: {}/{} sampled frames violent ({:.1}%)",
        args.path.display(),
        report.violent_frames,
        report.analyzed_frames,
        report.violence_percentage
    );

    let json = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");

    if report.is_violent_video {
        std::process::exit(2);
    }
    Ok(())
}
