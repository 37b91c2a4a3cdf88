use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::DECISION_THRESHOLD;
use crate::model::ForestParams;

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_SAMPLE_STRIDE: u64 = 10;
const DEFAULT_VIOLENT_PERCENTAGE: f64 = 30.0;
const DEFAULT_REPORT_TAIL: usize = 20;
const DEFAULT_SEQUENCE_FPS: f64 = 30.0;
const DEFAULT_SYNTHETIC_PER_CLASS: usize = 1000;
const DEFAULT_CORPUS_MAX_VIDEOS: usize = 50;
const DEFAULT_CORPUS_FRAME_STRIDE: usize = 30;
const DEFAULT_CORPUS_FRAMES_PER_VIDEO: usize = 10;

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_dir: Option<PathBuf>,
    decision_threshold: Option<f32>,
    video: Option<VideoConfigFile>,
    training: Option<TrainingConfigFile>,
    forest: Option<ForestConfigFile>,
    forest_corpus: Option<ForestConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    sample_stride: Option<u64>,
    violent_percentage: Option<f64>,
    report_tail: Option<usize>,
    sequence_fps: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrainingConfigFile {
    dataset_path: Option<PathBuf>,
    synthetic_per_class: Option<usize>,
    seed: Option<u64>,
    corpus_max_videos: Option<usize>,
    corpus_frame_stride: Option<usize>,
    corpus_frames_per_video: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ForestConfigFile {
    n_trees: Option<usize>,
    max_depth: Option<usize>,
    min_samples_split: Option<usize>,
    max_features: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_dir: PathBuf,
    pub decision_threshold: f32,
    pub video: VideoConfig,
    pub training: TrainingConfig,
    /// Forest used for fresh and synthetic training.
    pub forest: ForestParams,
    /// Forest used when training on a video corpus.
    pub forest_corpus: ForestParams,
}

#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub sample_stride: u64,
    /// Clip is violent when strictly more than this share of samples is.
    pub violent_percentage: f64,
    pub report_tail: usize,
    /// Playback rate assumed for image-sequence directories.
    pub sequence_fps: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub dataset_path: Option<PathBuf>,
    pub synthetic_per_class: usize,
    pub seed: Option<u64>,
    pub corpus_max_videos: usize,
    pub corpus_frame_stride: usize,
    pub corpus_frames_per_video: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            violent_percentage: DEFAULT_VIOLENT_PERCENTAGE,
            report_tail: DEFAULT_REPORT_TAIL,
            sequence_fps: DEFAULT_SEQUENCE_FPS,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            synthetic_per_class: DEFAULT_SYNTHETIC_PER_CLASS,
            seed: None,
            corpus_max_videos: DEFAULT_CORPUS_MAX_VIDEOS,
            corpus_frame_stride: DEFAULT_CORPUS_FRAME_STRIDE,
            corpus_frames_per_video: DEFAULT_CORPUS_FRAMES_PER_VIDEO,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            decision_threshold: DECISION_THRESHOLD,
            video: VideoConfig::default(),
            training: TrainingConfig::default(),
            forest: ForestParams::standard(),
            forest_corpus: ForestParams::corpus(),
        }
    }
}

impl DetectorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VIOLENCE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let defaults = Self::default();
        let video = file.video.unwrap_or_default();
        let training = file.training.unwrap_or_default();
        Self {
            model_dir: file.model_dir.unwrap_or(defaults.model_dir),
            decision_threshold: file
                .decision_threshold
                .unwrap_or(defaults.decision_threshold),
            video: VideoConfig {
                sample_stride: video.sample_stride.unwrap_or(DEFAULT_SAMPLE_STRIDE),
                violent_percentage: video
                    .violent_percentage
                    .unwrap_or(DEFAULT_VIOLENT_PERCENTAGE),
                report_tail: video.report_tail.unwrap_or(DEFAULT_REPORT_TAIL),
                sequence_fps: video.sequence_fps.unwrap_or(DEFAULT_SEQUENCE_FPS),
            },
            training: TrainingConfig {
                dataset_path: training.dataset_path,
                synthetic_per_class: training
                    .synthetic_per_class
                    .unwrap_or(DEFAULT_SYNTHETIC_PER_CLASS),
                seed: training.seed,
                corpus_max_videos: training
                    .corpus_max_videos
                    .unwrap_or(DEFAULT_CORPUS_MAX_VIDEOS),
                corpus_frame_stride: training
                    .corpus_frame_stride
                    .unwrap_or(DEFAULT_CORPUS_FRAME_STRIDE),
                corpus_frames_per_video: training
                    .corpus_frames_per_video
                    .unwrap_or(DEFAULT_CORPUS_FRAMES_PER_VIDEO),
            },
            forest: merge_forest(defaults.forest, file.forest),
            forest_corpus: merge_forest(defaults.forest_corpus, file.forest_corpus),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("VIOLENCE_MODEL_DIR") {
            if !dir.trim().is_empty() {
                self.model_dir = PathBuf::from(dir);
            }
        }
        if let Ok(threshold) = std::env::var("VIOLENCE_THRESHOLD") {
            self.decision_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("VIOLENCE_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Ok(stride) = std::env::var("VIOLENCE_VIDEO_STRIDE") {
            self.video.sample_stride = stride
                .trim()
                .parse()
                .map_err(|_| anyhow!("VIOLENCE_VIDEO_STRIDE must be a positive integer"))?;
        }
        if let Ok(path) = std::env::var("VIOLENCE_DATASET") {
            if !path.trim().is_empty() {
                self.training.dataset_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(seed) = std::env::var("VIOLENCE_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("VIOLENCE_SEED must be an unsigned integer"))?;
            self.training.seed = Some(seed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            return Err(anyhow!(
                "decision_threshold must be in (0, 1), got {}",
                self.decision_threshold
            ));
        }
        if self.video.sample_stride == 0 {
            return Err(anyhow!("video.sample_stride must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.video.violent_percentage) {
            return Err(anyhow!("video.violent_percentage must be in [0, 100]"));
        }
        if self.training.synthetic_per_class == 0 {
            return Err(anyhow!("training.synthetic_per_class must be at least 1"));
        }
        if self.training.corpus_max_videos == 0
            || self.training.corpus_frame_stride == 0
            || self.training.corpus_frames_per_video == 0
        {
            return Err(anyhow!("training corpus limits must be at least 1"));
        }
        for (name, forest) in [("forest", &self.forest), ("forest_corpus", &self.forest_corpus)] {
            if forest.n_trees == 0 || forest.max_depth == 0 {
                return Err(anyhow!("{name} needs at least one tree of depth 1"));
            }
        }
        Ok(())
    }
}

fn merge_forest(base: ForestParams, file: Option<ForestConfigFile>) -> ForestParams {
    let Some(file) = file else {
        return base;
    };
    ForestParams {
        n_trees: file.n_trees.unwrap_or(base.n_trees),
        max_depth: file.max_depth.unwrap_or(base.max_depth),
        min_samples_split: file.min_samples_split.unwrap_or(base.min_samples_split),
        max_features: file.max_features.or(base.max_features),
        seed: file.seed.unwrap_or(base.seed),
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DetectorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.decision_threshold, 0.3);
        assert_eq!(cfg.video.sample_stride, 10);
        assert_eq!(cfg.forest.n_trees, 100);
        assert_eq!(cfg.forest_corpus.max_depth, 15);
    }

    #[test]
    fn partial_forest_section_keeps_other_defaults() {
        let file: DetectorConfigFile =
            serde_json::from_str(r#"{ "forest": { "n_trees": 7 } }"#).unwrap();
        let cfg = DetectorConfig::from_file(file);
        assert_eq!(cfg.forest.n_trees, 7);
        assert_eq!(cfg.forest.max_depth, 10);
        assert_eq!(cfg.forest.seed, 42);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut cfg = DetectorConfig::default();
        cfg.decision_threshold = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.video.violent_percentage = 120.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.forest_corpus.n_trees = 0;
        assert!(cfg.validate().is_err());
    }
}
