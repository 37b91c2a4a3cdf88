//! Feature extraction over a labeled video corpus.
//!
//! Expected layout: one directory per class directly under the dataset root,
//! named after one of the accepted aliases (`violence/`, `Fight/`,
//! `non-violence/`, `Normal/`, ...). Videos are collected recursively below
//! each class directory.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{Label, TrainingDataSource, TrainingSample};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::frame::FrameHistory;
use crate::ingest::{self, FrameSource};

/// Opens a video for feature extraction.
pub type VideoOpener = Box<dyn Fn(&Path) -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// Class directories resolved under a dataset root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusLayout {
    pub violent: PathBuf,
    pub safe: PathBuf,
}

impl CorpusLayout {
    /// Resolve both class directories, trying aliases in order.
    pub fn locate(root: &Path) -> Result<Self> {
        let violent = find_class_dir(root, Label::Violent);
        let safe = find_class_dir(root, Label::Safe);
        match (violent, safe) {
            (Some(violent), Some(safe)) => Ok(Self { violent, safe }),
            _ => {
                log::warn!(
                    "dataset structure not recognized under {}: expected class folders like 'violence'/'non-violence', found [{}]",
                    root.display(),
                    list_entries(root).join(", ")
                );
                Err(anyhow!(
                    "dataset {} lacks recognized class directories",
                    root.display()
                ))
            }
        }
    }

    pub fn class_dir(&self, label: Label) -> &Path {
        match label {
            Label::Violent => &self.violent,
            Label::Safe => &self.safe,
        }
    }
}

/// Training samples extracted from real videos.
pub struct CorpusSource {
    root: PathBuf,
    max_videos: usize,
    frame_stride: usize,
    frames_per_video: usize,
    extractor: FeatureExtractor,
    opener: VideoOpener,
}

impl CorpusSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_videos: 50,
            frame_stride: 30,
            frames_per_video: 10,
            extractor: FeatureExtractor::default(),
            opener: Box::new(|path: &Path| ingest::open_video(path, 30.0)),
        }
    }

    /// Videos per class, sampling stride and vectors kept per video.
    pub fn with_limits(
        mut self,
        max_videos: usize,
        frame_stride: usize,
        frames_per_video: usize,
    ) -> Self {
        self.max_videos = max_videos.max(1);
        self.frame_stride = frame_stride.max(1);
        self.frames_per_video = frames_per_video.max(1);
        self
    }

    pub fn with_opener(mut self, opener: VideoOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_class(&self, dir: &Path, label: Label) -> Result<Vec<TrainingSample>> {
        let videos = collect_videos(dir)?;
        let take = videos.len().min(self.max_videos);
        log::info!(
            "processing {take} of {} {} videos from {}",
            videos.len(),
            label.as_str(),
            dir.display()
        );

        let mut samples = Vec::new();
        for (i, video) in videos.iter().take(take).enumerate() {
            match self.extract_video(video) {
                Ok(vectors) => {
                    log::debug!(
                        "{} video {}/{take}: {} vectors from {}",
                        label.as_str(),
                        i + 1,
                        vectors.len(),
                        video.display()
                    );
                    samples.extend(vectors.into_iter().map(|f| TrainingSample::new(f, label)));
                }
                Err(err) => log::warn!("skipping {}: {err:#}", video.display()),
            }
        }
        Ok(samples)
    }

    /// Sample every `frame_stride`-th frame, keeping up to `frames_per_video`
    /// successful extractions. Each video gets a fresh history.
    fn extract_video(&self, path: &Path) -> Result<Vec<FeatureVector>> {
        let mut source = (self.opener)(path)?;
        let mut history = FrameHistory::new();
        let mut vectors = Vec::with_capacity(self.frames_per_video);
        let mut index = 0usize;

        while vectors.len() < self.frames_per_video {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("decode stopped in {}: {err:#}", path.display());
                    break;
                }
            };
            if index % self.frame_stride == 0 && !frame.is_empty() {
                let features = self.extractor.extract(Some(&frame), &history);
                history.push(frame);
                if features.is_zero() {
                    log::debug!("no features from frame {index} of {}", path.display());
                } else {
                    vectors.push(features);
                }
            }
            index += 1;
        }

        if vectors.is_empty() {
            return Err(anyhow!("no features extracted"));
        }
        Ok(vectors)
    }
}

impl TrainingDataSource for CorpusSource {
    fn name(&self) -> &str {
        "corpus"
    }

    fn load(&self) -> Result<Vec<TrainingSample>> {
        let layout = CorpusLayout::locate(&self.root)?;
        let violent = self.load_class(&layout.violent, Label::Violent)?;
        let safe = self.load_class(&layout.safe, Label::Safe)?;
        if violent.is_empty() || safe.is_empty() {
            return Err(anyhow!(
                "corpus yielded {} violent and {} safe samples",
                violent.len(),
                safe.len()
            ));
        }
        log::info!(
            "loaded {} violent and {} safe samples from {}",
            violent.len(),
            safe.len(),
            self.root.display()
        );
        let mut samples = violent;
        samples.extend(safe);
        Ok(samples)
    }
}

fn find_class_dir(root: &Path, label: Label) -> Option<PathBuf> {
    label
        .dir_aliases()
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_dir())
}

fn list_entries(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Video files below `dir`, recursively, in sorted order.
pub fn collect_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries =
            std::fs::read_dir(&current).with_context(|| format!("read {}", current.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("read entry in {}", current.display()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if ingest::is_video_file(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
