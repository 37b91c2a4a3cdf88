use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::result::VideoReport;
use super::session::DetectionSession;
use super::video::VideoAggregator;
use crate::config::DetectorConfig;
use crate::ingest::{self, FrameSource};
use crate::model::{self, ModelStore, SharedModel, TrainedModel, TrainingReport};
use crate::training::{CorpusSource, SyntheticSource, TrainingDataSource};

/// Detection service: one shared model, any number of sessions.
pub struct ViolenceDetector {
    config: DetectorConfig,
    store: ModelStore,
    model: SharedModel,
    aggregator: VideoAggregator,
    training: Mutex<()>,
}

impl ViolenceDetector {
    /// Load stored artifacts, or train and persist a fresh model.
    pub fn initialize(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let store = ModelStore::new(&config.model_dir);
        let model = match store.load() {
            Some(model) => model,
            None => {
                log::warn!("training a fresh model");
                let (model, _) = fit(&config, config.training.dataset_path.as_deref())?;
                if let Err(err) = store.save(&model) {
                    log::warn!("model kept in memory only: {err:#}");
                }
                model
            }
        };
        Ok(Self::assemble(config, store, model))
    }

    /// Always train from `config`, failing unless both artifacts are
    /// persisted. Returns the service with the report of that training.
    pub fn train_fresh(config: DetectorConfig) -> Result<(Self, TrainingReport)> {
        config.validate()?;
        let store = ModelStore::new(&config.model_dir);
        let (model, report) = fit(&config, config.training.dataset_path.as_deref())?;
        store.save(&model)?;
        Ok((Self::assemble(config, store, model), report))
    }

    /// Service around an already trained model.
    pub fn with_model(config: DetectorConfig, model: TrainedModel) -> Result<Self> {
        config.validate()?;
        let store = ModelStore::new(&config.model_dir);
        Ok(Self::assemble(config, store, model))
    }

    fn assemble(config: DetectorConfig, store: ModelStore, model: TrainedModel) -> Self {
        let aggregator = VideoAggregator::new(&config.video, config.decision_threshold);
        Self {
            config,
            store,
            model: SharedModel::new(model),
            aggregator,
            training: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Model currently served.
    pub fn model(&self) -> Arc<TrainedModel> {
        self.model.current()
    }

    /// New detection stream with its own history.
    pub fn session(&self) -> DetectionSession {
        DetectionSession::new(self.model.clone(), self.config.decision_threshold)
    }

    pub fn detect_in_video(&self, path: &Path) -> Result<VideoReport> {
        self.aggregator.analyze(&self.model.current(), path)
    }

    pub fn detect_in_source(&self, source: &mut dyn FrameSource) -> Result<VideoReport> {
        self.aggregator.analyze_source(&self.model.current(), source)
    }

    /// `detect_in_source` reporting decoded-frame counts to `progress`.
    pub fn detect_in_source_with_progress<F>(
        &self,
        source: &mut dyn FrameSource,
        progress: F,
    ) -> Result<VideoReport>
    where
        F: FnMut(u64),
    {
        self.aggregator
            .analyze_with_progress(&self.model.current(), source, progress)
    }

    /// Train from `dataset` (falling back to synthetic data), persist and
    /// swap in the new model. Returns whether all of that succeeded.
    pub fn train(&self, dataset: Option<&Path>) -> bool {
        self.report_outcome(self.try_train(dataset))
    }

    pub fn try_train(&self, dataset: Option<&Path>) -> Result<TrainingReport> {
        let _guard = self.training.lock().unwrap_or_else(|p| p.into_inner());
        self.train_locked(dataset)
    }

    /// Delete stored artifacts, then train as `train` does.
    pub fn retrain(&self, dataset: Option<&Path>) -> bool {
        let outcome = {
            let _guard = self.training.lock().unwrap_or_else(|p| p.into_inner());
            self.store
                .clear()
                .and_then(|()| self.train_locked(dataset))
        };
        self.report_outcome(outcome)
    }

    fn train_locked(&self, dataset: Option<&Path>) -> Result<TrainingReport> {
        let (model, report) = fit(&self.config, dataset)?;
        self.store.save(&model)?;
        self.model.replace(model);
        Ok(report)
    }

    fn report_outcome(&self, outcome: Result<TrainingReport>) -> bool {
        match outcome {
            Ok(_) => true,
            Err(err) => {
                log::warn!("training failed: {err:#}");
                false
            }
        }
    }
}

/// Corpus training when `dataset` is usable, synthetic otherwise. Any run
/// given a dataset trains with the corpus forest profile, fallback included.
fn fit(
    config: &DetectorConfig,
    dataset: Option<&Path>,
) -> Result<(TrainedModel, TrainingReport)> {
    if let Some(root) = dataset {
        let sequence_fps = config.video.sequence_fps;
        let corpus = CorpusSource::new(root)
            .with_limits(
                config.training.corpus_max_videos,
                config.training.corpus_frame_stride,
                config.training.corpus_frames_per_video,
            )
            .with_opener(Box::new(move |path: &Path| {
                ingest::open_video(path, sequence_fps)
            }));
        match corpus.load() {
            Ok(samples) => return model::train(&samples, &config.forest_corpus, corpus.name()),
            Err(err) => log::warn!(
                "corpus {} unusable ({err:#}), falling back to synthetic data",
                root.display()
            ),
        }
    }

    let mut synthetic = SyntheticSource::new(config.training.synthetic_per_class);
    if let Some(seed) = config.training.seed {
        synthetic = synthetic.with_seed(seed);
    }
    let samples = synthetic.load()?;
    let params = if dataset.is_some() {
        &config.forest_corpus
    } else {
        &config.forest
    };
    model::train(&samples, params, synthetic.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::model::ForestParams;

    fn quick_config(dir: &Path) -> DetectorConfig {
        let mut config = DetectorConfig::default();
        config.model_dir = dir.to_path_buf();
        config.training.synthetic_per_class = 120;
        config.training.seed = Some(21);
        config.forest = ForestParams {
            n_trees: 8,
            max_depth: 5,
            ..ForestParams::standard()
        };
        config.forest_corpus = ForestParams {
            n_trees: 12,
            max_depth: 6,
            ..ForestParams::corpus()
        };
        config
    }

    #[test]
    fn initialize_trains_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let first = ViolenceDetector::initialize(quick_config(dir.path())).unwrap();
        assert!(first.store().exists());

        let second = ViolenceDetector::initialize(quick_config(dir.path())).unwrap();
        assert_eq!(*first.model(), *second.model());
    }

    #[test]
    fn train_swaps_model_seen_by_open_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quick_config(dir.path());
        let detector = ViolenceDetector::initialize(config.clone()).unwrap();
        let before = detector.model();

        config.training.seed = Some(99);
        let detector = ViolenceDetector::with_model(config, (*before).clone()).unwrap();
        let mut session = detector.session();
        assert!(detector.train(None));
        assert_ne!(*detector.model(), *before);

        let verdict = session.detect(&Frame::solid(10, 10, [0, 0, 0]));
        assert!((0.0..=1.0).contains(&verdict.confidence));
    }

    #[test]
    fn unrecognized_dataset_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dataset.path().join("misc")).unwrap();

        let detector = ViolenceDetector::initialize(quick_config(dir.path())).unwrap();
        let report = detector.try_train(Some(dataset.path())).unwrap();
        assert_eq!(report.source, "synthetic");
        assert_eq!(report.samples, 240);
        assert_eq!(detector.model().classifier().trees().len(), 12);

        assert!(detector.train(None));
        assert_eq!(detector.model().classifier().trees().len(), 8);
    }

    #[test]
    fn train_fresh_fails_when_artifacts_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = quick_config(&blocker.join("models"));

        assert!(ViolenceDetector::train_fresh(config.clone()).is_err());

        // Startup still serves the in-memory model, but nothing is stored.
        let detector = ViolenceDetector::initialize(config).unwrap();
        assert!(!detector.store().exists());
        assert!(!detector.train(None));
    }

    #[test]
    fn train_fresh_reports_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (detector, report) = ViolenceDetector::train_fresh(quick_config(dir.path())).unwrap();
        assert!(detector.store().exists());
        assert_eq!(report.source, "synthetic");
        assert_eq!(report.samples, 240);
        assert_eq!(detector.store().load().unwrap(), *detector.model());
    }

    #[test]
    fn retrain_replaces_deleted_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let detector = ViolenceDetector::initialize(quick_config(dir.path())).unwrap();
        std::fs::remove_file(detector.store().model_path()).unwrap();
        assert!(detector.retrain(None));
        assert!(detector.store().exists());
    }
}
