use std::fs;

use violence_detector::model::{self, ForestParams, ModelStore, TrainedModel};
use violence_detector::{FeatureVector, SyntheticSource, TrainingDataSource};

fn trained(seed: u64) -> TrainedModel {
    let samples = SyntheticSource::new(80)
        .with_seed(seed)
        .load()
        .expect("synthetic samples");
    let params = ForestParams {
        n_trees: 6,
        max_depth: 5,
        ..ForestParams::standard()
    };
    model::train(&samples, &params, "synthetic")
        .expect("train model")
        .0
}

#[test]
fn artifacts_live_at_fixed_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    store.save(&trained(1)).unwrap();

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["scaler.json", "violence_model.json"]);
}

#[test]
fn reloaded_model_infers_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    let model = trained(2);
    store.save(&model).unwrap();
    let loaded = store.load().expect("stored model");

    let mut probe = [0.0; 50];
    for (i, v) in probe.iter_mut().enumerate() {
        *v = (i as f64 * 3.7) % 11.0;
    }
    let probe = FeatureVector::from_array(probe);
    assert_eq!(model.infer(&probe), loaded.infer(&probe));
}

#[test]
fn half_written_pair_is_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    store.save(&trained(3)).unwrap();

    fs::remove_file(store.model_path()).unwrap();
    assert!(!store.exists());
    assert!(store.load().is_none());

    store.save(&trained(3)).unwrap();
    let bytes = fs::read(store.model_path()).unwrap();
    fs::write(store.model_path(), &bytes[..bytes.len() / 2]).unwrap();
    assert!(store.load().is_none());
}

#[test]
fn save_overwrites_previous_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    store.save(&trained(4)).unwrap();
    let newer = trained(5);
    store.save(&newer).unwrap();
    assert_eq!(store.load().unwrap(), newer);
}
