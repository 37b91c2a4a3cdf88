//! On-disk model artifacts.
//!
//! The scaler and the classifier live in two JSON files under the model
//! directory. Each file is an envelope carrying the serialized payload, its
//! SHA-256 digest and a generation tag shared by the pair, so a torn or
//! mixed write is rejected at load instead of being served. Files are
//! written to a temporary sibling, synced and renamed into place.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{RandomForest, Scaler, TrainedModel};

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "violence_model.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    kind: String,
    generation: String,
    sha256: String,
    payload: String,
}

impl Envelope {
    fn open<T: DeserializeOwned>(&self, kind: &str) -> Result<T> {
        if self.format_version != FORMAT_VERSION {
            return Err(anyhow!(
                "unsupported artifact format {} (expected {FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.kind != kind {
            return Err(anyhow!("artifact holds '{}', expected '{kind}'", self.kind));
        }
        if self.sha256 != digest_hex(self.payload.as_bytes()) {
            return Err(anyhow!("artifact digest mismatch"));
        }
        serde_json::from_str(&self.payload).context("decode artifact payload")
    }
}

/// Persists and restores the scaler/classifier pair.
#[derive(Clone, Debug)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Whether both artifact files are present.
    pub fn exists(&self) -> bool {
        self.scaler_path().is_file() && self.model_path().is_file()
    }

    /// Restore the stored pair. Missing, corrupt or mismatched artifacts
    /// yield `None` so the caller retrains.
    pub fn load(&self) -> Option<TrainedModel> {
        if !self.exists() {
            log::info!("no stored model under {}", self.dir.display());
            return None;
        }
        match self.try_load() {
            Ok(model) => {
                log::info!("loaded model from {}", self.dir.display());
                Some(model)
            }
            Err(err) => {
                log::warn!(
                    "stored model under {} is unusable: {err:#}",
                    self.dir.display()
                );
                None
            }
        }
    }

    fn try_load(&self) -> Result<TrainedModel> {
        let scaler_env = read_envelope(&self.scaler_path())?;
        let model_env = read_envelope(&self.model_path())?;
        if scaler_env.generation != model_env.generation {
            return Err(anyhow!("scaler and classifier come from different training runs"));
        }
        let scaler: Scaler = scaler_env.open("scaler")?;
        let classifier: RandomForest = model_env.open("random_forest")?;
        TrainedModel::new(scaler, classifier)
    }

    pub fn save(&self, model: &TrainedModel) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create model directory {}", self.dir.display()))?;

        let scaler_payload = serde_json::to_string(model.scaler()).context("encode scaler")?;
        let model_payload =
            serde_json::to_string(model.classifier()).context("encode classifier")?;

        let mut hasher = Sha256::new();
        hasher.update(scaler_payload.as_bytes());
        hasher.update(model_payload.as_bytes());
        let generation = hex::encode(hasher.finalize());

        write_envelope(&self.scaler_path(), "scaler", &generation, scaler_payload)?;
        write_envelope(&self.model_path(), "random_forest", &generation, model_payload)?;
        log::info!("saved model to {}", self.dir.display());
        Ok(())
    }

    /// Remove both artifacts. Absent files are not an error.
    pub fn clear(&self) -> Result<()> {
        for path in [self.scaler_path(), self.model_path()] {
            match fs::remove_file(&path) {
                Ok(()) => log::info!("removed {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("remove {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

fn write_envelope(path: &Path, kind: &str, generation: &str, payload: String) -> Result<()> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        generation: generation.to_string(),
        sha256: digest_hex(payload.as_bytes()),
        payload,
    };
    let encoded = serde_json::to_vec(&envelope).context("encode artifact envelope")?;
    write_atomic(path, &encoded).with_context(|| format!("write {}", path.display()))
}

fn read_envelope(path: &Path) -> Result<Envelope> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
