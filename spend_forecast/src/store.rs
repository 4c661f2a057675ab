//! Durable storage for a trained forecaster
//!
//! The network and its scaler live in two JSON files with fixed names inside
//! one directory. Both are written to temporary files first and renamed into
//! place only after both writes succeed. If the second rename fails the
//! previous model file is put back, so the pair on disk always matches.

use crate::error::{ForecastError, Result};
use crate::forecaster::{ModelArtifact, ScalerArtifact, TrainedForecaster};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the network weights
pub const MODEL_FILE: &str = "finance_predictor.json";

/// File name of the fitted scaler
pub const SCALER_FILE: &str = "scaler.json";

/// Model and scaler artifacts under a fixed directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    /// Whether both artifacts are present
    pub fn exists(&self) -> bool {
        self.model_path().is_file() && self.scaler_path().is_file()
    }

    /// Write both artifacts, creating the directory if needed
    pub fn save(&self, forecaster: &TrainedForecaster) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let (model, scaler) = forecaster.to_artifacts();
        let model_tmp = self.dir.join(format!("{}.tmp", MODEL_FILE));
        let scaler_tmp = self.dir.join(format!("{}.tmp", SCALER_FILE));

        let written = write_json(&model_tmp, &model).and_then(|_| write_json(&scaler_tmp, &scaler));
        if let Err(err) = written {
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&scaler_tmp);
            return Err(err);
        }

        let model_path = self.model_path();
        let backup = self.dir.join(format!("{}.bak", MODEL_FILE));
        let had_previous = model_path.is_file();
        if had_previous {
            if let Err(err) = fs::rename(&model_path, &backup) {
                let _ = fs::remove_file(&model_tmp);
                let _ = fs::remove_file(&scaler_tmp);
                return Err(err.into());
            }
        }

        if let Err(err) = fs::rename(&model_tmp, &model_path) {
            if had_previous {
                let _ = fs::rename(&backup, &model_path);
            }
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&scaler_tmp);
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&scaler_tmp, self.scaler_path()) {
            warn!(dir = %self.dir.display(), error = %err, "Scaler rename failed, restoring previous model");
            if had_previous {
                let _ = fs::rename(&backup, &model_path);
            } else {
                let _ = fs::remove_file(&model_path);
            }
            let _ = fs::remove_file(&scaler_tmp);
            return Err(err.into());
        }

        if had_previous {
            let _ = fs::remove_file(&backup);
        }

        info!(dir = %self.dir.display(), "Saved model artifacts");
        Ok(())
    }

    /// Load both artifacts; `Ok(None)` when either is absent
    pub fn load(&self) -> Result<Option<TrainedForecaster>> {
        if !self.exists() {
            debug!(dir = %self.dir.display(), "No stored model");
            return Ok(None);
        }

        let model: ModelArtifact = read_json(&self.model_path())?;
        let scaler: ScalerArtifact = read_json(&self.scaler_path())?;
        let forecaster = TrainedForecaster::from_artifacts(model, scaler)?;

        info!(dir = %self.dir.display(), "Loaded model artifacts");
        Ok(Some(forecaster))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ForecastError::PersistenceError(e.to_string()))?
        .sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| {
        ForecastError::PersistenceError(format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SequenceNetwork;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use spend_math::StandardScaler;
    use tempfile::tempdir;

    fn forecaster() -> TrainedForecaster {
        let mut rng = StdRng::seed_from_u64(21);
        let scaler = StandardScaler::fit(&[[1.0, 2.0, 3.0], [4.0, 1.0, -2.0]]).unwrap();
        TrainedForecaster::new(SequenceNetwork::new(&mut rng), scaler).unwrap()
    }

    #[test]
    fn test_missing_artifacts_load_as_none() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));

        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_directory_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nested").join("models"));
        let original = forecaster();

        store.save(&original).unwrap();
        assert!(store.model_path().is_file());
        assert!(store.scaler_path().is_file());
        assert!(!store.dir().join("scaler.json.tmp").exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.scaler(), original.scaler());
    }

    #[test]
    fn test_single_artifact_is_not_loaded() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&forecaster()).unwrap();
        fs::remove_file(store.scaler_path()).unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&forecaster()).unwrap();
        fs::write(store.model_path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(ForecastError::PersistenceError(_))));
    }

    #[test]
    fn test_truncated_weights_are_an_error() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&forecaster()).unwrap();

        let content = fs::read_to_string(store.model_path()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&content).unwrap();
        value["network"]["output"]["weights"] = serde_json::json!([]);
        value["network"]["output"]["bias"] = serde_json::json!([]);
        fs::write(store.model_path(), value.to_string()).unwrap();

        assert!(matches!(store.load(), Err(ForecastError::PersistenceError(_))));
    }

    #[test]
    fn test_zero_scale_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&forecaster()).unwrap();
        fs::write(
            store.scaler_path(),
            r#"{"scaler": {"means": [0.0, 0.0, 0.0], "scales": [1.0, 0.0, 1.0]}}"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(ForecastError::PersistenceError(_))));
    }

    #[test]
    fn test_failed_scaler_rename_restores_previous_model() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&forecaster()).unwrap();
        let previous = fs::read(store.model_path()).unwrap();

        // A non-empty directory where the scaler belongs cannot be replaced by a file
        fs::remove_file(store.scaler_path()).unwrap();
        fs::create_dir(store.scaler_path()).unwrap();
        fs::write(store.scaler_path().join("keep"), "x").unwrap();

        let mut rng = StdRng::seed_from_u64(22);
        let scaler = StandardScaler::fit(&[[0.0, 5.0, 1.0], [2.0, 3.0, 7.0]]).unwrap();
        let other = TrainedForecaster::new(SequenceNetwork::new(&mut rng), scaler).unwrap();

        assert!(store.save(&other).is_err());
        assert_eq!(fs::read(store.model_path()).unwrap(), previous);
        assert!(!store.dir().join("finance_predictor.json.bak").exists());
        assert!(!store.dir().join("finance_predictor.json.tmp").exists());
    }

    #[test]
    fn test_failed_first_save_leaves_no_model() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        fs::create_dir(store.scaler_path()).unwrap();
        fs::write(store.scaler_path().join("keep"), "x").unwrap();

        assert!(store.save(&forecaster()).is_err());
        assert!(!store.model_path().exists());
        assert!(!store.exists());
    }
}
