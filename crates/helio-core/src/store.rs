//! Persistence of the trained prediction model
//!
//! The model is stored as a single versioned bincode artifact. Writers replace
//! it atomically; readers either see the previous artifact or the new one.
//! "No artifact yet" is reported as `Ok(None)`, distinct from a failed load.

use crate::error::{AnalyticsError, Result};
use crate::predictor::PredictionModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::info;

/// Version for artifact format migrations
pub const ARTIFACT_VERSION: u32 = 1;

/// Default artifact file name
pub const DEFAULT_MODEL_FILE: &str = "solar_model.bin";

/// On-disk envelope around the model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    model: PredictionModel,
}

/// Encode a model into artifact bytes
pub fn encode_artifact(model: &PredictionModel) -> Result<Vec<u8>> {
    let artifact = ModelArtifact {
        version: ARTIFACT_VERSION,
        model: model.clone(),
    };
    Ok(bincode::serialize(&artifact)?)
}

/// Decode artifact bytes, rejecting newer format versions
pub fn decode_artifact(bytes: &[u8]) -> Result<PredictionModel> {
    let artifact: ModelArtifact = bincode::deserialize(bytes)?;
    if artifact.version > ARTIFACT_VERSION {
        return Err(AnalyticsError::UnsupportedArtifactVersion {
            found: artifact.version,
            max_supported: ARTIFACT_VERSION,
        });
    }
    Ok(artifact.model)
}

/// Where the current model artifact lives
pub trait ModelStore: Send + Sync {
    /// Replace the current artifact
    fn save(&self, model: &PredictionModel) -> Result<()>;
    /// Current artifact, or `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<PredictionModel>>;
}

/// Artifact stored in a single file, replaced by persisting a uniquely named
/// temporary file from the same directory
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_FILE)
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, model: &PredictionModel) -> Result<()> {
        let bytes = encode_artifact(model)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // dropped (and removed) on any error before persist
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!(path = %self.path.display(), bytes = bytes.len(), "Model artifact saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<PredictionModel>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let model = decode_artifact(&bytes)?;
        info!(path = %self.path.display(), location = %model.location, "Model artifact loaded");
        Ok(Some(model))
    }
}

/// In-process artifact slot, kept as encoded bytes
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    artifact: Mutex<Option<Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, model: &PredictionModel) -> Result<()> {
        let bytes = encode_artifact(model)?;
        *self.artifact.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<PredictionModel>> {
        let guard = self.artifact.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_deref().map(decode_artifact).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::PredictorConfig;
    use crate::telemetry::WeatherRecord;

    fn tiny_model(location: &str) -> PredictionModel {
        let rows: Vec<WeatherRecord> = (0..12)
            .map(|i| WeatherRecord {
                temperature: Some(20.0 + i as f64),
                irradiance: Some(i as f64 * 80.0),
                humidity: Some(50.0),
                cloud_cover: Some(10.0),
                ..Default::default()
            })
            .collect();
        let config = PredictorConfig {
            n_estimators: 3,
            ..Default::default()
        };
        PredictionModel::train(location, &rows, &config).unwrap()
    }

    #[test]
    fn test_missing_file_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.bin"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_replaces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("nested").join("model.bin"));

        store.save(&tiny_model("Pune")).unwrap();
        store.save(&tiny_model("Nagpur")).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.location, "Nagpur");
    }

    #[test]
    fn test_concurrent_saves_leave_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let models: Vec<PredictionModel> =
            ["Pune", "Nagpur", "Nashik", "Thane"].map(tiny_model).into();

        std::thread::scope(|s| {
            for model in &models {
                let store = FileModelStore::new(&path);
                s.spawn(move || store.save(model).unwrap());
            }
        });

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("model.bin")]);

        let loaded = FileModelStore::new(&path).load().unwrap().unwrap();
        assert!(models.iter().any(|m| m.location == loaded.location));
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"definitely not bincode").unwrap();

        assert!(FileModelStore::new(path).load().is_err());
    }

    #[test]
    fn test_newer_artifact_version_rejected() {
        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION + 1,
            model: tiny_model("Pune"),
        };
        let bytes = bincode::serialize(&artifact).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(AnalyticsError::UnsupportedArtifactVersion { .. })
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryModelStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&tiny_model("Pune")).unwrap();
        assert!(store.has_artifact());
        assert_eq!(store.load().unwrap().unwrap().location, "Pune");
    }
}
