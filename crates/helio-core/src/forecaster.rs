//! Model lifecycle: retrain, persist, cache, predict
//!
//! The forecaster owns a single-slot cache of the current model. The slot is
//! filled lazily from the store on first prediction and cleared after every
//! successful retrain, so the next prediction reloads the new artifact.
//!
//! Retrains are serialized by `retrain_lock`. The artifact write and the cache
//! invalidation happen under the cache write lock, so no prediction can pick
//! up the old model once the new artifact is in place.

use crate::error::{AnalyticsError, Result};
use crate::predictor::{PredictionModel, PredictorConfig};
use crate::store::ModelStore;
use crate::telemetry::{WeatherFeatureVector, WeatherRecord};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{error, info, warn};

pub struct EnergyForecaster<S: ModelStore> {
    store: S,
    config: PredictorConfig,
    cache: RwLock<Option<Arc<PredictionModel>>>,
    retrain_lock: Mutex<()>,
}

impl<S: ModelStore> EnergyForecaster<S> {
    pub fn new(store: S, config: PredictorConfig) -> Self {
        Self {
            store,
            config,
            cache: RwLock::new(None),
            retrain_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Train on `history`, replace the persisted artifact and invalidate the cache.
    ///
    /// Returns the location label on success. On any failure the previous
    /// artifact and the cached model are left as they were.
    pub fn retrain(&self, location: &str, history: &[WeatherRecord]) -> Result<String> {
        if history.is_empty() {
            warn!(location, "Refusing to train on empty history");
            return Err(AnalyticsError::EmptyTrainingData);
        }

        let _serialized = self
            .retrain_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let model = PredictionModel::train(location, history, &self.config)?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.store.save(&model).map_err(|e| {
            error!(location, error = %e, "Failed to persist trained model");
            AnalyticsError::TrainingFailed(e.to_string())
        })?;
        *cache = None;

        info!(location, "Model retrained, cache invalidated");
        Ok(location.to_string())
    }

    /// The current model, loading it from the store if the cache is empty
    pub fn model(&self) -> Result<Arc<PredictionModel>> {
        if let Some(model) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(model));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = cache.as_ref() {
            return Ok(Arc::clone(model));
        }

        match self.store.load() {
            Ok(Some(model)) => {
                let model = Arc::new(model);
                *cache = Some(Arc::clone(&model));
                Ok(model)
            }
            Ok(None) => {
                warn!("No trained model artifact found");
                Err(AnalyticsError::ModelUnavailable)
            }
            Err(e) => {
                error!(error = %e, "Failed to load model artifact");
                Err(e)
            }
        }
    }

    pub fn predict(&self, rows: &[WeatherFeatureVector]) -> Result<Vec<f64>> {
        self.model()?.predict(rows)
    }

    pub fn predict_records(&self, rows: &[WeatherRecord]) -> Result<Vec<f64>> {
        self.model()?.predict_records(rows)
    }

    /// Drop the cached model; the next prediction reloads from the store
    pub fn invalidate(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryModelStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched off
    #[derive(Default)]
    struct ReadOnlyAfterFirstSave {
        inner: MemoryModelStore,
        read_only: AtomicBool,
    }

    impl ModelStore for ReadOnlyAfterFirstSave {
        fn save(&self, model: &PredictionModel) -> Result<()> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(AnalyticsError::Persistence("disk full".to_string()));
            }
            self.inner.save(model)?;
            self.read_only.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn load(&self) -> Result<Option<PredictionModel>> {
            self.inner.load()
        }
    }

    /// Daylight history whose measured output is a fixed multiple of irradiance
    fn history(watts_per_irradiance: f64) -> Vec<WeatherRecord> {
        (0..96)
            .map(|i| {
                let irradiance = (i % 12) as f64 * 90.0;
                WeatherRecord {
                    temperature: Some(25.0),
                    irradiance: Some(irradiance),
                    humidity: Some(55.0),
                    cloud_cover: Some(20.0),
                    actual_output: Some(irradiance * watts_per_irradiance),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn forecaster() -> EnergyForecaster<MemoryModelStore> {
        EnergyForecaster::new(
            MemoryModelStore::new(),
            PredictorConfig {
                n_estimators: 10,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_predict_without_model_is_unavailable() {
        let f = forecaster();
        let err = f
            .predict(&[WeatherFeatureVector::new(25.0, 500.0, 50.0, 10.0)])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelUnavailable));
        assert!(!f.is_cached());
    }

    #[test]
    fn test_retrain_invalidates_cache() {
        let f = forecaster();
        let row = [WeatherFeatureVector::new(25.0, 450.0, 55.0, 20.0)];

        assert_eq!(f.retrain("Pune", &history(0.1)).unwrap(), "Pune");
        let before = f.predict(&row).unwrap()[0];
        assert!(f.is_cached());

        f.retrain("Pune", &history(0.5)).unwrap();
        assert!(!f.is_cached());
        let after = f.predict(&row).unwrap()[0];

        assert!((before - 45.0).abs() < 5.0, "before = {}", before);
        assert!((after - 225.0).abs() < 25.0, "after = {}", after);
    }

    #[test]
    fn test_empty_retrain_keeps_cached_model() {
        let f = forecaster();
        f.retrain("Pune", &history(0.2)).unwrap();
        let cached = f.model().unwrap();

        let err = f.retrain("Pune", &[]).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyTrainingData));
        assert!(f.is_cached());
        assert!(Arc::ptr_eq(&cached, &f.model().unwrap()));
    }

    #[test]
    fn test_failed_fit_leaves_artifact_intact() {
        let f = forecaster();
        f.retrain("Pune", &history(0.2)).unwrap();

        let mut broken = history(0.3);
        for r in &mut broken {
            r.humidity = None;
        }
        assert!(matches!(
            f.retrain("Delhi", &broken),
            Err(AnalyticsError::TrainingFailed(_))
        ));

        f.invalidate();
        assert_eq!(f.model().unwrap().location, "Pune");
    }

    #[test]
    fn test_failed_save_keeps_cache_and_artifact() {
        let f = EnergyForecaster::new(
            ReadOnlyAfterFirstSave::default(),
            PredictorConfig {
                n_estimators: 10,
                ..Default::default()
            },
        );
        let row = [WeatherFeatureVector::new(25.0, 450.0, 55.0, 20.0)];

        f.retrain("Pune", &history(0.1)).unwrap();
        let cached = f.model().unwrap();
        let before = f.predict(&row).unwrap()[0];

        let err = f.retrain("Delhi", &history(0.5)).unwrap_err();
        assert!(matches!(err, AnalyticsError::TrainingFailed(ref m) if m.contains("disk full")));

        assert!(f.is_cached());
        assert!(Arc::ptr_eq(&cached, &f.model().unwrap()));
        assert_eq!(f.predict(&row).unwrap()[0], before);

        let stored = f.store().load().unwrap().unwrap();
        assert_eq!(stored.location, "Pune");
    }
}
