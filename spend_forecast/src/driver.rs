//! Forecast driver: model path with a statistical fallback
//!
//! The driver owns the process-wide trained forecaster. Reads clone an `Arc`
//! under a short read lock, so inference runs concurrently. Training is
//! serialised by a mutex that also owns the random generator; a new
//! forecaster is persisted first and only then swapped in, which keeps the
//! network and scaler paired both on disk and in memory.

use crate::config::ServiceConfig;
use crate::data::{DailyAggregate, DataStatus, FeatureBuilder, Transaction};
use crate::error::Result;
use crate::forecaster::{SequenceForecaster, TrainedForecaster, TrainingReport};
use crate::models::ForecastResult;
use crate::sequence::WINDOW_LEN;
use crate::store::ModelStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Which estimator produced a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    /// The recurrent sequence model
    Lstm,
    /// Mean absolute expense repeated over the horizon
    SimpleAverage,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::Lstm => "lstm",
            PredictionMethod::SimpleAverage => "simple_average",
        }
    }
}

/// A forecast tagged with the method that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub result: ForecastResult,
    pub method: PredictionMethod,
}

/// Result of an explicit training request
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    Trained(TrainingReport),
    /// Training was refused; the previous model, if any, is still installed
    Insufficient { reason: String },
}

impl TrainOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained(_))
    }
}

/// Mean-based forecast used when the sequence model cannot run
///
/// Repeats the mean absolute expense amount for each day, or zeros when the
/// batch has no expenses.
pub fn simple_prediction(transactions: &[Transaction], days: usize) -> ForecastResult {
    let expenses: Vec<f64> = transactions
        .iter()
        .filter(|t| t.is_expense())
        .map(|t| t.amount.abs())
        .collect();

    if expenses.is_empty() {
        return ForecastResult::constant(0.0, days);
    }

    let daily_average = expenses.iter().sum::<f64>() / expenses.len() as f64;
    ForecastResult::constant(daily_average, days)
}

/// Owner of the shared forecaster
#[derive(Debug)]
pub struct ForecastDriver {
    state: RwLock<Option<Arc<TrainedForecaster>>>,
    training: Mutex<StdRng>,
    store: ModelStore,
    default_epochs: usize,
}

impl ForecastDriver {
    /// Create an untrained driver backed by `config.model_dir`
    pub fn new(config: &ServiceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            state: RwLock::new(None),
            training: Mutex::new(rng),
            store: ModelStore::new(&config.model_dir),
            default_epochs: config.default_epochs,
        }
    }

    /// Create a driver and restore any stored model
    pub fn open(config: &ServiceConfig) -> Self {
        let driver = Self::new(config);
        driver.load_stored();
        driver
    }

    /// Restore the stored model; load failures leave the driver untrained
    pub fn load_stored(&self) -> bool {
        match self.store.load() {
            Ok(Some(forecaster)) => {
                self.install(Arc::new(forecaster));
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, dir = %self.store.dir().display(), "Could not load stored model");
                false
            }
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn is_trained(&self) -> bool {
        self.current().is_some()
    }

    /// The installed forecaster, if any
    pub fn current(&self) -> Option<Arc<TrainedForecaster>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, forecaster: Arc<TrainedForecaster>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(forecaster);
    }

    /// Train on `transactions` for `epochs` epochs, persist, then install
    pub fn train(&self, transactions: &[Transaction], epochs: usize) -> Result<TrainOutcome> {
        let forecaster = SequenceForecaster::new(epochs)?;

        let features = match FeatureBuilder::build(transactions) {
            DataStatus::Ready(features) => features,
            DataStatus::Insufficient { required, available } => {
                return Ok(TrainOutcome::Insufficient {
                    reason: format!("need {} transactions, got {}", required, available),
                })
            }
        };

        let mut rng = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(match self.train_locked(&forecaster, &features.daily, &mut rng)? {
            DataStatus::Ready((_, report)) => TrainOutcome::Trained(report),
            DataStatus::Insufficient { required, available } => TrainOutcome::Insufficient {
                reason: format!(
                    "need {} daily rows or windows, got {}",
                    required, available
                ),
            },
        })
    }

    /// Caller must hold the training lock, witnessed by `rng`
    fn train_locked(
        &self,
        forecaster: &SequenceForecaster,
        daily: &[DailyAggregate],
        rng: &mut StdRng,
    ) -> Result<DataStatus<(Arc<TrainedForecaster>, TrainingReport)>> {
        let run = match forecaster.train(daily, rng)? {
            DataStatus::Ready(run) => run,
            DataStatus::Insufficient { required, available } => {
                info!(required, available, "Not enough data to train");
                return Ok(DataStatus::Insufficient { required, available });
            }
        };

        self.store.save(&run.forecaster)?;

        let trained = Arc::new(run.forecaster);
        self.install(Arc::clone(&trained));
        Ok(DataStatus::Ready((trained, run.report)))
    }

    /// Forecast `days` days of spending
    ///
    /// Uses the installed model, training one on this batch first when none
    /// is installed. Falls back to [`simple_prediction`] when the batch is
    /// too small for features, has fewer than `WINDOW_LEN` days, or cannot
    /// train a model.
    pub fn predict_next_days(&self, transactions: &[Transaction], days: usize) -> Result<Forecast> {
        let features = match FeatureBuilder::build(transactions) {
            DataStatus::Ready(features) => features,
            DataStatus::Insufficient { required, available } => {
                debug!(required, available, "Too few transactions, using simple average");
                return Ok(Self::fallback(transactions, days));
            }
        };

        if features.daily.len() < WINDOW_LEN {
            debug!(days = features.daily.len(), "Too few days of history, using simple average");
            return Ok(Self::fallback(transactions, days));
        }

        let forecaster = match self.current() {
            Some(forecaster) => forecaster,
            None => match self.train_on_demand(&features.daily)? {
                Some(forecaster) => forecaster,
                None => return Ok(Self::fallback(transactions, days)),
            },
        };

        match forecaster.forecast(&features.daily, days)? {
            DataStatus::Ready(result) => Ok(Forecast {
                result,
                method: PredictionMethod::Lstm,
            }),
            DataStatus::Insufficient { .. } => Ok(Self::fallback(transactions, days)),
        }
    }

    fn train_on_demand(&self, daily: &[DailyAggregate]) -> Result<Option<Arc<TrainedForecaster>>> {
        let mut rng = self.training.lock().unwrap_or_else(PoisonError::into_inner);

        // Another request may have finished training while we waited
        if let Some(forecaster) = self.current() {
            return Ok(Some(forecaster));
        }

        info!("No trained model, training on request data");
        let forecaster = SequenceForecaster::new(self.default_epochs)?;
        Ok(self
            .train_locked(&forecaster, daily, &mut rng)?
            .ready()
            .map(|(trained, _)| trained))
    }

    fn fallback(transactions: &[Transaction], days: usize) -> Forecast {
        Forecast {
            result: simple_prediction(transactions, days),
            method: PredictionMethod::SimpleAverage,
        }
    }
}
