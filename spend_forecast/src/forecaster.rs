//! Training and multi-step rollout of the sequence model

use crate::data::{DailyAggregate, DataStatus, FeatureRow, FEATURE_COUNT};
use crate::error::{ForecastError, Result};
use crate::models::network::TARGET_FEATURE;
use crate::models::{Adam, ForecastResult, SequenceModel, SequenceNetwork};
use crate::sequence::{create_sequences, train_validation_split, RollingWindow, SequenceSample, WINDOW_LEN};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use spend_math::StandardScaler;
use tracing::{debug, info};

/// Daily rows required before training is attempted
pub const MIN_TRAINING_DAYS: usize = 14;

/// Windows required before training is attempted
pub const MIN_TRAINING_WINDOWS: usize = 5;

/// Mini-batch size
pub const BATCH_SIZE: usize = 8;

/// Epochs used when the caller does not choose
pub const DEFAULT_EPOCHS: usize = 50;

/// Summary of one training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub train_windows: usize,
    pub validation_windows: usize,
    /// Mean batch loss of the final epoch
    pub train_loss: Option<f64>,
    pub validation_loss: Option<f64>,
    pub validation_mae: Option<f64>,
}

/// Network and scaler from the same training run
///
/// The two are only ever created, stored and loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedForecaster {
    network: SequenceNetwork,
    scaler: StandardScaler,
}

/// A freshly trained forecaster with its report
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub forecaster: TrainedForecaster,
    pub report: TrainingReport,
}

impl TrainedForecaster {
    /// Pair a network with the scaler it was trained against
    pub fn new(network: SequenceNetwork, scaler: StandardScaler) -> Result<Self> {
        if !network.is_consistent() {
            return Err(ForecastError::DataError(format!(
                "Network layer sizes do not match a {:?} input",
                (WINDOW_LEN, FEATURE_COUNT)
            )));
        }
        if !scaler.is_valid() {
            return Err(ForecastError::DataError(
                "Scaler statistics are empty, mismatched or not finite".to_string(),
            ));
        }
        if scaler.n_features() != FEATURE_COUNT {
            return Err(ForecastError::DataError(format!(
                "Scaler was fitted on {} features, expected {}",
                scaler.n_features(),
                FEATURE_COUNT
            )));
        }

        Ok(Self { network, scaler })
    }

    pub fn network(&self) -> &SequenceNetwork {
        &self.network
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Forecast `days` days past the end of `daily`
    pub fn forecast(&self, daily: &[DailyAggregate], days: usize) -> Result<DataStatus<ForecastResult>> {
        let history: Vec<FeatureRow> = daily.iter().map(DailyAggregate::features).collect();
        rollout(&self.network, &self.scaler, &history, days)
    }
}

/// Iterative multi-step forecast
///
/// The last `WINDOW_LEN` rows of `history` are scaled with the fitted `scaler`
/// and seed the window. Each step's scalar prediction is broadcast across all
/// features and pushed into the window as the newest day, so later steps
/// consume earlier predictions. The target column of the inverse-scaled
/// predictions becomes the daily forecast.
pub fn rollout<M: SequenceModel + ?Sized>(
    model: &M,
    scaler: &StandardScaler,
    history: &[FeatureRow],
    days: usize,
) -> Result<DataStatus<ForecastResult>> {
    if history.len() < WINDOW_LEN {
        return Ok(DataStatus::Insufficient {
            required: WINDOW_LEN,
            available: history.len(),
        });
    }

    let mut scaled = history[history.len() - WINDOW_LEN..].to_vec();
    for row in &mut scaled {
        scaler.transform_in_place(row)?;
    }

    let mut window = RollingWindow::from_history(&scaled).ok_or_else(|| {
        ForecastError::DataError("Rollout window could not be seeded".to_string())
    })?;

    let mut predicted: Vec<FeatureRow> = Vec::with_capacity(days);
    for _ in 0..days {
        let next = model.predict_next(&window.to_array());
        let row = [next; FEATURE_COUNT];
        predicted.push(row);
        window.push(row);
    }

    let mut daily = Vec::with_capacity(days);
    for mut row in predicted {
        scaler.inverse_transform_in_place(&mut row)?;
        daily.push(row[TARGET_FEATURE]);
    }

    Ok(DataStatus::Ready(ForecastResult::from_daily(daily)))
}

/// Trains a [`SequenceNetwork`] on a daily feature table
#[derive(Debug, Clone)]
pub struct SequenceForecaster {
    epochs: usize,
}

impl Default for SequenceForecaster {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
        }
    }
}

impl SequenceForecaster {
    /// Create a forecaster that trains for `epochs` passes
    pub fn new(epochs: usize) -> Result<Self> {
        if epochs == 0 {
            return Err(ForecastError::InvalidInput(
                "Epochs must be at least 1".to_string(),
            ));
        }

        Ok(Self { epochs })
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Fit a scaler and a fresh network on `daily`
    ///
    /// Reports insufficiency below [`MIN_TRAINING_DAYS`] rows or
    /// [`MIN_TRAINING_WINDOWS`] windows. Nothing outside the returned value
    /// is touched, so a refused run leaves any existing model in place.
    pub fn train<R: Rng + ?Sized>(
        &self,
        daily: &[DailyAggregate],
        rng: &mut R,
    ) -> Result<DataStatus<TrainingRun>> {
        if daily.len() < MIN_TRAINING_DAYS {
            return Ok(DataStatus::Insufficient {
                required: MIN_TRAINING_DAYS,
                available: daily.len(),
            });
        }

        let matrix: Vec<FeatureRow> = daily.iter().map(DailyAggregate::features).collect();
        let scaler = StandardScaler::fit(&matrix)?;

        let mut scaled = matrix;
        for row in &mut scaled {
            scaler.transform_in_place(row)?;
        }

        let samples = create_sequences(&scaled);
        if samples.len() < MIN_TRAINING_WINDOWS {
            return Ok(DataStatus::Insufficient {
                required: MIN_TRAINING_WINDOWS,
                available: samples.len(),
            });
        }

        let (train, validation) = train_validation_split(&samples);
        info!(
            days = daily.len(),
            train_windows = train.len(),
            validation_windows = validation.len(),
            epochs = self.epochs,
            "Training sequence model"
        );

        let mut network = SequenceNetwork::new(rng);
        let mut optimizer = Adam::default();
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut train_loss = None;
        let mut validation_metrics = None;

        for epoch in 0..self.epochs {
            order.shuffle(rng);

            let mut weighted_loss = 0.0;
            for chunk in order.chunks(BATCH_SIZE) {
                let batch: Vec<&SequenceSample> = chunk.iter().map(|&idx| &train[idx]).collect();
                weighted_loss += network.train_batch(&batch, &mut optimizer, rng) * batch.len() as f64;
            }

            let epoch_loss = weighted_loss / train.len() as f64;
            train_loss = Some(epoch_loss);
            validation_metrics = network.evaluate(validation);

            debug!(
                epoch = epoch + 1,
                loss = epoch_loss,
                val_loss = ?validation_metrics.map(|m| m.mse),
                "Epoch finished"
            );
        }

        let report = TrainingReport {
            epochs: self.epochs,
            train_windows: train.len(),
            validation_windows: validation.len(),
            train_loss,
            validation_loss: validation_metrics.map(|m| m.mse),
            validation_mae: validation_metrics.map(|m| m.mae),
        };
        info!(
            train_loss = ?report.train_loss,
            validation_loss = ?report.validation_loss,
            "Sequence model trained"
        );

        Ok(DataStatus::Ready(TrainingRun {
            forecaster: TrainedForecaster::new(network, scaler)?,
            report,
        }))
    }
}

/// Serialized form of the scaler artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScalerArtifact {
    pub(crate) scaler: StandardScaler,
}

/// Serialized form of the model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ModelArtifact {
    pub(crate) window_len: usize,
    pub(crate) features: usize,
    pub(crate) network: SequenceNetwork,
}

impl TrainedForecaster {
    pub(crate) fn to_artifacts(&self) -> (ModelArtifact, ScalerArtifact) {
        (
            ModelArtifact {
                window_len: WINDOW_LEN,
                features: FEATURE_COUNT,
                network: self.network.clone(),
            },
            ScalerArtifact {
                scaler: self.scaler.clone(),
            },
        )
    }

    pub(crate) fn from_artifacts(model: ModelArtifact, scaler: ScalerArtifact) -> Result<Self> {
        if model.window_len != WINDOW_LEN || model.features != FEATURE_COUNT {
            return Err(ForecastError::PersistenceError(format!(
                "Stored model expects {}x{} inputs, this build uses {}x{}",
                model.window_len, model.features, WINDOW_LEN, FEATURE_COUNT
            )));
        }
        Self::new(model.network, scaler.scaler)
            .map_err(|err| ForecastError::PersistenceError(err.to_string()))
    }
}
