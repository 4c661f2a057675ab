//! Forecasting models and their results

use crate::data::FeatureRow;
use serde::{Deserialize, Serialize};

pub mod layers;
pub mod network;
pub mod optimizer;

pub use network::{EvaluationMetrics, SequenceNetwork};
pub use optimizer::Adam;

/// Forecast over a horizon of days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// One predicted amount per forecast day
    pub daily_predictions: Vec<f64>,
    /// Sum over the horizon
    pub total_predicted: f64,
}

impl ForecastResult {
    /// Build a result whose total is the sum of `daily_predictions`
    pub fn from_daily(daily_predictions: Vec<f64>) -> Self {
        let total_predicted = daily_predictions.iter().sum();
        Self {
            daily_predictions,
            total_predicted,
        }
    }

    /// Repeat `value` for `days` days, with total `value * days`
    pub fn constant(value: f64, days: usize) -> Self {
        Self {
            daily_predictions: vec![value; days],
            total_predicted: value * days as f64,
        }
    }

    /// Number of forecast days
    pub fn horizon(&self) -> usize {
        self.daily_predictions.len()
    }
}

/// A model that maps a window of scaled daily features to the next scaled `total_amount`
pub trait SequenceModel {
    fn predict_next(&self, window: &[FeatureRow]) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_daily_sums() {
        let result = ForecastResult::from_daily(vec![1.5, 2.5, -1.0]);
        assert_eq!(result.horizon(), 3);
        assert_relative_eq!(result.total_predicted, 3.0);
    }

    #[test]
    fn test_constant() {
        let result = ForecastResult::constant(20.0, 3);
        assert_eq!(result.daily_predictions, vec![20.0, 20.0, 20.0]);
        assert_relative_eq!(result.total_predicted, 60.0);

        let empty = ForecastResult::constant(0.0, 0);
        assert!(empty.daily_predictions.is_empty());
        assert_eq!(empty.total_predicted, 0.0);
    }
}
