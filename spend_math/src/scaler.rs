//! Feature-wise standard scaling
//!
//! A [`StandardScaler`] only exists in the fitted state: the sole constructor
//! is [`StandardScaler::fit`], so transforming with unfitted statistics is
//! unrepresentable. Columns with zero spread are scaled by 1 so constant
//! features map to 0 instead of NaN.

use crate::stats::{column, mean, population_std_dev};
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Per-column mean and standard deviation fitted over a feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column statistics over a row-major matrix
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let width = match rows.first() {
            Some(row) => row.as_ref().len(),
            None => {
                return Err(MathError::InsufficientData(
                    "Cannot fit a scaler on an empty matrix".to_string(),
                ))
            }
        };

        if width == 0 {
            return Err(MathError::InvalidInput(
                "Cannot fit a scaler on rows without columns".to_string(),
            ));
        }

        if let Some(idx) = rows.iter().position(|r| r.as_ref().len() != width) {
            return Err(MathError::InvalidInput(format!(
                "Row {} has width {}, expected {}",
                idx,
                rows[idx].as_ref().len(),
                width
            )));
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for idx in 0..width {
            let values = column(rows, idx)?;
            let std_dev = population_std_dev(&values)?;

            means.push(mean(&values)?);
            scales.push(if std_dev == 0.0 || !std_dev.is_finite() {
                1.0
            } else {
                std_dev
            });
        }

        Ok(Self { means, scales })
    }

    /// Whether the statistics are usable, as they always are after `fit`
    ///
    /// A deserialized scaler can carry mismatched lengths, non-finite means
    /// or zero scales; those fail this check.
    pub fn is_valid(&self) -> bool {
        !self.means.is_empty()
            && self.means.len() == self.scales.len()
            && self.means.iter().all(|m| m.is_finite())
            && self.scales.iter().all(|s| s.is_finite() && *s != 0.0)
    }

    /// Number of feature columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Fitted column means
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Fitted column scales (standard deviations, zero spread replaced by 1)
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Scale one row in place: `(x - mean) / std`
    pub fn transform_in_place(&self, row: &mut [f64]) -> Result<()> {
        self.check_width(row.len())?;

        for ((value, mean), scale) in row.iter_mut().zip(&self.means).zip(&self.scales) {
            *value = (*value - mean) / scale;
        }

        Ok(())
    }

    /// Undo scaling of one row in place: `x * std + mean`
    pub fn inverse_transform_in_place(&self, row: &mut [f64]) -> Result<()> {
        self.check_width(row.len())?;

        for ((value, mean), scale) in row.iter_mut().zip(&self.means).zip(&self.scales) {
            *value = *value * scale + mean;
        }

        Ok(())
    }

    /// Scale a whole matrix, returning new rows
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                let mut scaled = row.clone();
                self.transform_in_place(&mut scaled)?;
                Ok(scaled)
            })
            .collect()
    }

    /// Undo scaling of a whole matrix, returning new rows
    pub fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                let mut restored = row.clone();
                self.inverse_transform_in_place(&mut restored)?;
                Ok(restored)
            })
            .collect()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.means.len() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} features but the scaler was fitted on {}",
                width,
                self.means.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn sample_matrix() -> Vec<Vec<f64>> {
        vec![
            vec![-120.0, 3.0, -40.0],
            vec![-35.5, 1.0, -35.5],
            vec![250.0, 2.0, 125.0],
            vec![-80.0, 4.0, -20.0],
            vec![-15.25, 1.0, -15.25],
        ]
    }

    #[test]
    fn test_fit_produces_zero_mean_unit_variance() {
        let rows = sample_matrix();
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();

        for idx in 0..scaler.n_features() {
            let col = column(&scaled, idx).unwrap();
            assert_abs_diff_eq!(mean(&col).unwrap(), 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(population_std_dev(&col).unwrap(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_round_trip_restores_input() {
        let rows = sample_matrix();
        let scaler = StandardScaler::fit(&rows).unwrap();
        let restored = scaler
            .inverse_transform(&scaler.transform(&rows).unwrap())
            .unwrap();

        for (original, back) in rows.iter().zip(&restored) {
            for (a, b) in original.iter().zip(back) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let rows = vec![vec![5.0, 1.0], vec![7.0, 1.0], vec![9.0, 1.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();

        assert_eq!(scaler.scales()[1], 1.0);

        let scaled = scaler.transform(&rows).unwrap();
        assert!(scaled.iter().all(|row| row[1] == 0.0));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![vec![]])]
    #[case(vec![vec![1.0, 2.0], vec![3.0]])]
    fn test_fit_rejects_malformed_matrices(#[case] rows: Vec<Vec<f64>>) {
        assert!(StandardScaler::fit(&rows).is_err());
    }

    #[rstest]
    #[case(r#"{"means": [1.0, 2.0], "scales": [1.0]}"#)]
    #[case(r#"{"means": [1.0], "scales": [0.0]}"#)]
    #[case(r#"{"means": [], "scales": []}"#)]
    fn test_malformed_stored_scaler_is_invalid(#[case] json: &str) {
        let scaler: StandardScaler = serde_json::from_str(json).unwrap();
        assert!(!scaler.is_valid());
    }

    #[test]
    fn test_fitted_scaler_is_valid() {
        assert!(StandardScaler::fit(&sample_matrix()).unwrap().is_valid());
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let scaler = StandardScaler::fit(&sample_matrix()).unwrap();
        let mut row = [1.0, 2.0];
        assert!(scaler.transform_in_place(&mut row).is_err());
        assert!(scaler.inverse_transform_in_place(&mut row).is_err());
    }
}
