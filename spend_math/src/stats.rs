//! Descriptive statistics over feature columns
//!
//! Thin wrappers around `statrs` that reject empty input instead of
//! returning NaN, plus column extraction for row-major feature matrices.

use crate::{MathError, Result};
use statrs::statistics::Statistics;

/// Arithmetic mean of a slice
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute the mean of an empty series".to_string(),
        ));
    }

    Ok(values.iter().mean())
}

/// Population standard deviation (divides by N, not N - 1)
pub fn population_std_dev(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute the standard deviation of an empty series".to_string(),
        ));
    }

    // statrs returns NaN for a single observation; its spread is zero
    if values.len() == 1 {
        return Ok(0.0);
    }

    Ok(values.iter().population_std_dev())
}

/// Extract column `index` from a row-major matrix
pub fn column<R: AsRef<[f64]>>(rows: &[R], index: usize) -> Result<Vec<f64>> {
    rows.iter()
        .enumerate()
        .map(|(row_idx, row)| {
            row.as_ref().get(index).copied().ok_or_else(|| {
                MathError::InvalidInput(format!(
                    "Row {} has no column {} (width {})",
                    row_idx,
                    index,
                    row.as_ref().len()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean() {
        assert_relative_eq!(mean(&[2.0, 4.0, 6.0]).unwrap(), 4.0);
        assert!(mean(&[]).is_err());
    }

    #[test]
    fn test_population_std_dev() {
        // Population variance of 2, 4, 4, 4, 5, 5, 7, 9 is exactly 4
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_std_dev(&values).unwrap(), 2.0, epsilon = 1e-12);

        assert_eq!(population_std_dev(&[3.5]).unwrap(), 0.0);
        assert!(population_std_dev(&[]).is_err());
    }

    #[test]
    fn test_column_extraction() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        assert_eq!(column(&rows, 1).unwrap(), vec![10.0, 20.0, 30.0]);
        assert!(column(&rows, 2).is_err());
    }
}
