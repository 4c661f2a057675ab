//! Sequence windowing for the recurrent model
//!
//! Training windows are overlapping slices of the scaled daily feature
//! matrix. During rollout the model input lives in a [`RollingWindow`], a
//! fixed ring of rows where each prediction overwrites the oldest day.

use crate::data::FeatureRow;

/// Days of history per model input
pub const WINDOW_LEN: usize = 7;

/// A model input window and the row that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSample {
    pub window: [FeatureRow; WINDOW_LEN],
    pub target: FeatureRow,
}

/// Slice `rows` into `rows.len() - WINDOW_LEN` overlapping samples
///
/// Sample `i` covers rows `[i, i + WINDOW_LEN)` and targets row `i + WINDOW_LEN`.
/// Returns no samples when there are `WINDOW_LEN` rows or fewer.
pub fn create_sequences(rows: &[FeatureRow]) -> Vec<SequenceSample> {
    if rows.len() <= WINDOW_LEN {
        return Vec::new();
    }

    (0..rows.len() - WINDOW_LEN)
        .map(|start| {
            let mut window = [[0.0; crate::data::FEATURE_COUNT]; WINDOW_LEN];
            window.copy_from_slice(&rows[start..start + WINDOW_LEN]);
            SequenceSample {
                window,
                target: rows[start + WINDOW_LEN],
            }
        })
        .collect()
}

/// Split samples chronologically: the first `floor(0.8 * n)` train, the rest validate
pub fn train_validation_split(samples: &[SequenceSample]) -> (&[SequenceSample], &[SequenceSample]) {
    let split = (samples.len() * 4) / 5;
    samples.split_at(split)
}

/// Fixed-size window that slides forward as rows are pushed
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    rows: [FeatureRow; WINDOW_LEN],
    /// Index of the oldest row
    head: usize,
}

impl RollingWindow {
    /// Seed the window from the last `WINDOW_LEN` rows of `history`
    ///
    /// Returns `None` when `history` is shorter than the window.
    pub fn from_history(history: &[FeatureRow]) -> Option<Self> {
        if history.len() < WINDOW_LEN {
            return None;
        }

        let mut rows = [[0.0; crate::data::FEATURE_COUNT]; WINDOW_LEN];
        rows.copy_from_slice(&history[history.len() - WINDOW_LEN..]);
        Some(Self { rows, head: 0 })
    }

    /// Drop the oldest row and append `row` as the newest
    pub fn push(&mut self, row: FeatureRow) {
        self.rows[self.head] = row;
        self.head = (self.head + 1) % WINDOW_LEN;
    }

    /// Copy of the rows from oldest to newest
    pub fn to_array(&self) -> [FeatureRow; WINDOW_LEN] {
        let mut ordered = self.rows;
        ordered.rotate_left(self.head);
        ordered
    }
}
