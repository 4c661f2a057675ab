//! # Spendcast
//!
//! Workspace crate tying together the spending forecast libraries.
//!
//! - [`spend_math`]: descriptive statistics and feature scaling
//! - [`spend_forecast`]: transaction features, the sequence model, risk
//!   indicators and the forecasting service
//!
//! ## Example
//!
//! ```
//! use spendcast_workspace::spend_forecast::{simple_prediction, Transaction, TransactionKind};
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let transactions = vec![
//!     Transaction::new(date, -10.0, TransactionKind::Expense, "food"),
//!     Transaction::new(date, -30.0, TransactionKind::Expense, "food"),
//! ];
//!
//! let forecast = simple_prediction(&transactions, 7);
//! assert_eq!(forecast.total_predicted, 140.0);
//! ```

pub use spend_forecast;
pub use spend_math;
