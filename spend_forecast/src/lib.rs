//! # Spend Forecast
//!
//! Spending forecasts from a batch of dated, categorized transactions.
//!
//! ## Features
//!
//! - Transaction decoding from JSON or CSV, with flexible date formats
//! - Daily aggregation into `[total, count, average]` feature rows
//! - A two-layer LSTM regressor trained on 7-day windows
//! - Multi-day rollout that feeds each prediction back into the window
//! - A mean-based fallback when data is too thin for the model
//! - Budget-risk indicators and per-category expense breakdowns
//! - Paired model and scaler persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spend_forecast::{ForecastDriver, ServiceConfig, TransactionLoader};
//! use spend_forecast::risk::RiskAssessment;
//!
//! let transactions = TransactionLoader::from_csv("transactions.csv")?;
//!
//! let driver = ForecastDriver::open(&ServiceConfig::default());
//! let forecast = driver.predict_next_days(&transactions, 30)?;
//!
//! let risk = RiskAssessment::assess(&forecast.result, &transactions);
//! println!("{} via {}: {}", forecast.result.total_predicted, forecast.method.as_str(), risk.risk_level);
//! # Ok::<(), spend_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod forecaster;
pub mod insights;
pub mod models;
pub mod risk;
pub mod sequence;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use crate::config::ServiceConfig;
pub use crate::data::{DataStatus, FeatureBuilder, Transaction, TransactionKind, TransactionLoader};
pub use crate::driver::{simple_prediction, Forecast, ForecastDriver, PredictionMethod, TrainOutcome};
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::{SequenceForecaster, TrainedForecaster, TrainingReport};
pub use crate::models::{ForecastResult, SequenceModel};
pub use crate::risk::{RiskAssessment, RiskLevel};
pub use crate::service::{ForecastService, ServiceResponse};
pub use crate::store::ModelStore;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
