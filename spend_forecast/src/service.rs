//! Request handling for the forecasting service
//!
//! Each operation takes a decoded JSON body and returns a status code with a
//! JSON body. Caller mistakes map to 400; anything unexpected is logged and
//! mapped to 500 with the error message and no partial payload.

use crate::config::ServiceConfig;
use crate::data::Transaction;
use crate::driver::{Forecast, ForecastDriver, TrainOutcome};
use crate::error::{ForecastError, Result};
use crate::forecaster::MIN_TRAINING_DAYS;
use crate::insights::category_insights;
use crate::risk::RiskAssessment;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

/// Status and JSON body of one handled request
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
}

impl ServiceResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

impl From<ForecastError> for ServiceResponse {
    fn from(err: ForecastError) -> Self {
        ServiceResponse::error(err.status_code(), err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(default)]
    transactions: Vec<Transaction>,
    days: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TrainRequest {
    #[serde(default)]
    transactions: Vec<Transaction>,
    epochs: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InsightsRequest {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| ForecastError::InvalidInput(format!("malformed request: {}", e)))
}

/// Forecasting operations over one shared driver
#[derive(Debug)]
pub struct ForecastService {
    driver: ForecastDriver,
    config: ServiceConfig,
}

impl ForecastService {
    /// Build a service and restore any stored model
    pub fn new(config: ServiceConfig) -> Self {
        let driver = ForecastDriver::open(&config);
        info!(trained = driver.is_trained(), "Forecast service ready");
        Self { driver, config }
    }

    /// Liveness and model state
    pub fn health(&self) -> ServiceResponse {
        ServiceResponse::ok(json!({
            "status": "OK",
            "model_trained": self.driver.is_trained(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    /// Forecast spending and derive risk indicators
    pub fn predict(&self, body: Value) -> ServiceResponse {
        self.predict_inner(body).unwrap_or_else(|err| {
            error!(error = %err, "Prediction failed");
            err.into()
        })
    }

    fn predict_inner(&self, body: Value) -> Result<ServiceResponse> {
        let request: PredictRequest = decode(body)?;
        if request.transactions.is_empty() {
            return Ok(ServiceResponse::error(400, "No transactions provided"));
        }
        let days = request.days.unwrap_or(self.config.default_days);

        let Forecast { result, method } = self.driver.predict_next_days(&request.transactions, days)?;
        let assessment = RiskAssessment::assess(&result, &request.transactions);

        Ok(ServiceResponse::ok(json!({
            "predictions": result,
            "predictedMonthlyExpense": assessment.predicted_expense,
            "predictedBalance": assessment.predicted_balance,
            "currentBalance": assessment.current_balance,
            "riskLevel": assessment.risk_level,
            "savingsGoal": assessment.savings_goal,
            "statistics": {
                "totalExpensesHistorical": assessment.total_expenses_historical,
                "totalIncomeHistorical": assessment.total_income_historical,
                "averageMonthlyIncome": assessment.average_monthly_income,
                "expenseRatio": assessment.expense_ratio,
            },
            "model_info": {
                "trained": self.driver.is_trained(),
                "prediction_method": method,
            },
        })))
    }

    /// Train, persist and install a new model
    pub fn train(&self, body: Value) -> ServiceResponse {
        self.train_inner(body).unwrap_or_else(|err| {
            error!(error = %err, "Training request failed");
            err.into()
        })
    }

    fn train_inner(&self, body: Value) -> Result<ServiceResponse> {
        let request: TrainRequest = decode(body)?;
        if request.transactions.len() < MIN_TRAINING_DAYS {
            return Ok(ServiceResponse::error(
                400,
                format!("Need at least {} transactions to train", MIN_TRAINING_DAYS),
            ));
        }
        let epochs = request.epochs.unwrap_or(self.config.default_epochs);

        match self.driver.train(&request.transactions, epochs)? {
            TrainOutcome::Trained(report) => Ok(ServiceResponse::ok(json!({
                "message": "Model trained successfully",
                "trained": true,
                "metrics": report,
            }))),
            TrainOutcome::Insufficient { reason } => {
                info!(%reason, "Training refused");
                Ok(ServiceResponse::error(500, "Training failed"))
            }
        }
    }

    /// Expense breakdown per category
    pub fn category_insights(&self, body: Value) -> ServiceResponse {
        match decode::<InsightsRequest>(body) {
            Ok(request) => ServiceResponse::ok(json!({
                "insights": category_insights(&request.transactions),
            })),
            Err(err) => {
                error!(error = %err, "Category insights failed");
                err.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> ForecastService {
        ForecastService::new(ServiceConfig {
            model_dir: dir.to_path_buf(),
            default_epochs: 2,
            seed: Some(3),
            ..ServiceConfig::default()
        })
    }

    #[test]
    fn test_health_reports_untrained_model() {
        let dir = tempdir().unwrap();
        let response = service(dir.path()).health();

        assert!(response.is_success());
        assert_eq!(response.body["status"], "OK");
        assert_eq!(response.body["model_trained"], false);
        assert!(response.body["timestamp"].is_string());
    }

    #[test]
    fn test_predict_without_transactions_is_rejected() {
        let dir = tempdir().unwrap();
        let response = service(dir.path()).predict(json!({ "days": 5 }));

        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "No transactions provided");
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let dir = tempdir().unwrap();
        let body = json!({ "transactions": [{ "date": "yesterday", "amount": 1.0, "type": "expense" }] });
        let response = service(dir.path()).predict(body);

        assert_eq!(response.status, 400);
        assert!(response.body["error"].as_str().unwrap().contains("malformed request"));
    }

    #[test]
    fn test_small_batch_uses_simple_average() {
        let dir = tempdir().unwrap();
        let body = json!({
            "days": 3,
            "transactions": [
                { "date": "2024-01-01", "amount": -10.0, "type": "expense", "category": "food" },
                { "date": "2024-01-02", "amount": -20.0, "type": "expense", "category": "food" },
                { "date": "2024-01-03", "amount": -30.0, "type": "expense" },
            ]
        });
        let response = service(dir.path()).predict(body);

        assert!(response.is_success());
        assert_eq!(response.body["predictions"]["daily_predictions"], json!([20.0, 20.0, 20.0]));
        assert_eq!(response.body["predictedMonthlyExpense"], json!(60.0));
        assert_eq!(response.body["riskLevel"], "high");
        assert_eq!(response.body["statistics"]["expenseRatio"], json!(1.0));
        assert_eq!(response.body["model_info"]["prediction_method"], "simple_average");
        assert_eq!(response.body["model_info"]["trained"], false);
    }

    #[test]
    fn test_train_needs_fourteen_transactions() {
        let dir = tempdir().unwrap();
        let transactions: Vec<Value> = (1..=13)
            .map(|day| json!({ "date": format!("2024-01-{:02}", day), "amount": -5.0, "type": "expense" }))
            .collect();
        let response = service(dir.path()).train(json!({ "transactions": transactions }));

        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Need at least 14 transactions to train");
    }

    #[test]
    fn test_insights_payload() {
        let dir = tempdir().unwrap();
        let body = json!({
            "transactions": [
                { "date": "2024-01-01", "amount": -75.0, "type": "expense", "category": "rent" },
                { "date": "2024-01-02", "amount": -25.0, "type": "expense", "category": "food" },
                { "date": "2024-01-03", "amount": 500.0, "type": "income", "category": "salary" },
            ]
        });
        let response = service(dir.path()).category_insights(body);

        assert!(response.is_success());
        let insights = response.body["insights"].as_array().unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0]["category"], "rent");
        assert_eq!(insights[0]["percentage"], json!(75.0));
    }
}
