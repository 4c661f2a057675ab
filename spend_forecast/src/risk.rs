//! Budget risk indicators derived from a forecast and transaction history
//!
//! All thresholds are fixed policy. `average_monthly_income` approximates the
//! number of months from the raw transaction count (`count / 30`), not from
//! elapsed calendar time.

use crate::data::Transaction;
use crate::models::ForecastResult;
use serde::Serialize;
use std::fmt;

/// Ratio above which risk is high
pub const HIGH_RISK_RATIO: f64 = 0.9;

/// Ratio above which risk is medium
pub const MEDIUM_RISK_RATIO: f64 = 0.7;

/// Floor of the suggested savings goal
pub const MIN_SAVINGS_GOAL: f64 = 500.0;

/// Share of monthly income suggested as savings
pub const SAVINGS_RATE: f64 = 0.2;

/// Transactions assumed per month when estimating monthly income
pub const TRANSACTIONS_PER_MONTH: usize = 30;

/// Coarse risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Tier for a predicted-expense-to-income ratio; boundaries are exclusive
    pub fn from_ratio(expense_ratio: f64) -> Self {
        if expense_ratio > HIGH_RISK_RATIO {
            RiskLevel::High
        } else if expense_ratio > MEDIUM_RISK_RATIO {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Historical totals of a transaction batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoricalTotals {
    /// Sum of absolute expense amounts
    pub expenses: f64,
    /// Sum of income amounts
    pub income: f64,
    pub transaction_count: usize,
}

impl HistoricalTotals {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let expenses = transactions
            .iter()
            .filter(|t| t.is_expense())
            .map(|t| t.amount.abs())
            .sum();
        let income = transactions
            .iter()
            .filter(|t| t.is_income())
            .map(|t| t.amount)
            .sum();

        Self {
            expenses,
            income,
            transaction_count: transactions.len(),
        }
    }

    /// Income minus expenses
    pub fn balance(&self) -> f64 {
        self.income - self.expenses
    }

    /// Income divided by `max(1, count / 30)` months
    pub fn average_monthly_income(&self) -> f64 {
        let months = (self.transaction_count / TRANSACTIONS_PER_MONTH).max(1);
        self.income / months as f64
    }
}

/// Risk indicators for one forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub predicted_expense: f64,
    pub total_expenses_historical: f64,
    pub total_income_historical: f64,
    pub current_balance: f64,
    pub expense_ratio: f64,
    pub risk_level: RiskLevel,
    pub average_monthly_income: f64,
    pub predicted_balance: f64,
    pub savings_goal: f64,
}

impl RiskAssessment {
    /// Assess a forecast against the transactions it was made from
    pub fn assess(forecast: &ForecastResult, transactions: &[Transaction]) -> Self {
        Self::from_totals(
            forecast.total_predicted,
            HistoricalTotals::from_transactions(transactions),
        )
    }

    /// Assess a predicted expense total against precomputed history
    pub fn from_totals(predicted_expense: f64, totals: HistoricalTotals) -> Self {
        let current_balance = totals.balance();
        let expense_ratio = if totals.income > 0.0 {
            predicted_expense / totals.income
        } else {
            1.0
        };
        let average_monthly_income = totals.average_monthly_income();

        Self {
            predicted_expense,
            total_expenses_historical: totals.expenses,
            total_income_historical: totals.income,
            current_balance,
            expense_ratio,
            risk_level: RiskLevel::from_ratio(expense_ratio),
            average_monthly_income,
            predicted_balance: current_balance + average_monthly_income - predicted_expense,
            savings_goal: MIN_SAVINGS_GOAL.max(average_monthly_income * SAVINGS_RATE),
        }
    }
}
