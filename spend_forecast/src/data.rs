//! Transaction data and daily feature construction
//!
//! Raw transactions arrive in arbitrary order. [`FeatureBuilder`] sorts them,
//! derives calendar and category features per transaction, and collapses them
//! into one [`DailyAggregate`] per calendar date. Only the three numeric daily
//! fields feed the sequence model.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Minimum number of transactions before any features are built
pub const MIN_TRANSACTIONS: usize = 5;

/// Number of numeric features per day: total, count, average
pub const FEATURE_COUNT: usize = 3;

/// One day's numeric features in model order
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Category used when a transaction arrives without one
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// A single dated, categorized transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Calendar date; any time component in the input is discarded
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    /// Signed amount, expenses are usually negative
    pub amount: f64,
    /// Income or expense
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Free-form category label
    #[serde(default = "default_category")]
    pub category: String,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(date: NaiveDate, amount: f64, kind: TransactionKind, category: &str) -> Self {
        Self {
            date,
            amount,
            kind,
            category: category.to_string(),
        }
    }

    /// Whether this transaction is an expense
    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }

    /// Whether this transaction is income
    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_transaction_date(&raw).map_err(serde::de::Error::custom)
}

/// Parse a transaction date from `YYYY-MM-DD` or an ISO-8601 date-time
pub fn parse_transaction_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts.date());
        }
    }

    Err(ForecastError::InvalidInput(format!(
        "Unrecognized transaction date: {:?}",
        value
    )))
}

/// Loader for transaction batches stored on disk
#[derive(Debug)]
pub struct TransactionLoader;

impl TransactionLoader {
    /// Load transactions from a CSV file with a `date,amount,type,category` header
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Load transactions from any CSV source
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<Transaction>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut transactions = Vec::new();
        for record in csv_reader.deserialize() {
            transactions.push(record?);
        }

        Ok(transactions)
    }

    /// Load transactions from a JSON file holding a top-level array
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Outcome of a step that needs a minimum amount of data
///
/// Insufficient data is an expected condition that selects a fallback path,
/// so it is carried as a value instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DataStatus<T> {
    /// Enough data was present
    Ready(T),
    /// Not enough data; `required` and `available` use the step's own unit
    Insufficient { required: usize, available: usize },
}

impl<T> DataStatus<T> {
    /// Extract the value, discarding the insufficiency details
    pub fn ready(self) -> Option<T> {
        match self {
            DataStatus::Ready(value) => Some(value),
            DataStatus::Insufficient { .. } => None,
        }
    }
}

/// A transaction with derived calendar and category features
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub month: u32,
    pub is_weekend: bool,
    /// One indicator per entry of [`TransactionFeatures::categories`]
    pub category_indicators: Vec<u8>,
}

/// Aggregated transactions for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_amount: f64,
    pub transaction_count: usize,
    pub avg_amount: f64,
}

impl DailyAggregate {
    /// Numeric features in model order
    pub fn features(&self) -> FeatureRow {
        [
            self.total_amount,
            self.transaction_count as f64,
            self.avg_amount,
        ]
    }
}

/// Output of [`FeatureBuilder::build`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFeatures {
    /// Per-transaction table, sorted by date
    pub enriched: Vec<EnrichedTransaction>,
    /// Sorted distinct categories backing the indicator columns
    pub categories: Vec<String>,
    /// One row per distinct date, ascending
    pub daily: Vec<DailyAggregate>,
}

/// Builds per-transaction and daily features from raw transactions
#[derive(Debug)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Build features, or report that fewer than [`MIN_TRANSACTIONS`] were supplied
    pub fn build(transactions: &[Transaction]) -> DataStatus<TransactionFeatures> {
        if transactions.len() < MIN_TRANSACTIONS {
            return DataStatus::Insufficient {
                required: MIN_TRANSACTIONS,
                available: transactions.len(),
            };
        }

        let mut sorted: Vec<&Transaction> = transactions.iter().collect();
        // Stable: same-day transactions keep their input order
        sorted.sort_by_key(|t| t.date);

        let categories: Vec<String> = sorted
            .iter()
            .map(|t| t.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let enriched = sorted
            .iter()
            .map(|t| Self::enrich(t, &categories))
            .collect();

        DataStatus::Ready(TransactionFeatures {
            enriched,
            categories,
            daily: Self::aggregate_daily(&sorted),
        })
    }

    fn enrich(transaction: &Transaction, categories: &[String]) -> EnrichedTransaction {
        let day_of_week = transaction.date.weekday().num_days_from_monday();

        EnrichedTransaction {
            date: transaction.date,
            amount: transaction.amount,
            kind: transaction.kind,
            category: transaction.category.clone(),
            day_of_week,
            day_of_month: transaction.date.day(),
            month: transaction.date.month(),
            is_weekend: day_of_week >= 5,
            category_indicators: categories
                .iter()
                .map(|c| u8::from(*c == transaction.category))
                .collect(),
        }
    }

    fn aggregate_daily(sorted: &[&Transaction]) -> Vec<DailyAggregate> {
        let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

        for transaction in sorted {
            let entry = days.entry(transaction.date).or_insert((0.0, 0));
            entry.0 += transaction.amount;
            entry.1 += 1;
        }

        days.into_iter()
            .map(|(date, (total, count))| DailyAggregate {
                date,
                total_amount: total,
                transaction_count: count,
                avg_amount: total / count as f64,
            })
            .collect()
    }
}
