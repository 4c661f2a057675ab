//! Per-category expense breakdown

use crate::data::Transaction;
use serde::Serialize;
use std::collections::HashMap;

/// Expense summary for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryInsight {
    pub category: String,
    /// Absolute value of the summed amounts
    pub total: f64,
    pub count: usize,
    /// Absolute value of the mean amount
    pub average: f64,
    /// Share of all expense totals, 0-100
    pub percentage: f64,
}

/// Group expenses by category, largest total first
pub fn category_insights(transactions: &[Transaction]) -> Vec<CategoryInsight> {
    let mut groups: HashMap<&str, (f64, usize)> = HashMap::new();
    for transaction in transactions.iter().filter(|t| t.is_expense()) {
        let entry = groups.entry(transaction.category.as_str()).or_insert((0.0, 0));
        entry.0 += transaction.amount;
        entry.1 += 1;
    }

    let mut insights: Vec<CategoryInsight> = groups
        .into_iter()
        .map(|(category, (sum, count))| CategoryInsight {
            category: category.to_string(),
            total: sum.abs(),
            count,
            average: (sum / count as f64).abs(),
            percentage: 0.0,
        })
        .collect();

    // Ties break by name so output order is stable
    insights.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });

    let grand_total: f64 = insights.iter().map(|i| i.total).sum();
    if grand_total > 0.0 {
        for insight in &mut insights {
            insight.percentage = insight.total / grand_total * 100.0;
        }
    }

    insights
}
