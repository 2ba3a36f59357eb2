use crate::model::{CategoryMapping, ExpenseRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The header row written above the aggregate rows.
pub const HEADER: [&str; 2] = ["Category", "Amount"];

/// Summed amounts keyed by canonical category. Iteration, and therefore the rendered table, is in
/// ascending lexicographic order of category name.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateTable(BTreeMap<String, f64>);

impl AggregateTable {
    /// Sums `records` under the canonical name `mapping` gives each record's category.
    pub fn sum<'a>(
        records: impl IntoIterator<Item = &'a ExpenseRecord>,
        mapping: &CategoryMapping,
    ) -> Self {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for record in records {
            let canonical = mapping.canonical(&record.category);
            *totals.entry(canonical.to_string()).or_insert(0.0) += record.amount;
        }
        Self(totals)
    }

    /// The sum of all canonical category amounts.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Renders the header row followed by one `[category, amount]` row per canonical category.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.0.len() + 1);
        rows.push(HEADER.iter().map(|s| s.to_string()).collect());
        for (category, amount) in self.iter() {
            rows.push(vec![category.to_string(), amount.to_string()]);
        }
        rows
    }
}
