use crate::model::ColumnMapping;
use serde::{Deserialize, Serialize};

/// One expense taken from one row of a source sheet. `category` is non-empty and trimmed;
/// `amount` is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExpenseRecord {
    pub category: String,
    pub amount: f64,
}

impl ExpenseRecord {
    /// Builds a record from a raw row, or `None` if the row does not satisfy the record
    /// invariants under `mapping`.
    pub fn from_row<S>(row: &[S], mapping: ColumnMapping) -> Option<Self>
    where
        S: AsRef<str>,
    {
        let (category_ix, amount_ix) = mapping.both()?;
        if row.len() <= category_ix.max(amount_ix) {
            return None;
        }
        let category = row[category_ix].as_ref().trim();
        if category.is_empty() {
            return None;
        }
        let amount = parse_amount(row[amount_ix].as_ref())?;
        Some(Self {
            category: category.to_string(),
            amount,
        })
    }
}

/// The records taken from one source, and how many data rows were passed over.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<ExpenseRecord>,
    pub skipped: usize,
}

impl Extraction {
    /// Extracts records from `rows`, where the first row is the header row. Rows that do not
    /// produce a record are counted in `skipped`.
    pub fn from_rows<S>(rows: &[Vec<S>], mapping: ColumnMapping) -> Self
    where
        S: AsRef<str>,
    {
        let mut extraction = Self::default();
        for row in rows.iter().skip(1) {
            match ExpenseRecord::from_row(row, mapping) {
                Some(record) => extraction.records.push(record),
                None => extraction.skipped += 1,
            }
        }
        extraction
    }
}

/// Parses a cell as a plain finite number. Currency symbols and thousands separators are not
/// understood.
fn parse_amount(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
