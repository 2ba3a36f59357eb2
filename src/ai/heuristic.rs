//! Keyword matching on header names, used when no model is available.

use crate::model::ColumnMapping;

/// Header substrings that mark the category column.
const CATEGORY_KEYWORDS: &[&str] = &["category", "type"];

/// Header substrings that mark the amount column.
const AMOUNT_KEYWORDS: &[&str] = &["cost", "amount", "price"];

/// Scans every header, case-insensitively. When more than one header qualifies for a role, the
/// last one wins.
pub(super) fn classify<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    for (ix, header) in headers.iter().enumerate() {
        let header = header.as_ref().to_lowercase();
        if CATEGORY_KEYWORDS.iter().any(|k| header.contains(k)) {
            mapping.category = Some(ix);
        }
        if AMOUNT_KEYWORDS.iter().any(|k| header.contains(k)) {
            mapping.amount = Some(ix);
        }
    }
    mapping
}
